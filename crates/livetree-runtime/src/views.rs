#![forbid(unsafe_code)]

//! Built-in views.
//!
//! | View | Node | Markup |
//! |------|------|--------|
//! | [`Text`] | [`TextNode`] | `<span id>text</span>` |
//! | [`Button`] | [`ButtonNode`] | `<button id onclick>label</button>` |
//! | [`Stack`] | [`StackNode`] | `<div id class>children</div>` |
//! | [`Dynamic`] | whatever its closure returns | |
//! | [`SubscriptionView`] | [`SubscriptionNode`] | wrapper `<div>` + trigger script |
//! | [`TimerView`] | [`TimerNode`] | wrapper `<div>` + trigger script |
//!
//! Wrapping views are usually created through [`ViewExt`]:
//!
//! ```ignore
//! Text::computed(move || format!("{}", clock.latest().unwrap_or_default()))
//!     .on_receive(clock.clone(), |_| {})
//!     .timer()
//!     .interval(Duration::from_millis(500));
//! ```

use std::any::Any;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashSet;
use livetree_core::html::{js_string_literal, open_tag_with_id, push_attribute, push_text};
use livetree_core::{ElementId, IdComponent};
use serde_json::Value;

use crate::builder::{AnyView, BuildContext, BuildError, View};
use crate::node::{BoxNode, InvokeContext, InvokeOutcome, RenderNode, invoke_children};
use crate::reactive::Publisher;
use crate::subscription::{SubscriptionBehavior, SubscriptionNode, ValueAction};
use crate::timer::{TickAction, TimerBehavior, TimerNode, TimerTick};

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

enum TextSource {
    Static(String),
    Computed(Arc<dyn Fn() -> String + Send + Sync>),
}

/// Escaped text in a `<span>`.
pub struct Text {
    source: TextSource,
}

impl Text {
    /// Fixed text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            source: TextSource::Static(text.into()),
        }
    }

    /// Text recomputed on every build.
    #[must_use]
    pub fn computed(compute: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            source: TextSource::Computed(Arc::new(compute)),
        }
    }
}

impl View for Text {
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError> {
        let text = match &self.source {
            TextSource::Static(text) => text.clone(),
            TextSource::Computed(compute) => compute(),
        };
        Ok(Box::new(TextNode {
            element_id: cx.element_id().clone(),
            text,
        }))
    }
}

/// Render node for [`Text`].
#[derive(Debug)]
pub struct TextNode {
    element_id: ElementId,
    text: String,
}

impl TextNode {
    /// Text as built.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl RenderNode for TextNode {
    fn element_id(&self) -> &ElementId {
        &self.element_id
    }

    fn kind(&self) -> &'static str {
        "text"
    }

    fn generate_html(&self, html: &mut String) {
        open_tag_with_id(html, "span", &self.element_id.web_id());
        html.push('>');
        push_text(html, &self.text);
        html.push_str("</span>");
    }

    fn invoke(&self, _target: &ElementId, _cx: &InvokeContext<'_>) -> InvokeOutcome {
        InvokeOutcome::Unmatched
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

/// Action run when a button is clicked. Receives the interaction payload.
pub type ClickAction = Arc<dyn Fn(Option<&Value>) + Send + Sync>;

/// A clickable button.
pub struct Button {
    label: String,
    action: ClickAction,
}

impl Button {
    /// Button with `label` running `action` on click.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        action: impl Fn(Option<&Value>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            action: Arc::new(action),
        }
    }
}

impl View for Button {
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError> {
        Ok(Box::new(ButtonNode {
            element_id: cx.element_id().clone(),
            label: self.label.clone(),
            client_object: Arc::from(cx.builder().config().client_object.as_str()),
            action: Arc::clone(&self.action),
        }))
    }
}

/// Render node for [`Button`].
pub struct ButtonNode {
    element_id: ElementId,
    label: String,
    client_object: Arc<str>,
    action: ClickAction,
}

impl RenderNode for ButtonNode {
    fn element_id(&self) -> &ElementId {
        &self.element_id
    }

    fn kind(&self) -> &'static str {
        "button"
    }

    fn generate_html(&self, html: &mut String) {
        let web_id = self.element_id.web_id();
        open_tag_with_id(html, "button", &web_id);
        let mut onclick = String::new();
        let _ = write!(onclick, "{}.click({})", self.client_object, js_string_literal(&web_id));
        push_attribute(html, "onclick", &onclick);
        html.push('>');
        push_text(html, &self.label);
        html.push_str("</button>");
    }

    fn invoke(&self, target: &ElementId, cx: &InvokeContext<'_>) -> InvokeOutcome {
        if target != &self.element_id {
            return InvokeOutcome::Unmatched;
        }
        (self.action)(cx.payload());
        InvokeOutcome::Fired
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Stack
// ---------------------------------------------------------------------------

/// Layout direction of a [`Stack`], emitted as a CSS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    /// Children stacked top to bottom.
    #[default]
    Vertical,
    /// Children laid out left to right.
    Horizontal,
}

impl Axis {
    fn class(self) -> &'static str {
        match self {
            Self::Vertical => "vstack",
            Self::Horizontal => "hstack",
        }
    }
}

struct StackChild {
    key: Option<String>,
    view: AnyView,
}

/// A container of children addressed by position or key.
///
/// Unkeyed children take their index among all children. Keyed children take
/// their key, so their address survives insertions before them.
#[derive(Default)]
pub struct Stack {
    axis: Axis,
    children: Vec<StackChild>,
}

impl Stack {
    /// Empty vertical stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty horizontal stack.
    #[must_use]
    pub fn horizontal() -> Self {
        Self {
            axis: Axis::Horizontal,
            children: Vec::new(),
        }
    }

    /// Append a positional child.
    #[must_use]
    pub fn child(mut self, view: impl View) -> Self {
        self.children.push(StackChild {
            key: None,
            view: Box::new(view),
        });
        self
    }

    /// Append a keyed child.
    #[must_use]
    pub fn keyed(mut self, key: impl Into<String>, view: impl View) -> Self {
        self.children.push(StackChild {
            key: Some(key.into()),
            view: Box::new(view),
        });
        self
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the stack has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn component(
        parent: &ElementId,
        index: usize,
        key: Option<&str>,
        seen: &mut AHashSet<String>,
    ) -> Result<IdComponent, BuildError> {
        match key {
            Some(key) => {
                let component = IdComponent::key(key).map_err(|source| BuildError::InvalidKey {
                    parent: parent.clone(),
                    key: key.to_owned(),
                    source,
                })?;
                if !seen.insert(key.to_owned()) {
                    return Err(BuildError::DuplicateKey {
                        parent: parent.clone(),
                        key: key.to_owned(),
                    });
                }
                Ok(component)
            }
            None => u32::try_from(index)
                .map(IdComponent::Index)
                .map_err(|_| BuildError::TooManyChildren {
                    parent: parent.clone(),
                }),
        }
    }
}

impl View for Stack {
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError> {
        let element_id = cx.element_id().clone();
        let mut seen = AHashSet::new();
        let mut children = Vec::with_capacity(self.children.len());
        for (index, child) in self.children.iter().enumerate() {
            let component = Self::component(&element_id, index, child.key.as_deref(), &mut seen)?;
            children.push(cx.build_child(component, &*child.view)?);
        }
        Ok(Box::new(StackNode {
            element_id,
            axis: self.axis,
            children,
        }))
    }
}

/// Render node for [`Stack`].
pub struct StackNode {
    element_id: ElementId,
    axis: Axis,
    children: Vec<BoxNode>,
}

impl RenderNode for StackNode {
    fn element_id(&self) -> &ElementId {
        &self.element_id
    }

    fn kind(&self) -> &'static str {
        "stack"
    }

    fn generate_html(&self, html: &mut String) {
        open_tag_with_id(html, "div", &self.element_id.web_id());
        push_attribute(html, "class", self.axis.class());
        html.push('>');
        for child in &self.children {
            child.generate_html(html);
        }
        html.push_str("</div>");
    }

    fn invoke(&self, target: &ElementId, cx: &InvokeContext<'_>) -> InvokeOutcome {
        if !self.element_id.encloses(target) || target == &self.element_id {
            return InvokeOutcome::Unmatched;
        }
        invoke_children(&self.children, target, cx)
    }

    fn children(&self) -> Vec<&dyn RenderNode> {
        self.children.iter().map(|child| &**child).collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn RenderNode> {
        self.children.iter_mut().map(|child| &mut **child).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Dynamic
// ---------------------------------------------------------------------------

/// A view whose structure is chosen at build time.
///
/// The closure runs on every build and the returned view is built at the
/// same address, so it adds no address level of its own.
pub struct Dynamic {
    make: Arc<dyn Fn() -> AnyView + Send + Sync>,
}

impl Dynamic {
    /// Wrap a view factory.
    #[must_use]
    pub fn new(make: impl Fn() -> AnyView + Send + Sync + 'static) -> Self {
        Self {
            make: Arc::new(make),
        }
    }
}

impl View for Dynamic {
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError> {
        let view = (self.make)();
        cx.builder().build_tree(&*view, cx)
    }
}

// ---------------------------------------------------------------------------
// Wrapping views
// ---------------------------------------------------------------------------

/// Content that re-renders when a publisher delivers a value.
pub struct SubscriptionView<T> {
    source: Arc<dyn Publisher<T>>,
    action: ValueAction<T>,
    content: AnyView,
    message: Option<String>,
}

impl<T: Clone + Send + Sync + 'static> SubscriptionView<T> {
    /// Wrap `content`, running `action` with each committed value.
    #[must_use]
    pub fn new(
        source: impl Publisher<T>,
        action: impl Fn(&T) + Send + Sync + 'static,
        content: impl View,
    ) -> Self {
        Self::from_shared(Arc::new(source), Arc::new(action), Box::new(content))
    }

    /// Wrap `content` with an already shared publisher and action.
    #[must_use]
    pub fn from_shared(
        source: Arc<dyn Publisher<T>>,
        action: ValueAction<T>,
        content: AnyView,
    ) -> Self {
        Self {
            source,
            action,
            content,
            message: None,
        }
    }

    /// Log `message` to the browser console on every trigger tick.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Clone + Send + Sync + 'static> View for SubscriptionView<T> {
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError> {
        let (element_id, content) = cx.build_content(&*self.content)?;
        let trigger = cx
            .builder()
            .client_trigger(&element_id, None, self.message.as_deref());
        let behavior = SubscriptionBehavior::new(Arc::clone(&self.source), Arc::clone(&self.action));
        let node: SubscriptionNode<T> = SubscriptionNode::new(element_id, behavior, trigger, content);
        Ok(Box::new(node))
    }
}

/// Content that the client refreshes on a fixed interval.
pub struct TimerView {
    content: AnyView,
    interval: Option<Duration>,
    message: Option<String>,
    on_tick: Option<TickAction>,
}

impl TimerView {
    /// Wrap `content` with the configured default interval.
    #[must_use]
    pub fn new(content: impl View) -> Self {
        Self {
            content: Box::new(content),
            interval: None,
            message: None,
            on_tick: None,
        }
    }

    /// Tick interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Log `message` to the browser console on every tick.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Run `on_tick` on every committed tick.
    #[must_use]
    pub fn on_tick(mut self, on_tick: impl Fn(&TimerTick) + Send + Sync + 'static) -> Self {
        self.on_tick = Some(Arc::new(on_tick));
        self
    }
}

impl View for TimerView {
    fn build_tree(&self, cx: &mut BuildContext<'_>) -> Result<BoxNode, BuildError> {
        let (element_id, content) = cx.build_content(&*self.content)?;
        let trigger = cx
            .builder()
            .client_trigger(&element_id, self.interval, self.message.as_deref());
        let behavior = TimerBehavior::new(trigger.interval(), self.on_tick.clone());
        let node: TimerNode = TimerNode::new(element_id, behavior, trigger, content);
        Ok(Box::new(node))
    }
}

/// Combinators available on every view.
pub trait ViewExt: View + Sized {
    /// Re-render this view when `source` delivers a value; `action` runs with
    /// the value when the client commits it.
    fn on_receive<T, P>(self, source: P, action: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionView<T>
    where
        T: Clone + Send + Sync + 'static,
        P: Publisher<T>,
    {
        SubscriptionView::new(source, action, self)
    }

    /// Re-render this view on a client timer.
    fn timer(self) -> TimerView {
        TimerView::new(self)
    }

    /// Box this view.
    fn boxed(self) -> AnyView {
        Box::new(self)
    }
}

impl<V: View> ViewExt for V {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::config::SessionConfig;
    use crate::handle::SessionHandle;
    use crate::node::{find_node, render_html};
    use crate::reactive::Broadcaster;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn build(view: &dyn View) -> Result<BoxNode, BuildError> {
        TreeBuilder::new(SessionConfig::default()).build_root(view, &SessionHandle::new())
    }

    #[test]
    fn text_is_escaped() {
        let node = build(&Text::new("a < b & c")).unwrap();
        assert_eq!(render_html(&*node), "<span id=\"e\">a &lt; b &amp; c</span>");
    }

    #[test]
    fn stack_assigns_index_and_key_addresses() {
        let view = Stack::new()
            .child(Text::new("zero"))
            .keyed("header", Text::new("keyed"))
            .child(Text::new("two"));
        let node = build(&view).unwrap();
        assert_eq!(
            render_html(&*node),
            "<div id=\"e\" class=\"vstack\">\
             <span id=\"e.0\">zero</span>\
             <span id=\"e.header\">keyed</span>\
             <span id=\"e.2\">two</span>\
             </div>"
        );
    }

    #[test]
    fn duplicate_key_fails_build() {
        let view = Stack::new()
            .keyed("row", Text::new("a"))
            .keyed("row", Text::new("b"));
        assert!(matches!(build(&view), Err(BuildError::DuplicateKey { key, .. }) if key == "row"));
    }

    #[test]
    fn invalid_key_fails_build() {
        let view = Stack::new().keyed("has space", Text::new("a"));
        assert!(matches!(build(&view), Err(BuildError::InvalidKey { .. })));
    }

    #[test]
    fn button_click_receives_payload() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let view = Stack::new().child(Button::new("Go", move |payload| {
            s.lock().unwrap().push(payload.cloned());
        }));
        let node = build(&view).unwrap();
        let session = SessionHandle::new();
        let payload = serde_json::json!({"x": 1});
        let cx = InvokeContext::new(Some(&payload), &session);

        let target = ElementId::from_web_id("e.0").unwrap();
        assert_eq!(node.invoke(&target, &cx), InvokeOutcome::Fired);
        assert_eq!(*seen.lock().unwrap(), vec![Some(payload.clone())]);
        assert!(render_html(&*node).contains("onclick=\"LiveTree.click(&quot;e.0&quot;)\""));
    }

    #[test]
    fn stack_itself_has_no_action() {
        let node = build(&Stack::new().child(Text::new("a"))).unwrap();
        let session = SessionHandle::new();
        let cx = InvokeContext::new(None, &session);
        assert_eq!(node.invoke(&ElementId::root(), &cx), InvokeOutcome::Unmatched);
        assert_eq!(
            node.invoke(&ElementId::from_web_id("e.9").unwrap(), &cx),
            InvokeOutcome::Unmatched
        );
    }

    #[test]
    fn wrapper_content_lives_under_content_component() {
        let source: Broadcaster<u32> = Broadcaster::new();
        let view = Stack::new().child(Text::new("x").on_receive(source, |_: &u32| {}).timer());
        let node = build(&view).unwrap();

        let timer = find_node(&*node, &ElementId::from_web_id("e.0").unwrap()).unwrap();
        assert_eq!(timer.kind(), "timer");
        let subscription = find_node(&*node, &ElementId::from_web_id("e.0._").unwrap()).unwrap();
        assert_eq!(subscription.kind(), "subscription");
        let text = find_node(&*node, &ElementId::from_web_id("e.0._._").unwrap()).unwrap();
        assert_eq!(text.kind(), "text");
    }

    #[test]
    fn timer_view_markup() {
        let node = build(&Text::new("now").timer().interval(Duration::from_millis(1000))).unwrap();
        let html = render_html(&*node);
        assert_eq!(
            html,
            "<div id=\"e\"><script>setInterval(() => {LiveTree.valueCommit(\"e\")}, 1000);</script>\
             <span id=\"e._\">now</span></div>"
        );
    }

    #[test]
    fn dynamic_builds_at_same_address() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let view = Dynamic::new(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            Text::new(format!("build {n}")).boxed()
        });
        let first = build(&view).unwrap();
        let second = build(&view).unwrap();
        assert_eq!(first.element_id(), &ElementId::root());
        assert_eq!(render_html(&*second), "<span id=\"e\">build 1</span>");
    }

    #[test]
    fn dynamic_child_goes_through_the_builder() {
        let builder = TreeBuilder::default();
        let session = SessionHandle::new();
        let mut cx = BuildContext::new(&builder, &session);
        let view = Dynamic::new(|| Stack::new().child(Text::new("a")).child(Text::new("b")).boxed());
        builder.build_tree(&view, &mut cx).unwrap();
        // Dynamic, the stack and both texts.
        assert_eq!(cx.nodes_built(), 4);
    }

    #[test]
    fn text_node_is_downcastable() {
        let node = build(&Text::computed(|| "hi".to_owned())).unwrap();
        let text = node.as_any().downcast_ref::<TextNode>().unwrap();
        assert_eq!(text.text(), "hi");
    }
}
