#![forbid(unsafe_code)]

//! Markup emission helpers.
//!
//! Render nodes write into a plain `String`. These helpers keep escaping in
//! one place: text and attribute values go through `v_htmlescape`, strings
//! embedded in inline `<script>` blocks go through [`js_string_literal`].

use std::fmt::Write;

use v_htmlescape::escape;

/// Append HTML-escaped text content.
pub fn push_text(html: &mut String, text: &str) {
    let _ = write!(html, "{}", escape(text));
}

/// Append ` name="value"` with the value HTML-escaped.
pub fn push_attribute(html: &mut String, name: &str, value: &str) {
    let _ = write!(html, " {name}=\"{}\"", escape(value));
}

/// Append `<tag` plus an `id` attribute. The caller closes the start tag.
pub fn open_tag_with_id(html: &mut String, tag: &str, web_id: &str) {
    html.push('<');
    html.push_str(tag);
    push_attribute(html, "id", web_id);
}

/// Quote `value` as a double-quoted JavaScript string literal that is safe
/// to embed inside an inline `<script>` element.
///
/// `<`, `>` and `&` are escaped as unicode sequences so the literal can never
/// close the surrounding script element.
#[must_use]
pub fn js_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' | '>' | '&' | '\'' | '\u{2028}' | '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", ch as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
