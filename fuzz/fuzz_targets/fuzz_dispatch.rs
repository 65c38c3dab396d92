#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use livetree_runtime::{Broadcaster, Button, InvokeOutcome, Interaction, Session, Stack, Text, ViewExt};

#[derive(Arbitrary, Debug)]
enum Step {
    Send(u8),
    Path(Vec<String>),
    Json(String),
    Flush,
}

fuzz_target!(|steps: Vec<Step>| {
    let source: Broadcaster<u8> = Broadcaster::new();
    let mut session = Session::default();
    session
        .mount(
            Stack::new()
                .child(Text::new("a").on_receive(source.clone(), |_: &u8| {}))
                .keyed("k", Stack::new().child(Button::new("b", |_| {})).child(Text::new("c").timer())),
        )
        .unwrap();

    for step in steps {
        match step {
            Step::Send(value) => source.send(value),
            Step::Path(path) => {
                let outcome = session.dispatch(&Interaction { path, payload: None });
                if outcome == InvokeOutcome::Fired {
                    assert!(session.stats().fired > 0);
                }
            }
            Step::Json(message) => {
                session.dispatch_json(&message);
            }
            Step::Flush => {
                session.flush().unwrap();
            }
        }
    }
    assert_eq!(source.subscriber_count(), 1);
    let live = session.live_resources().len();
    assert_eq!(live, 2);
    assert_eq!(session.teardown(), live);
    assert_eq!(source.subscriber_count(), 0);
    assert!(session.active_timers().is_empty());
});
