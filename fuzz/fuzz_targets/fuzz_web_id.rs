#![no_main]

use livetree_core::ElementId;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(id) = ElementId::from_web_id(text) else {
        return;
    };
    // Accepted encodings are canonical.
    assert_eq!(id.web_id(), text);
    assert_eq!(ElementId::from_web_id(&id.web_id()), Ok(id.clone()));
    if let Some(parent) = id.parent() {
        assert!(parent.is_ancestor_of(&id));
    }
});
