#![no_main]

use jtree_core::NodePath;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(path) = text.parse::<NodePath>() else {
        return;
    };
    let again: NodePath = path.to_string().parse().expect("display must parse back");
    assert_eq!(again, path);
    assert_eq!(path.ancestors().count(), path.depth() + 1);
    if let Some(parent) = path.parent() {
        assert!(parent.is_ancestor_of(&path));
    }
});
