#![no_main]

use jtree_core::{CancellationToken, JurisdictionSource};
use jtree_harness::FixtureSource;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(source) = FixtureSource::from_json_str(text) else {
        return;
    };
    let never = CancellationToken::never();
    let roots = source.list_roots(&never).expect("fixture roots never fail");
    for root in roots {
        let path = jtree_core::NodePath::root(root.id);
        let _ = source.list_children(&path, &never);
    }
});
