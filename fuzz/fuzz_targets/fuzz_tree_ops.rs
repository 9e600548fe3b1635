#![no_main]

use arbitrary::Arbitrary;
use jtree_core::{Jurisdiction, JurisdictionTree, NodePath, SourceError};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Expand(u8),
    Check(u8),
    Clear,
    /// Complete the n-th outstanding fetch with `len` children (0 = leaf),
    /// or fail it.
    Complete { pick: u8, len: u8, fail: bool },
}

fuzz_target!(|ops: Vec<Op>| {
    let roots = (1..=3).map(|i| Jurisdiction::new(i, format!("r{i}"))).collect();
    let Ok(mut tree) = JurisdictionTree::new(roots) else {
        return;
    };
    let mut pending = Vec::new();

    for op in ops.into_iter().take(256) {
        let visible: Vec<NodePath> = tree.forest().visible().map(|(path, _)| path).collect();
        let pick = |n: u8| visible.get(n as usize % visible.len().max(1)).cloned();
        match op {
            Op::Expand(n) => {
                if let Some(path) = pick(n) {
                    let effects = tree.toggle_expand(&path).expect("visible node exists");
                    pending.extend(effects.fetch);
                }
            }
            Op::Check(n) => {
                if let Some(path) = pick(n) {
                    let effects = tree.toggle_check(&path).expect("visible node exists");
                    pending.extend(effects.fetch);
                }
            }
            Op::Clear => tree.clear_selection().expect("clear never fails"),
            Op::Complete { pick, len, fail } => {
                if pending.is_empty() {
                    continue;
                }
                let ticket = pending.remove(pick as usize % pending.len());
                let result = if fail {
                    Err(SourceError::unavailable("fuzz"))
                } else {
                    Ok((0..i64::from(len % 4))
                        .map(|i| Jurisdiction::new(i + 10, format!("c{i}")))
                        .collect())
                };
                tree.complete_fetch(&ticket, result).expect("ticket path exists");
            }
        }

        let forest = tree.forest();
        if let Some(max) = forest.max_depth() {
            for depth in 0..=max {
                assert!(forest.expanded_count_at_depth(depth) <= 1);
            }
        }
        if let Some(selected) = tree.selected() {
            let node = forest.get(selected).expect("selection is present");
            assert!(node.is_checked() && node.is_selectable_leaf());
        }
    }
});
