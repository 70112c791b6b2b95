use std::collections::HashSet;

use super::{Dom, NodeId, NodeKind, ROOT, element};

/// Asserts the structural invariants of the whole tree: single parentage,
/// parent/child agreement, cached lengths and childless void elements.
pub fn check(dom: &Dom) {
    let root = dom.root();
    assert!(dom.parent(root).is_none(), "root has a parent");
    assert_eq!(dom.name(root), Some(ROOT), "root is not the reserved element");

    let mut seen = HashSet::new();
    check_node(dom, root, &mut seen);

    assert_eq!(
        seen.len(),
        dom.arena.len(),
        "arena holds {} nodes but only {} are reachable from the root",
        dom.arena.len(),
        seen.len()
    );
}

fn check_node(dom: &Dom, id: NodeId, seen: &mut HashSet<NodeId>) -> usize {
    assert!(seen.insert(id), "node {id:?} is reachable twice");

    let expected = match dom.kind(id) {
        NodeKind::Text(text) => text.chars().count(),
        NodeKind::Comment(_) => 1,
        NodeKind::Element(el) if element::is_void(&el.name) => {
            assert!(
                el.children.is_empty(),
                "void element <{}> has children",
                el.name
            );
            1
        }
        NodeKind::Element(el) => {
            let mut sum = 0;
            for &child in &el.children {
                assert_eq!(
                    dom.parent(child),
                    Some(id),
                    "child {child:?} of <{}> points at another parent",
                    el.name
                );
                sum += check_node(dom, child, seen);
            }
            sum
        }
    };

    assert_eq!(
        dom.len(id),
        expected,
        "cached length of {:?} is stale",
        dom.kind(id)
    );
    expected
}
