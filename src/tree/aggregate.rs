use super::arena::{HierarchyTree, NodeId};

/// Roll leaf values up into their groups.
///
/// Group weights are cleared and then every node pushes its weight into its
/// parent. Parents precede their children in the arena, so sweeping from the
/// back finishes a group before its own weight is pushed further up.
pub fn aggregate_weights(tree: &mut HierarchyTree) {
    for node in tree.nodes.iter_mut().filter(|n| !n.is_leaf()) {
        node.weight = 0.0;
    }
    for i in (1..tree.nodes.len()).rev() {
        if let Some(parent) = tree.nodes[i].parent {
            let weight = tree.nodes[i].weight;
            tree.nodes[parent.index()].weight += weight;
        }
    }
}

/// Order every sibling list by weight, heaviest first. Ties keep caller order.
pub fn sort_children_by_weight(tree: &mut HierarchyTree) {
    for i in 0..tree.nodes.len() {
        let parent = NodeId(i as u32);
        let mut kids: Vec<NodeId> = tree.children(parent).collect();
        if kids.len() < 2 {
            continue;
        }
        kids.sort_by(|a, b| tree.get(*b).weight.total_cmp(&tree.get(*a).weight));
        relink(tree, parent, &kids);
    }
}

/// Rewrite the sibling list of `parent` to follow `kids`.
fn relink(tree: &mut HierarchyTree, parent: NodeId, kids: &[NodeId]) {
    let mut next = None;
    for &id in kids.iter().rev() {
        tree.nodes[id.index()].next_sibling = next;
        next = Some(id);
    }
    let node = &mut tree.nodes[parent.index()];
    node.first_child = next;
    node.last_child = kids.last().copied();
}
