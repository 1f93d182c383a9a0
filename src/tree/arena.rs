use compact_str::CompactString;

/// Index into the arena `Vec<HierarchyNode>`. Uses u32 to keep nodes small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single node of the weighted hierarchy, stored in a flat arena.
/// Uses sibling-list representation: each node has `first_child` and `next_sibling`.
#[derive(Debug, Clone)]
pub struct HierarchyNode {
    /// Item name for leaves, group key for internal nodes
    pub name: CompactString,
    /// For leaves: the item value. For internal nodes: sum of children.
    pub weight: f64,
    /// Index of the source item in the input slice (leaves only)
    pub item: Option<usize>,
    /// Parent node index (None for root)
    pub parent: Option<NodeId>,
    /// First child node index (None for leaves)
    pub first_child: Option<NodeId>,
    /// Last child, kept so appends preserve caller order in O(1)
    pub last_child: Option<NodeId>,
    /// Next sibling node index (None if last child)
    pub next_sibling: Option<NodeId>,
    /// Depth in the tree (root = 0)
    pub depth: u16,
}

impl HierarchyNode {
    pub fn leaf(name: &str, weight: f64, item: usize) -> Self {
        Self {
            item: Some(item),
            weight,
            ..Self::group(name)
        }
    }

    pub fn group(name: &str) -> Self {
        Self {
            name: CompactString::new(name),
            weight: 0.0,
            item: None,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            depth: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }
}

/// The hierarchy stored as a flat arena of nodes.
#[derive(Debug, Clone)]
pub struct HierarchyTree {
    /// All nodes in contiguous memory
    pub nodes: Vec<HierarchyNode>,
    /// Root node index
    pub root: NodeId,
}

impl HierarchyTree {
    /// Create a tree holding only a root node.
    pub fn new(root_name: &str) -> Self {
        HierarchyTree {
            nodes: vec![HierarchyNode::group(root_name)],
            root: NodeId(0),
        }
    }

    /// Append a child after the parent's existing children. Returns the new node's ID.
    pub fn add_child(&mut self, parent: NodeId, mut node: HierarchyNode) -> NodeId {
        let new_id = NodeId(self.nodes.len() as u32);
        node.parent = Some(parent);
        node.depth = self.nodes[parent.index()].depth + 1;
        node.next_sibling = None;

        match self.nodes[parent.index()].last_child {
            Some(last) => self.nodes[last.index()].next_sibling = Some(new_id),
            None => self.nodes[parent.index()].first_child = Some(new_id),
        }
        self.nodes[parent.index()].last_child = Some(new_id);

        self.nodes.push(node);
        new_id
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> &HierarchyNode {
        &self.nodes[id.index()]
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty (only root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Total weight under the root.
    pub fn total_weight(&self) -> f64 {
        self.get(self.root).weight
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            current: self.nodes[parent.index()].first_child,
        }
    }

    /// Iterate over all leaf nodes in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, n)| n.is_leaf())
            .map(|(i, _)| NodeId(i as u32))
    }
}

/// Iterator over the children of a node.
pub struct ChildIter<'a> {
    tree: &'a HierarchyTree,
    current: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.tree.nodes[id.index()].next_sibling;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_keep_insertion_order() {
        let mut tree = HierarchyTree::new("root");
        let a = tree.add_child(tree.root, HierarchyNode::leaf("a", 1.0, 0));
        let b = tree.add_child(tree.root, HierarchyNode::leaf("b", 2.0, 1));
        let c = tree.add_child(tree.root, HierarchyNode::leaf("c", 3.0, 2));

        let kids: Vec<NodeId> = tree.children(tree.root).collect();
        assert_eq!(kids, vec![a, b, c]);
        assert_eq!(tree.get(b).depth, 1);
        assert_eq!(tree.get(c).parent, Some(tree.root));
        assert!(tree.get(a).is_leaf());
        assert!(!tree.get(tree.root).is_leaf());
    }
}
