pub mod aggregate;
pub mod arena;

use std::collections::HashMap;

use compact_str::CompactString;

use self::arena::{HierarchyNode, HierarchyTree, NodeId};
use crate::error::LayoutError;
use crate::items::WeightedItem;

/// Name given to the synthetic root node.
pub const ROOT_NAME: &str = "root";

/// Build a HierarchyTree from a flat list of items.
///
/// Items with a group key are nested under one internal node per distinct key
/// (groups appear in order of first occurrence); ungrouped items become direct
/// children of the root. Caller order is kept within every sibling list.
pub fn build_hierarchy(items: &[WeightedItem]) -> Result<HierarchyTree, LayoutError> {
    if let Some(bad) = items.iter().find(|i| !(i.value >= 0.0) || !i.value.is_finite()) {
        return Err(LayoutError::InvalidWeight {
            name: bad.name.clone(),
            value: bad.value,
        });
    }

    let mut tree = HierarchyTree::new(ROOT_NAME);
    let mut groups: HashMap<CompactString, NodeId> = HashMap::new();

    for (index, item) in items.iter().enumerate() {
        let parent = match &item.group {
            Some(key) => *groups.entry(key.clone()).or_insert_with(|| {
                tree.add_child(tree.root, HierarchyNode::group(key))
            }),
            None => tree.root,
        };
        tree.add_child(parent, HierarchyNode::leaf(&item.name, item.value, index));
    }

    aggregate::aggregate_weights(&mut tree);

    tracing::debug!(
        "Hierarchy built: {} items, {} groups, {} nodes, total weight {}",
        items.len(),
        groups.len(),
        tree.len(),
        tree.total_weight()
    );

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_nest_items_and_ungrouped_stay_at_root() {
        let items = vec![
            WeightedItem::grouped("a", 1.0, "g1"),
            WeightedItem::new("solo", 5.0),
            WeightedItem::grouped("c", 2.0, "g2"),
            WeightedItem::grouped("b", 1.0, "g1"),
        ];
        let tree = build_hierarchy(&items).unwrap();

        let top: Vec<&str> = tree
            .children(tree.root)
            .map(|id| tree.get(id).name.as_str())
            .collect();
        assert_eq!(top, vec!["g1", "solo", "g2"]);

        let g1 = tree.children(tree.root).next().unwrap();
        let g1_kids: Vec<&str> = tree.children(g1).map(|id| tree.get(id).name.as_str()).collect();
        assert_eq!(g1_kids, vec!["a", "b"]);
        assert_eq!(tree.get(g1).weight, 2.0);
        assert_eq!(tree.total_weight(), 9.0);

        let leaf = tree.children(g1).nth(1).unwrap();
        assert_eq!(tree.get(leaf).item, Some(3));
        assert_eq!(tree.get(leaf).depth, 2);
        assert_eq!(tree.leaves().count(), 4);
    }

    #[test]
    fn negative_and_nan_values_are_rejected() {
        let err = build_hierarchy(&[WeightedItem::new("x", -1.0)]).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidWeight { .. }));
        assert!(build_hierarchy(&[WeightedItem::new("y", f64::NAN)]).is_err());
        assert!(build_hierarchy(&[WeightedItem::new("z", f64::INFINITY)]).is_err());
    }

    #[test]
    fn empty_input_is_a_lone_root() {
        let tree = build_hierarchy(&[]).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.total_weight(), 0.0);
    }
}
