use compact_str::CompactString;

/// Flat input record supplied by upstream collaborators, before tree construction.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedItem {
    /// Display name of the item
    pub name: CompactString,
    /// Non-negative value; zero-valued items get no cell
    pub value: f64,
    /// Optional group key; items sharing a key are nested under one group cell
    pub group: Option<CompactString>,
}

impl WeightedItem {
    pub fn new(name: &str, value: f64) -> Self {
        Self {
            name: CompactString::new(name),
            value,
            group: None,
        }
    }

    pub fn grouped(name: &str, value: f64, group: &str) -> Self {
        Self {
            group: Some(CompactString::new(group)),
            ..Self::new(name, value)
        }
    }
}
