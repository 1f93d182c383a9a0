// Public library interface for voronoi-treemap
// The debug CLI tool uses the same modules

pub mod error;
pub mod geometry;
pub mod items;
pub mod layout;
pub mod tree;

pub use error::{ConvergenceWarning, LayoutError, WarningReason};
pub use geometry::{ClipPolygon, Point};
pub use items::WeightedItem;
pub use layout::{compute_layout, layout_items, Layout, LayoutCell, LayoutConfig};
