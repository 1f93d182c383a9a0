use std::fmt;

use compact_str::CompactString;
use thiserror::Error;

use crate::tree::arena::NodeId;

/// Fatal errors: no partial layout is produced when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// The region to tessellate has non-positive area, too few vertices or
    /// cannot be sampled.
    #[error("degenerate region: {reason}")]
    DegenerateRegion { reason: String },

    /// An input item carries a negative or non-finite value.
    #[error("item '{name}' has invalid value {value}")]
    InvalidWeight { name: CompactString, value: f64 },
}

impl LayoutError {
    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        LayoutError::DegenerateRegion {
            reason: reason.into(),
        }
    }
}

/// Why a subtree's layout is only approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningReason {
    /// The solver ran out of iterations before reaching the tolerance
    IterationBudget,
    /// The layout's time budget ran out mid-solve
    Deadline,
    /// The solve stopped short with at least one child cell still empty
    CollapsedCell,
    /// The cell was too thin to place sites for its children; they were skipped
    DegenerateSubregion,
}

/// Non-fatal report attached to a layout: the children of `node` were laid out
/// with `max_error` relative area error instead of the requested tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceWarning {
    pub node: NodeId,
    pub name: CompactString,
    /// Depth of `node`; its children live one level below
    pub depth: u16,
    pub max_error: f64,
    pub iterations: usize,
    pub reason: WarningReason,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "children of '{}' (depth {}) stopped at {:.2}% area error after {} iterations ({:?})",
            self.name,
            self.depth,
            self.max_error * 100.0,
            self.iterations,
            self.reason
        )
    }
}
