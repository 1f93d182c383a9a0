pub mod seed;
pub mod solver;

use std::collections::HashMap;
use std::ops::Range;
use std::time::{Duration, Instant};

use compact_str::CompactString;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use self::seed::SeedConfig;
use self::solver::{Site, SolveStatus, SolverConfig};
use crate::error::{ConvergenceWarning, LayoutError, WarningReason};
use crate::geometry::{polygon, ClipPolygon, Point};
use crate::items::WeightedItem;
use crate::tree::arena::{HierarchyTree, NodeId};
use crate::tree::build_hierarchy;

/// A positioned cell in the treemap layout.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutCell {
    pub node: NodeId,
    pub name: CompactString,
    /// Item value for leaves, aggregated weight for groups
    pub weight: f64,
    /// Counter-clockwise outline
    pub polygon: Vec<Point>,
    pub depth: u16,
    /// Index of the enclosing cell in `Layout::cells` (None for the root)
    pub parent: Option<usize>,
    pub area: f64,
    /// Share of the parent's area this cell was solved for
    pub target_fraction: f64,
    /// `|area / parent area - target| / target` as reached by the solver
    pub area_error: f64,
    pub is_leaf: bool,
    /// Indices of the cells directly inside this one (siblings are stored
    /// next to each other)
    pub children: Range<usize>,
}

impl LayoutCell {
    /// Where a renderer should anchor a label (the area centroid).
    pub fn label_anchor(&self) -> Point {
        polygon::centroid(&self.polygon)
    }
}

/// The full layout result (cells + fast lookup + quality report).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    /// Arena of cells; index 0 is the root (the clip polygon itself) unless empty.
    /// Parents always precede their children.
    pub cells: Vec<LayoutCell>,
    /// node → index into `cells`
    pub node_to_cell: HashMap<NodeId, usize>,
    /// Subtrees whose solve stopped short of the tolerance
    pub warnings: Vec<ConvergenceWarning>,
}

impl Layout {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when there was nothing to lay out (zero total weight).
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether every subdivision reached the tolerance.
    pub fn converged(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn cell_for(&self, node: NodeId) -> Option<&LayoutCell> {
        self.node_to_cell.get(&node).map(|&i| &self.cells[i])
    }

    /// First cell with the given name, in arena order.
    pub fn find(&self, name: &str) -> Option<&LayoutCell> {
        self.cells.iter().find(|c| c.name == name)
    }

    /// Indices of the cells directly inside `cell`.
    pub fn children(&self, cell: usize) -> Range<usize> {
        self.cells.get(cell).map_or(0..0, |c| c.children.clone())
    }

    /// Cells representing input items.
    pub fn leaves(&self) -> impl Iterator<Item = &LayoutCell> {
        self.cells.iter().filter(|c| c.is_leaf && c.depth > 0)
    }

    /// Top-level group cells (the ones a renderer outlines).
    pub fn groups(&self) -> impl Iterator<Item = &LayoutCell> {
        self.cells.iter().filter(|c| c.depth == 1 && !c.is_leaf)
    }

    pub fn parent_name(&self, cell: usize) -> Option<&str> {
        let parent = self.cells.get(cell)?.parent?;
        Some(self.cells[parent].name.as_str())
    }

    /// Cell weight as a percentage of the root weight.
    pub fn share_of_total(&self, cell: usize) -> f64 {
        match (self.cells.first(), self.cells.get(cell)) {
            (Some(root), Some(c)) if root.weight > 0.0 => c.weight / root.weight * 100.0,
            _ => 0.0,
        }
    }
}

/// Configuration for Voronoi treemap layout.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Maximum relative area error per cell before a level counts as converged
    pub convergence_tolerance: f64,
    /// Weight-solver iteration budget per subdivision
    pub max_iterations: usize,
    /// Seed for site placement; identical inputs and seed give identical output
    pub random_seed: u64,
    /// Cells smaller than this fraction of the root area are not subdivided
    pub min_area_fraction: f64,
    /// Maximum recursion depth (safety)
    pub max_depth: u16,
    /// Subdivide the cells of one level on the rayon pool
    pub parallel: bool,
    /// Wall-clock budget for the whole layout; solvers stop early once it is spent
    pub time_budget: Option<Duration>,
    /// Lloyd relaxation cadence inside the solver (0 disables)
    pub lloyd_interval: usize,
    /// Initial site placement
    pub seed: SeedConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            convergence_tolerance: 1e-2,
            max_iterations: 200,
            random_seed: 0x5EED,
            min_area_fraction: 1e-9,
            max_depth: 64,
            parallel: true,
            time_budget: None,
            lloyd_interval: 5,
            seed: SeedConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            tolerance: self.convergence_tolerance,
            max_iterations: self.max_iterations,
            lloyd_interval: self.lloyd_interval,
            ..SolverConfig::default()
        }
    }
}

/// Validate the outline, build the hierarchy and lay it out in one call.
pub fn layout_items(
    items: &[WeightedItem],
    clip: Vec<Point>,
    config: &LayoutConfig,
) -> Result<Layout, LayoutError> {
    let clip = ClipPolygon::new(clip)?;
    let tree = build_hierarchy(items)?;
    compute_layout(&tree, &clip, config)
}

/// Compute the layout of the whole tree inside `clip`.
///
/// Levels are processed top-down; every cell of a level is subdivided
/// independently (in parallel when enabled) before the next level starts, since
/// a child's region is only known once its own cell exists.
pub fn compute_layout(
    tree: &HierarchyTree,
    clip: &ClipPolygon,
    config: &LayoutConfig,
) -> Result<Layout, LayoutError> {
    let root = tree.root;
    let root_node = tree.get(root);
    if !(root_node.weight > 0.0) {
        tracing::info!("Nothing to lay out: total weight is {}", root_node.weight);
        return Ok(Layout::default());
    }

    let deadline = config.time_budget.map(|budget| Instant::now() + budget);
    let min_area = config.min_area_fraction * clip.area();

    tracing::info!(
        "Laying out {} nodes (total weight {}) in region of area {:.2}",
        tree.len(),
        root_node.weight,
        clip.area()
    );

    let mut layout = Layout::default();
    layout.cells.push(LayoutCell {
        node: root,
        name: root_node.name.clone(),
        weight: root_node.weight,
        polygon: clip.points().to_vec(),
        depth: 0,
        parent: None,
        area: clip.area(),
        target_fraction: 1.0,
        area_error: 0.0,
        is_leaf: root_node.is_leaf(),
        children: 0..0,
    });
    layout.node_to_cell.insert(root, 0);

    let mut frontier: Vec<usize> = if root_node.is_leaf() { Vec::new() } else { vec![0] };

    while !frontier.is_empty() {
        let results: Vec<Result<Subdivision, LayoutError>> = {
            let cells = &layout.cells;
            let run = |&idx: &usize| {
                let cell = &cells[idx];
                subdivide(tree, cell.node, &cell.polygon, cell.depth, config, deadline)
            };
            if config.parallel {
                frontier.par_iter().map(run).collect()
            } else {
                frontier.iter().map(run).collect()
            }
        };

        let mut next = Vec::new();
        for (&parent_idx, result) in frontier.iter().zip(results) {
            let parent_depth = layout.cells[parent_idx].depth;
            let parent_node = layout.cells[parent_idx].node;

            let sub = match result {
                Ok(sub) => sub,
                Err(err) if parent_depth == 0 => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        "Skipping children of '{}': {}",
                        layout.cells[parent_idx].name,
                        err
                    );
                    layout.warnings.push(ConvergenceWarning {
                        node: parent_node,
                        name: layout.cells[parent_idx].name.clone(),
                        depth: parent_depth,
                        max_error: 1.0,
                        iterations: 0,
                        reason: WarningReason::DegenerateSubregion,
                    });
                    continue;
                }
            };

            if let Some(warning) = sub.warning {
                tracing::warn!("Approximate layout: {}", warning);
                layout.warnings.push(warning);
            }

            let first = layout.cells.len();
            for child in sub.cells {
                let node = tree.get(child.node);
                let idx = layout.cells.len();
                let depth = parent_depth + 1;
                let recurse = !node.is_leaf() && child.area > min_area && depth < config.max_depth;

                layout.cells.push(LayoutCell {
                    node: child.node,
                    name: node.name.clone(),
                    weight: node.weight,
                    polygon: child.polygon,
                    depth,
                    parent: Some(parent_idx),
                    area: child.area,
                    target_fraction: child.target_fraction,
                    area_error: child.area_error,
                    is_leaf: node.is_leaf(),
                    children: 0..0,
                });
                layout.node_to_cell.insert(child.node, idx);

                if recurse {
                    next.push(idx);
                }
            }
            layout.cells[parent_idx].children = first..layout.cells.len();
        }
        frontier = next;
    }

    tracing::info!(
        "Layout computed: {} cells, {} warnings",
        layout.cells.len(),
        layout.warnings.len()
    );

    Ok(layout)
}

/// Children of one cell, as solved.
struct Subdivision {
    cells: Vec<ChildCell>,
    warning: Option<ConvergenceWarning>,
}

struct ChildCell {
    node: NodeId,
    polygon: Vec<Point>,
    area: f64,
    target_fraction: f64,
    area_error: f64,
}

/// Derive a per-subtree seed so results do not depend on evaluation order.
fn subtree_seed(seed: u64, node: NodeId) -> u64 {
    // splitmix64 finaliser
    let mut z = seed ^ (node.0 as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Partition `region` among the positive-weight children of `parent`.
fn subdivide(
    tree: &HierarchyTree,
    parent: NodeId,
    region: &[Point],
    depth: u16,
    config: &LayoutConfig,
    deadline: Option<Instant>,
) -> Result<Subdivision, LayoutError> {
    // Zero-weight children get neither a site nor a cell.
    let children: Vec<NodeId> = tree
        .children(parent)
        .filter(|&id| tree.get(id).weight > 0.0)
        .collect();
    let parent_weight: f64 = children.iter().map(|&id| tree.get(id).weight).sum();
    let region_area = polygon::area(region);

    match children.len() {
        0 => {
            return Ok(Subdivision {
                cells: Vec::new(),
                warning: None,
            })
        }
        1 => {
            return Ok(Subdivision {
                cells: vec![ChildCell {
                    node: children[0],
                    polygon: region.to_vec(),
                    area: region_area,
                    target_fraction: 1.0,
                    area_error: 0.0,
                }],
                warning: None,
            })
        }
        _ => {}
    }

    let mut rng = StdRng::seed_from_u64(subtree_seed(config.random_seed, parent));
    let positions = seed::initial_positions(region, children.len(), &config.seed, &mut rng)?;
    let sites: Vec<Site> = positions
        .into_iter()
        .zip(&children)
        .map(|(position, &id)| Site {
            position,
            target_fraction: tree.get(id).weight / parent_weight,
            weight: 0.0,
        })
        .collect();

    let outcome = solver::solve(region, sites, &config.solver_config(), &mut rng, deadline);

    tracing::debug!(
        "Subdivided '{}' into {} cells: max error {:.4} after {} iterations ({:?})",
        tree.get(parent).name,
        children.len(),
        outcome.max_error,
        outcome.iterations,
        outcome.status
    );

    let reason = match outcome.status {
        SolveStatus::Converged => None,
        SolveStatus::IterationBudget => Some(WarningReason::IterationBudget),
        SolveStatus::Deadline => Some(WarningReason::Deadline),
        SolveStatus::CollapsedCell => Some(WarningReason::CollapsedCell),
    };
    let warning = reason.map(|reason| ConvergenceWarning {
        node: parent,
        name: tree.get(parent).name.clone(),
        depth,
        max_error: outcome.max_error,
        iterations: outcome.iterations,
        reason,
    });

    let cells = children
        .iter()
        .zip(outcome.sites.iter().zip(outcome.cells))
        .zip(outcome.errors)
        .filter(|((_, (_, cell)), _)| !cell.is_empty())
        .map(|((&node, (site, cell)), area_error)| ChildCell {
            node,
            area: cell.area,
            polygon: cell.polygon,
            target_fraction: site.target_fraction,
            area_error,
        })
        .collect();

    Ok(Subdivision { cells, warning })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(side, 0.0),
            Point::new(side, side),
            Point::new(0.0, side),
        ]
    }

    fn leaf_area(layout: &Layout, name: &str) -> f64 {
        layout.find(name).map(|c| c.area).unwrap_or(0.0)
    }

    #[test]
    fn two_equal_leaves_split_a_square() {
        let items = [WeightedItem::new("A", 1.0), WeightedItem::new("B", 1.0)];
        let layout = layout_items(&items, square(10.0), &LayoutConfig::default()).unwrap();
        assert!(layout.converged());
        assert_eq!(layout.len(), 3);
        assert!((leaf_area(&layout, "A") - 50.0).abs() < 1.0);
        assert!((leaf_area(&layout, "B") - 50.0).abs() < 1.0);

        // The two cells meet along one edge: at least two shared vertices.
        let a = &layout.find("A").unwrap().polygon;
        let b = &layout.find("B").unwrap().polygon;
        let shared = a
            .iter()
            .filter(|p| b.iter().any(|q| p.distance(*q) < 1e-6))
            .count();
        assert!(shared >= 2, "shared vertices: {shared}");
        let overlap = polygon::clip_to_convex(a, b);
        assert!(polygon::area(&overlap) < 1e-6);
    }

    #[test]
    fn three_to_one_leaves() {
        let items = [WeightedItem::new("X", 3.0), WeightedItem::new("Y", 1.0)];
        let layout = layout_items(&items, square(10.0), &LayoutConfig::default()).unwrap();
        assert!((leaf_area(&layout, "X") - 75.0).abs() < 1.0);
        assert!((leaf_area(&layout, "Y") - 25.0).abs() < 1.0);
    }

    #[test]
    fn groups_nest_inside_their_cells() {
        let items = [
            WeightedItem::grouped("A", 1.0, "G1"),
            WeightedItem::grouped("B", 1.0, "G1"),
            WeightedItem::grouped("C", 2.0, "G2"),
        ];
        let layout = layout_items(&items, square(10.0), &LayoutConfig::default()).unwrap();
        assert!(layout.converged(), "{:?}", layout.warnings);

        assert!((leaf_area(&layout, "G1") - 50.0).abs() < 1.0);
        assert!((leaf_area(&layout, "G2") - 50.0).abs() < 1.0);
        assert!((leaf_area(&layout, "A") - 25.0).abs() < 1.0);
        assert!((leaf_area(&layout, "B") - 25.0).abs() < 1.0);

        // C is G2's only child and inherits its polygon.
        let g2 = layout.find("G2").unwrap();
        let c = layout.find("C").unwrap();
        assert_eq!(g2.polygon, c.polygon);

        let a_idx = layout.cells.iter().position(|c| c.name == "A").unwrap();
        assert_eq!(layout.parent_name(a_idx), Some("G1"));
        assert_eq!(layout.find("A").unwrap().depth, 2);
        assert_eq!(layout.groups().count(), 2);
        assert_eq!(layout.leaves().count(), 3);
        assert!((layout.share_of_total(a_idx) - 25.0).abs() < 1e-9);

        // A and B lie inside G1.
        let g1 = &layout.find("G1").unwrap().polygon;
        for name in ["A", "B"] {
            let cell = &layout.find(name).unwrap().polygon;
            let inside = polygon::area(&polygon::clip_to_convex(cell, g1));
            assert!((inside - polygon::area(cell)).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_value_leaf_gets_no_cell() {
        let items = [
            WeightedItem::new("A", 1.0),
            WeightedItem::new("Z", 0.0),
            WeightedItem::new("C", 1.0),
        ];
        let layout = layout_items(&items, square(10.0), &LayoutConfig::default()).unwrap();
        assert!(layout.find("Z").is_none());
        assert!((leaf_area(&layout, "A") - 50.0).abs() < 1.0);
        assert!((leaf_area(&layout, "C") - 50.0).abs() < 1.0);
    }

    #[test]
    fn zero_area_clip_is_fatal() {
        let items = [WeightedItem::new("A", 1.0)];
        let flat = vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(20.0, 0.0)];
        let err = layout_items(&items, flat, &LayoutConfig::default()).unwrap_err();
        assert!(matches!(err, LayoutError::DegenerateRegion { .. }));
    }

    #[test]
    fn zero_total_weight_is_an_empty_layout() {
        let items = [WeightedItem::new("A", 0.0), WeightedItem::grouped("B", 0.0, "g")];
        let layout = layout_items(&items, square(10.0), &LayoutConfig::default()).unwrap();
        assert!(layout.is_empty());
        assert!(layout.warnings.is_empty());

        let layout = layout_items(&[], square(10.0), &LayoutConfig::default()).unwrap();
        assert!(layout.is_empty());
    }

    fn mixed_items() -> Vec<WeightedItem> {
        vec![
            WeightedItem::grouped("cafe", 4.0, "food"),
            WeightedItem::grouped("bar", 2.0, "food"),
            WeightedItem::grouped("bakery", 1.0, "food"),
            WeightedItem::grouped("park", 3.0, "leisure"),
            WeightedItem::grouped("garden", 1.0, "leisure"),
            WeightedItem::grouped("bank", 2.0, "finance"),
            WeightedItem::new("school", 2.0),
            WeightedItem::new("clinic", 1.5),
        ]
    }

    fn circle() -> Vec<Point> {
        ClipPolygon::circle(Point::new(200.0, 200.0), 190.0, 100)
            .unwrap()
            .into_points()
    }

    #[test]
    fn siblings_partition_their_parent_proportionally() {
        let config = LayoutConfig::default();
        let layout = layout_items(&mixed_items(), circle(), &config).unwrap();
        assert!(layout.converged(), "{:?}", layout.warnings);

        for (idx, parent) in layout.cells.iter().enumerate() {
            let kids: Vec<usize> = layout.children(idx).collect();
            assert!(kids.iter().all(|&k| layout.cells[k].parent == Some(idx)));
            assert_eq!(kids.len(), layout.cells.iter().filter(|c| c.parent == Some(idx)).count());
            if kids.is_empty() {
                continue;
            }
            let sum: f64 = kids.iter().map(|&k| layout.cells[k].area).sum();
            assert!((sum - parent.area).abs() < 1e-6 * parent.area, "area lost under '{}'", parent.name);

            let parent_weight: f64 = kids.iter().map(|&k| layout.cells[k].weight).sum();
            for &k in &kids {
                let cell = &layout.cells[k];
                let share = cell.area / parent.area;
                assert!(
                    (share - cell.weight / parent_weight).abs() < config.convergence_tolerance,
                    "'{}' covers {share}",
                    cell.name
                );
            }

            for (n, &a) in kids.iter().enumerate() {
                for &b in &kids[n + 1..] {
                    let overlap = polygon::clip_to_convex(&layout.cells[a].polygon, &layout.cells[b].polygon);
                    assert!(polygon::area(&overlap) < 1e-6 * parent.area);
                }
            }
        }
    }

    #[test]
    fn same_seed_is_bit_for_bit_reproducible() {
        let config = LayoutConfig::default();
        let first = layout_items(&mixed_items(), circle(), &config).unwrap();
        let second = layout_items(&mixed_items(), circle(), &config).unwrap();
        assert_eq!(first, second);

        let sequential = LayoutConfig {
            parallel: false,
            ..LayoutConfig::default()
        };
        let third = layout_items(&mixed_items(), circle(), &sequential).unwrap();
        assert_eq!(first.cells, third.cells);
    }

    #[test]
    fn spent_time_budget_still_returns_a_layout() {
        let config = LayoutConfig {
            time_budget: Some(Duration::ZERO),
            ..LayoutConfig::default()
        };
        let layout = layout_items(&mixed_items(), circle(), &config).unwrap();
        assert!(!layout.is_empty());
        assert!(layout
            .warnings
            .iter()
            .all(|w| w.reason == WarningReason::Deadline));
        let total: f64 = layout.children(0).map(|k| layout.cells[k].area).sum();
        assert!((total - layout.cells[0].area).abs() < 1e-6 * total);
    }

    #[test]
    fn depth_limit_stops_recursion() {
        let config = LayoutConfig {
            max_depth: 1,
            ..LayoutConfig::default()
        };
        let layout = layout_items(&mixed_items(), circle(), &config).unwrap();
        assert!(layout.cells.iter().all(|c| c.depth <= 1));
        assert!(layout.find("cafe").is_none());
        assert!(layout.find("food").is_some());
    }

    #[test]
    fn one_heavy_item_among_many_light_ones_keeps_its_share() {
        let mut items = vec![WeightedItem::new("big", 300.0)];
        items.extend((0..30).map(|i| WeightedItem::new(&format!("t{i}"), 1.0)));
        let clip = ClipPolygon::circle(Point::new(0.0, 0.0), 100.0, 100)
            .unwrap()
            .into_points();
        let config = LayoutConfig {
            max_iterations: 1000,
            ..LayoutConfig::default()
        };
        let layout = layout_items(&items, clip, &config).unwrap();

        let share = leaf_area(&layout, "big") / layout.cells[0].area;
        assert!((share - 300.0 / 330.0).abs() < 0.02, "big covers {share}");

        let collapsed = layout
            .warnings
            .iter()
            .any(|w| w.reason == WarningReason::CollapsedCell);
        if !collapsed {
            assert_eq!(layout.leaves().count(), 31);
        }
    }

    #[test]
    fn unseedable_group_does_not_take_down_its_sibling() {
        // 40 draws per region: enough for two sites, never for fifty.
        let config = LayoutConfig {
            seed: SeedConfig {
                candidates_per_site: 1,
                base_attempts: 40,
                attempts_per_site: 0,
                relaxation_passes: 3,
            },
            ..LayoutConfig::default()
        };
        let mut items: Vec<WeightedItem> = (0..50)
            .map(|i| WeightedItem::grouped(&format!("a{i}"), 1.0, "crowded"))
            .collect();
        items.push(WeightedItem::grouped("b1", 25.0, "sparse"));
        items.push(WeightedItem::grouped("b2", 25.0, "sparse"));

        let layout = layout_items(&items, circle(), &config).unwrap();

        let skipped: Vec<&ConvergenceWarning> = layout
            .warnings
            .iter()
            .filter(|w| w.reason == WarningReason::DegenerateSubregion)
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].name, "crowded");
        assert_eq!(skipped[0].depth, 1);

        let crowded = layout.cells.iter().position(|c| c.name == "crowded").unwrap();
        assert_eq!(layout.children(crowded).count(), 0);
        assert!(layout.find("a0").is_none());

        let sparse = layout.cells.iter().position(|c| c.name == "sparse").unwrap();
        let kids: Vec<usize> = layout.children(sparse).collect();
        assert_eq!(kids.len(), 2);
        let sum: f64 = kids.iter().map(|&k| layout.cells[k].area).sum();
        assert!((sum - layout.cells[sparse].area).abs() < 1e-6 * sum);
    }
}
