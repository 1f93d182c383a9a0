use std::time::Instant;

use rand::Rng;

use super::seed;
use crate::geometry::power::{power_cells, PowerCell, WeightedSite};
use crate::geometry::{polygon, BoundingBox, Point};

/// Site being solved: a position, the share of the region it should cover and
/// its additive weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub position: Point,
    pub target_fraction: f64,
    pub weight: f64,
}

/// Iteration parameters of the weight solver.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Stop once every cell's relative area error is below this
    pub tolerance: f64,
    /// Weight updates allowed before giving up
    pub max_iterations: usize,
    /// Damping of the per-site Newton step (0.5 keeps neighbouring updates from oscillating)
    pub step: f64,
    /// Run a Lloyd move every this many iterations (0 disables)
    pub lloyd_interval: usize,
    /// Fraction of the distance to the centroid covered by a Lloyd move
    pub lloyd_step: f64,
    /// Lloyd moves only happen in the first `max_iterations * lloyd_phase` iterations
    pub lloyd_phase: f64,
    /// Consecutive empty iterations before a collapsed site is re-sampled
    pub collapse_patience: usize,
    /// Re-samples allowed per solve; afterwards collapsed sites are only rescued by weight
    pub max_perturbations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-2,
            max_iterations: 200,
            step: 0.5,
            lloyd_interval: 5,
            lloyd_step: 0.5,
            lloyd_phase: 0.25,
            collapse_patience: 3,
            max_perturbations: 16,
        }
    }
}

/// Why a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    IterationBudget,
    Deadline,
    /// Stopped short of the tolerance with at least one cell still empty
    CollapsedCell,
}

/// Best state reached by a solve.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub sites: Vec<Site>,
    pub cells: Vec<PowerCell>,
    /// Per-site `|area fraction - target| / target`
    pub errors: Vec<f64>,
    pub max_error: f64,
    /// Weight updates performed
    pub iterations: usize,
    pub perturbations: usize,
    pub status: SolveStatus,
}

impl SolveOutcome {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Floor for current areas, relative to the region area.
const AREA_FLOOR: f64 = 1e-12;

/// Adjust additive weights until each power cell covers its target share of
/// `region`.
///
/// The weight update is a damped Newton step on each site in isolation:
/// `h_i = Σ len_ij / (2 d_ij)` is the derivative of the cell area with respect
/// to its own weight, so `weight += step * (target / current - 1) * current / h_i`.
/// Returns the converged state, or else the state with the smallest absolute
/// share deviation seen (relative error breaks ties).
pub fn solve<R: Rng + ?Sized>(
    region: &[Point],
    mut sites: Vec<Site>,
    config: &SolverConfig,
    rng: &mut R,
    deadline: Option<Instant>,
) -> SolveOutcome {
    let total_area = polygon::area(region);
    let floor = AREA_FLOOR * total_area;
    let bbox = BoundingBox::of(region);
    let n = sites.len();

    let mut cells = compute_cells(region, &sites);
    let mut collapse_streak = vec![0usize; n];
    let mut perturbations = 0;
    let mut best: Option<(f64, SolveOutcome)> = None;
    let lloyd_until = (config.max_iterations as f64 * config.lloyd_phase) as usize;

    let mut iteration = 0;
    let status = loop {
        let errors = area_errors(&sites, &cells, total_area);
        let max_error = errors.iter().copied().fold(0.0, f64::max);
        let deviation = max_deviation(&sites, &cells, total_area);
        let converged = max_error < config.tolerance;
        let improved = best
            .as_ref()
            .map_or(true, |(d, b)| (deviation, max_error) < (*d, b.max_error));
        if converged || improved {
            best = Some((
                deviation,
                SolveOutcome {
                    sites: sites.clone(),
                    cells: cells.clone(),
                    errors,
                    max_error,
                    iterations: iteration,
                    perturbations,
                    status: SolveStatus::IterationBudget,
                },
            ));
        }

        if converged {
            break SolveStatus::Converged;
        }
        if iteration >= config.max_iterations {
            break SolveStatus::IterationBudget;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break SolveStatus::Deadline;
        }
        iteration += 1;

        let mut weights: Vec<f64> = sites.iter().map(|s| s.weight).collect();
        for i in 0..n {
            let area = cells[i].area;
            if area > floor {
                collapse_streak[i] = 0;
                weights[i] += weight_step(i, &sites, &cells[i], total_area, floor, config.step);
                continue;
            }

            collapse_streak[i] += 1;
            if collapse_streak[i] < config.collapse_patience {
                weights[i] = rescue_weight(i, &sites, total_area);
                continue;
            }

            collapse_streak[i] = 0;
            let resampled = if perturbations < config.max_perturbations {
                bbox.as_ref()
                    .and_then(|b| seed::sample_inside(region, b, &mut *rng, 1_000))
            } else {
                None
            };
            match resampled {
                Some(p) => {
                    perturbations += 1;
                    tracing::trace!("Re-sampling collapsed site {} to ({:.3}, {:.3})", i, p.x, p.y);
                    sites[i].position = p;
                    weights[i] = weights.iter().sum::<f64>() / n as f64;
                }
                // Out of re-samples: keep rescuing in place.
                None => weights[i] = rescue_weight(i, &sites, total_area),
            }
        }

        let mean = weights.iter().sum::<f64>() / n as f64;
        for (site, w) in sites.iter_mut().zip(&weights) {
            site.weight = w - mean;
        }

        if config.lloyd_interval > 0 && iteration % config.lloyd_interval == 0 && iteration <= lloyd_until {
            let weights: Vec<f64> = sites.iter().map(|s| s.weight).collect();
            let mut positions: Vec<Point> = sites.iter().map(|s| s.position).collect();
            seed::relax_toward_centroids(region, &mut positions, &weights, config.lloyd_step);
            for (site, p) in sites.iter_mut().zip(positions) {
                site.position = p;
            }
        }

        cells = compute_cells(region, &sites);
    };

    let mut outcome = match best {
        Some((_, outcome)) => outcome,
        None => SolveOutcome {
            sites: Vec::new(),
            cells: Vec::new(),
            errors: Vec::new(),
            max_error: 0.0,
            iterations: 0,
            perturbations: 0,
            status: SolveStatus::Converged,
        },
    };
    outcome.status = if status != SolveStatus::Converged && outcome.cells.iter().any(PowerCell::is_empty) {
        SolveStatus::CollapsedCell
    } else {
        status
    };
    outcome.perturbations = perturbations;
    if status != SolveStatus::Converged {
        outcome.iterations = iteration;
    }
    outcome
}

fn compute_cells(region: &[Point], sites: &[Site]) -> Vec<PowerCell> {
    let weighted: Vec<WeightedSite> = sites
        .iter()
        .map(|s| WeightedSite {
            position: s.position,
            weight: s.weight,
        })
        .collect();
    power_cells(region, &weighted)
}

fn area_errors(sites: &[Site], cells: &[PowerCell], total_area: f64) -> Vec<f64> {
    sites
        .iter()
        .zip(cells)
        .map(|(s, c)| (c.area / total_area - s.target_fraction).abs() / s.target_fraction)
        .collect()
}

/// Largest `|area fraction - target|` over all sites. Unlike the relative
/// error this cannot be lowered by starving a large cell to feed tiny ones.
fn max_deviation(sites: &[Site], cells: &[PowerCell], total_area: f64) -> f64 {
    sites
        .iter()
        .zip(cells)
        .map(|(s, c)| (c.area / total_area - s.target_fraction).abs())
        .fold(0.0, f64::max)
}

/// Newton-style weight increment for a non-empty cell.
fn weight_step(
    i: usize,
    sites: &[Site],
    cell: &PowerCell,
    total_area: f64,
    floor: f64,
    step: f64,
) -> f64 {
    let here = sites[i].position;
    let mut h = 0.0;
    for (tag, len) in cell.edge_lengths() {
        if let Some(j) = tag {
            let d = here.distance(sites[j].position);
            if d > 0.0 {
                h += len / (2.0 * d);
            }
        }
    }
    // Covers the whole region with no neighbour edges: the others are empty
    // and get rescued on their own.
    if h <= 0.0 {
        return 0.0;
    }

    let current = cell.area.max(floor);
    let target = sites[i].target_fraction * total_area;
    let error_ratio = target / current;
    let delta = step * (error_ratio - 1.0) * (current / h);

    let nearest_sq = sites
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, s)| s.position.distance_sq(here))
        .filter(|&d| d > 0.0)
        .fold(f64::INFINITY, f64::min);
    let limit = if nearest_sq.is_finite() {
        0.5 * nearest_sq
    } else {
        total_area
    };
    delta.clamp(-limit, limit)
}

/// Smallest weight that puts site `i` back inside its own cell, plus a margin
/// worth a tenth of its target area.
fn rescue_weight(i: usize, sites: &[Site], total_area: f64) -> f64 {
    let here = sites[i].position;
    let needed = sites
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, s)| s.weight - s.position.distance_sq(here))
        .fold(f64::NEG_INFINITY, f64::max);
    let margin = 0.1 * sites[i].target_fraction * total_area;
    if needed.is_finite() {
        needed + margin
    } else {
        sites[i].weight
    }
}
