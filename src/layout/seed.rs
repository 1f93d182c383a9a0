use rand::Rng;

use crate::error::LayoutError;
use crate::geometry::power::{power_cells, WeightedSite};
use crate::geometry::{polygon, BoundingBox, Point};

/// Knobs for initial site placement.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// Candidates drawn per site; the one farthest from already placed sites wins
    pub candidates_per_site: usize,
    /// Fixed part of the sampling budget
    pub base_attempts: usize,
    /// Additional sampling budget per requested site
    pub attempts_per_site: usize,
    /// Unweighted Lloyd passes run after sampling
    pub relaxation_passes: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            candidates_per_site: 8,
            base_attempts: 10_000,
            attempts_per_site: 200,
            relaxation_passes: 3,
        }
    }
}

/// Draw one uniform point inside `region`, giving up after `attempts` misses.
pub fn sample_inside<R: Rng + ?Sized>(
    region: &[Point],
    bbox: &BoundingBox,
    rng: &mut R,
    attempts: usize,
) -> Option<Point> {
    (0..attempts)
        .map(|_| bbox.at(rng.random::<f64>(), rng.random::<f64>()))
        .find(|&p| polygon::contains(region, p))
}

/// Produce `n` well-spread points strictly inside `region`.
///
/// Best-candidate sampling from the bounding box followed by a few unweighted
/// Lloyd passes. Every draw counts against a fixed budget, so a region that
/// cannot be hit (zero area, sliver) ends in `DegenerateRegion` instead of
/// looping.
pub fn initial_positions<R: Rng + ?Sized>(
    region: &[Point],
    n: usize,
    config: &SeedConfig,
    rng: &mut R,
) -> Result<Vec<Point>, LayoutError> {
    let region_area = polygon::area(region);
    let bbox = BoundingBox::of(region)
        .ok_or_else(|| LayoutError::degenerate("region has no vertices"))?;
    let extent = bbox.width().max(bbox.height());
    if !(region_area > polygon::AREA_EPSILON * extent * extent) {
        return Err(LayoutError::degenerate(format!(
            "region area {region_area} is too small to place sites"
        )));
    }

    let mut budget = config.base_attempts + config.attempts_per_site * n;
    let mut points: Vec<Point> = Vec::with_capacity(n);
    let candidates = config.candidates_per_site.max(1);

    while points.len() < n {
        let mut best: Option<(Point, f64)> = None;
        let mut drawn = 0;
        while drawn < candidates && budget > 0 {
            budget -= 1;
            let p = bbox.at(rng.random::<f64>(), rng.random::<f64>());
            if !polygon::contains(region, p) {
                continue;
            }
            drawn += 1;
            let spacing = points
                .iter()
                .map(|q| q.distance_sq(p))
                .fold(f64::INFINITY, f64::min);
            if best.map_or(true, |(_, d)| spacing > d) {
                best = Some((p, spacing));
            }
        }

        match best {
            Some((p, _)) => points.push(p),
            None => {
                return Err(LayoutError::degenerate(format!(
                    "sampling budget exhausted after placing {} of {} sites",
                    points.len(),
                    n
                )));
            }
        }
    }

    for _ in 0..config.relaxation_passes {
        relax_toward_centroids(region, &mut points, &vec![0.0; n], 1.0);
    }

    Ok(points)
}

/// Move each point `step` of the way toward the centroid of its power cell.
///
/// Moves whose target falls outside the region, and points whose cell is
/// empty, are skipped.
pub fn relax_toward_centroids(region: &[Point], points: &mut [Point], weights: &[f64], step: f64) {
    let sites: Vec<WeightedSite> = points
        .iter()
        .zip(weights)
        .map(|(&position, &weight)| WeightedSite { position, weight })
        .collect();
    let cells = power_cells(region, &sites);

    for (point, cell) in points.iter_mut().zip(&cells) {
        if cell.is_empty() || cell.area <= 0.0 {
            continue;
        }
        let target = point.lerp(cell.centroid(), step);
        if polygon::contains(region, target) {
            *point = target;
        }
    }
}
