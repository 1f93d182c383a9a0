use super::polygon;
use super::Point;

/// A generator of the power diagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedSite {
    pub position: Point,
    /// Additive weight, subtracted from the squared distance.
    pub weight: f64,
}

/// One site's region of the power diagram, restricted to the clip region.
#[derive(Debug, Clone, Default)]
pub struct PowerCell {
    /// Counter-clockwise outline; empty when the cell collapsed.
    pub polygon: Vec<Point>,
    /// `edges[k]` is the neighbour whose radical line produced the edge
    /// `polygon[k] -> polygon[k + 1]`, or `None` on the region boundary.
    pub edges: Vec<Option<usize>>,
    pub area: f64,
}

impl PowerCell {
    pub fn is_empty(&self) -> bool {
        self.polygon.len() < 3
    }

    /// Total length of the boundary shared with site `neighbor`.
    pub fn shared_boundary(&self, neighbor: usize) -> f64 {
        self.edge_lengths()
            .filter(|&(tag, _)| tag == Some(neighbor))
            .map(|(_, len)| len)
            .sum()
    }

    /// Distinct neighbours in boundary order.
    pub fn neighbors(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for tag in self.edges.iter().flatten() {
            if !out.contains(tag) {
                out.push(*tag);
            }
        }
        out
    }

    /// `(tag, length)` for every edge.
    pub fn edge_lengths(&self) -> impl Iterator<Item = (Option<usize>, f64)> + '_ {
        let n = self.polygon.len();
        (0..n).map(move |k| {
            let len = self.polygon[k].distance(self.polygon[(k + 1) % n]);
            (self.edges[k], len)
        })
    }

    pub fn centroid(&self) -> Point {
        polygon::centroid(&self.polygon)
    }
}

/// Compute the power diagram of `sites` clipped to `region`.
///
/// `region` must be counter-clockwise but need not be convex: each cell is the
/// region clipped by one half-plane per other site. Returns one cell per site
/// in input order.
pub fn power_cells(region: &[Point], sites: &[WeightedSite]) -> Vec<PowerCell> {
    (0..sites.len())
        .map(|i| power_cell(region, sites, i))
        .collect()
}

fn power_cell(region: &[Point], sites: &[WeightedSite], i: usize) -> PowerCell {
    let si = sites[i];
    let mut current: Vec<(Point, Option<usize>)> = region.iter().map(|&p| (p, None)).collect();

    for (j, sj) in sites.iter().enumerate() {
        if j == i {
            continue;
        }
        let d = sj.position - si.position;
        let dist_sq = d.norm_sq();
        if dist_sq == 0.0 {
            // Coincident generators: the heavier one takes everything, ties go
            // to the lower index.
            if sj.weight > si.weight || (sj.weight == si.weight && j < i) {
                return PowerCell::default();
            }
            continue;
        }

        // |q|² - wi <= |q - d|² - wj  with q = p - si  <=>  q·d <= (|d|² + wi - wj) / 2
        let offset = 0.5 * (dist_sq + si.weight - sj.weight);
        current = polygon::clip_half_plane(&current, si.position, d, offset, Some(j));
        if current.is_empty() {
            return PowerCell::default();
        }
    }

    let (polygon, edges): (Vec<Point>, Vec<Option<usize>>) = current.into_iter().unzip();
    let area = polygon::area(&polygon);
    PowerCell {
        polygon,
        edges,
        area,
    }
}
