use super::Point;

/// Relative area (against the squared extent) below which a polygon counts as
/// flat.
pub const AREA_EPSILON: f64 = 1e-12;

/// Shoelace area, positive for counter-clockwise winding.
///
/// Summed relative to the first vertex so small polygons far from the origin
/// keep their precision.
pub fn signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let origin = points[0];
    let mut sum = 0.0;
    let mut prev = points[1] - origin;
    for &p in &points[2..] {
        let cur = p - origin;
        sum += prev.cross(cur);
        prev = cur;
    }
    sum * 0.5
}

pub fn area(points: &[Point]) -> f64 {
    signed_area(points).abs()
}

/// Area centroid. Falls back to the vertex mean for flat polygons so callers
/// never see NaN.
pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::default();
    }
    let n = points.len() as f64;
    let mean = points.iter().fold(Point::default(), |acc, &p| acc + p) * (1.0 / n);
    if points.len() < 3 {
        return mean;
    }

    // Accumulate relative to the mean to keep the products small.
    let mut a2 = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut prev = points[points.len() - 1] - mean;
    for &p in points {
        let cur = p - mean;
        let f = prev.cross(cur);
        a2 += f;
        cx += (prev.x + cur.x) * f;
        cy += (prev.y + cur.y) * f;
        prev = cur;
    }

    let extent = points
        .iter()
        .map(|p| (*p - mean).norm_sq())
        .fold(0.0, f64::max);
    if a2.abs() <= AREA_EPSILON * extent || a2 == 0.0 {
        return mean;
    }
    Point::new(mean.x + cx / (3.0 * a2), mean.y + cy / (3.0 * a2))
}

/// Crossing-number point-in-polygon test. Points exactly on the boundary may
/// land on either side.
pub fn contains(points: &[Point], p: Point) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b - a).cross(c - a)
}

fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// True when no two non-adjacent edges properly cross.
pub fn is_simple(points: &[Point]) -> bool {
    let n = points.len();
    if n < 4 {
        return true;
    }
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (points[j], points[(j + 1) % n]);
            if segments_cross(a, b, c, d) {
                return false;
            }
        }
    }
    true
}

/// Clip a polygon against the half-plane `normal · (p - origin) <= offset`.
///
/// Each vertex carries the tag of the edge that leaves it. Surviving parts of
/// an edge keep its tag, edges created along the clip line get `tag`. The
/// subject may be non-convex; the result can then contain zero-width bridges
/// but its area is exact.
pub fn clip_half_plane<T: Copy>(
    vertices: &[(Point, T)],
    origin: Point,
    normal: Point,
    offset: f64,
    tag: T,
) -> Vec<(Point, T)> {
    let n = vertices.len();
    let mut out = Vec::with_capacity(n + 2);
    if n == 0 {
        return out;
    }

    let side = |p: Point| normal.dot(p - origin) - offset;
    for k in 0..n {
        let (a, edge) = vertices[k];
        let (b, _) = vertices[(k + 1) % n];
        let sa = side(a);
        let sb = side(b);
        let a_in = sa <= 0.0;
        let b_in = sb <= 0.0;

        match (a_in, b_in) {
            (true, true) => out.push((a, edge)),
            (true, false) => {
                out.push((a, edge));
                out.push((a.lerp(b, sa / (sa - sb)), tag));
            }
            (false, true) => out.push((a.lerp(b, sa / (sa - sb)), edge)),
            (false, false) => {}
        }
    }

    if out.len() < 3 {
        out.clear();
    }
    out
}

/// Part of `subject` inside the convex, counter-clockwise `window`.
pub fn clip_to_convex(subject: &[Point], window: &[Point]) -> Vec<Point> {
    if window.len() < 3 {
        return Vec::new();
    }
    let mut current: Vec<(Point, ())> = subject.iter().map(|&p| (p, ())).collect();
    let n = window.len();
    for k in 0..n {
        if current.is_empty() {
            break;
        }
        let a = window[k];
        let d = window[(k + 1) % n] - a;
        current = clip_half_plane(&current, a, Point::new(d.y, -d.x), 0.0, ());
    }
    current.into_iter().map(|(p, _)| p).collect()
}
