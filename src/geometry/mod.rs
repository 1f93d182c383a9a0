pub mod polygon;
pub mod power;

use std::ops::{Add, Mul, Sub};

use crate::error::LayoutError;

/// A point (or vector) in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 3D cross product.
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn norm_sq(self) -> f64 {
        self.dot(self)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self - other).norm_sq().sqrt()
    }

    pub fn distance_sq(self, other: Point) -> f64 {
        (self - other).norm_sq()
    }

    pub fn lerp(self, other: Point, t: f64) -> Point {
        self + (other - self) * t
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned bounds of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Returns `None` for an empty slice.
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = *points.first()?;
        let mut bbox = BoundingBox {
            min: first,
            max: first,
        };
        for p in &points[1..] {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Map unit coordinates `(u, v)` in [0, 1)² into the box.
    pub fn at(&self, u: f64, v: f64) -> Point {
        Point::new(
            self.min.x + u * self.width(),
            self.min.y + v * self.height(),
        )
    }
}

/// The validated region a layout is confined to.
///
/// Always holds at least three finite vertices in counter-clockwise order and
/// encloses a positive area.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPolygon {
    points: Vec<Point>,
    area: f64,
}

impl ClipPolygon {
    /// Validate and normalise a caller-supplied outline.
    ///
    /// Consecutive duplicate vertices (and a closing vertex equal to the first)
    /// are dropped, clockwise input is reversed. Non-finite coordinates, fewer
    /// than three distinct vertices, self-intersections or zero area yield
    /// [`LayoutError::DegenerateRegion`].
    pub fn new(points: Vec<Point>) -> Result<Self, LayoutError> {
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            return Err(LayoutError::degenerate(format!(
                "non-finite vertex ({}, {})",
                bad.x, bad.y
            )));
        }

        let mut cleaned: Vec<Point> = Vec::with_capacity(points.len());
        for p in points {
            if cleaned.last() != Some(&p) {
                cleaned.push(p);
            }
        }
        while cleaned.len() > 1 && cleaned.first() == cleaned.last() {
            cleaned.pop();
        }

        if cleaned.len() < 3 {
            return Err(LayoutError::degenerate(format!(
                "{} distinct vertices, need at least 3",
                cleaned.len()
            )));
        }

        let signed = polygon::signed_area(&cleaned);
        let scale = BoundingBox::of(&cleaned)
            .map(|b| b.width().max(b.height()))
            .unwrap_or(0.0);
        if !(signed.abs() > polygon::AREA_EPSILON * scale * scale) || scale <= 0.0 {
            return Err(LayoutError::degenerate(format!(
                "polygon area {signed} is not positive"
            )));
        }
        if signed < 0.0 {
            cleaned.reverse();
        }
        if !polygon::is_simple(&cleaned) {
            return Err(LayoutError::degenerate("polygon edges self-intersect"));
        }

        Ok(Self {
            area: signed.abs(),
            points: cleaned,
        })
    }

    /// Regular `segments`-gon inscribed in the circle, starting at angle 0.
    pub fn circle(center: Point, radius: f64, segments: usize) -> Result<Self, LayoutError> {
        let points = (0..segments)
            .map(|i| {
                let theta = i as f64 / segments as f64 * std::f64::consts::TAU;
                Point::new(
                    center.x + radius * theta.cos(),
                    center.y + radius * theta.sin(),
                )
            })
            .collect();
        Self::new(points)
    }

    pub fn rectangle(x: f64, y: f64, w: f64, h: f64) -> Result<Self, LayoutError> {
        Self::new(vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ])
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }
}
