//! Core data types for scanned point clouds.
//!
//! Coordinates are kept in double precision throughout processing; the PCD
//! writer narrows them to `f32` only when records are stored.

use glam::DVec3;

/// A single 3D point (x, y, z) in scanner space.
pub type Point3D = DVec3;

/// Fallback normal reported when a surface could not be estimated.
pub const FALLBACK_NORMAL: DVec3 = DVec3::Z;

/// An ordered sequence of points, in the order they were read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point3D>,
}

impl PointCloud {
    /// Create a cloud from positions, preserving their order.
    pub fn new(points: Vec<Point3D>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3D> {
        self.points.iter()
    }

    pub fn push(&mut self, point: Point3D) {
        self.points.push(point);
    }

    /// Axis-aligned bounds as `(min, max)`, or `None` for an empty cloud.
    pub fn bounds(&self) -> Option<(Point3D, Point3D)> {
        let first = *self.points.first()?;
        Some(
            self.points
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }
}

impl From<Vec<Point3D>> for PointCloud {
    fn from(points: Vec<Point3D>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<Point3D> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3D>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point3D;
    type IntoIter = std::slice::Iter<'a, Point3D>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// A resampled surface point with its unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalPoint {
    /// Smoothed position.
    pub position: Point3D,
    /// Unit surface normal at `position`.
    pub normal: DVec3,
    /// Surface variation of the neighbourhood (0 for a perfect plane).
    pub curvature: f64,
}

impl NormalPoint {
    /// Create a normal point; the normal is normalized, falling back to
    /// [`FALLBACK_NORMAL`] when it has no usable direction.
    pub fn new(position: Point3D, normal: DVec3, curvature: f64) -> Self {
        Self {
            position,
            normal: normal.try_normalize().unwrap_or(FALLBACK_NORMAL),
            curvature,
        }
    }

    /// A point that passed through without a surface estimate.
    pub fn unestimated(position: Point3D) -> Self {
        Self {
            position,
            normal: FALLBACK_NORMAL,
            curvature: 0.0,
        }
    }
}
