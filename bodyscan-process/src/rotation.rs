//! Rotation about the X axis.
//!
//! Angles are in degrees and positive angles rotate `+Y` toward `+Z`:
//!
//! ```text
//! y' = y cos(a) - z sin(a)
//! z' = y sin(a) + z cos(a)
//! ```

use bodyscan_data::Point3D;
use glam::DVec3;

/// A precomputed rotation about the X axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XRotation {
    sin: f64,
    cos: f64,
}

impl XRotation {
    pub fn from_degrees(angle_degrees: f64) -> Self {
        let (sin, cos) = angle_degrees.to_radians().sin_cos();
        Self { sin, cos }
    }

    pub fn identity() -> Self {
        Self::from_degrees(0.0)
    }

    /// Rotate only the `(y, z)` components.
    pub fn rotate_yz(&self, y: f64, z: f64) -> (f64, f64) {
        (y * self.cos - z * self.sin, y * self.sin + z * self.cos)
    }

    pub fn apply(&self, point: Point3D) -> Point3D {
        let (y, z) = self.rotate_yz(point.y, point.z);
        DVec3::new(point.x, y, z)
    }
}

impl Default for XRotation {
    fn default() -> Self {
        Self::identity()
    }
}

/// Rotate `point` by `angle_degrees` about the X axis.
pub fn rotate_about_x(point: Point3D, angle_degrees: f64) -> Point3D {
    XRotation::from_degrees(angle_degrees).apply(point)
}
