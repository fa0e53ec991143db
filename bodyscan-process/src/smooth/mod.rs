//! Moving least squares surface smoothing.
//!
//! Every input point produces exactly one output point. Its radius
//! neighbourhood defines a least-squares plane; a polynomial height field
//! of the configured order is then fitted over that plane with Gaussian
//! weights and the point is projected onto it. The output normal is the
//! polynomial surface normal at the projected point, oriented toward the
//! viewpoint.
//!
//! Neighbourhoods too small for the polynomial fall back to plane
//! projection (three or more neighbours) or pass the point through with
//! [`bodyscan_data::types::FALLBACK_NORMAL`] (fewer than three). Both cases
//! are counted in the [`SmoothReport`].

mod fit;

use crate::error::{ProcessError, ProcessResult};
use crate::progress::Progress;
use crate::spatial::SpatialIndex;
use bodyscan_data::{NormalPoint, PointCloud};
use fit::{LocalFrame, PolynomialSurface};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Minimum neighbourhood size for a plane estimate.
pub const MIN_PLANE_NEIGHBORS: usize = 3;

/// Highest accepted polynomial order.
pub const MAX_POLYNOMIAL_ORDER: usize = 8;

pub use fit::coefficient_count;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothParams {
    /// Total degree of the fitted polynomial. Zero projects onto the plane.
    pub polynomial_order: usize,
    /// Neighbourhood radius, in cloud units.
    pub search_radius: f64,
    /// Normals are flipped to face this point.
    pub viewpoint: DVec3,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            polynomial_order: 2,
            search_radius: 0.03,
            viewpoint: DVec3::ZERO,
        }
    }
}

impl SmoothParams {
    #[must_use]
    pub const fn with_polynomial_order(mut self, order: usize) -> Self {
        self.polynomial_order = order;
        self
    }

    #[must_use]
    pub const fn with_search_radius(mut self, radius: f64) -> Self {
        self.search_radius = radius;
        self
    }

    #[must_use]
    pub const fn with_viewpoint(mut self, viewpoint: DVec3) -> Self {
        self.viewpoint = viewpoint;
        self
    }

    pub fn validate(&self) -> ProcessResult<()> {
        if !(self.search_radius.is_finite() && self.search_radius > 0.0) {
            return Err(ProcessError::InvalidParameter(format!(
                "search_radius must be positive, got {}",
                self.search_radius
            )));
        }
        if self.polynomial_order > MAX_POLYNOMIAL_ORDER {
            return Err(ProcessError::InvalidParameter(format!(
                "polynomial_order must be at most {}, got {}",
                MAX_POLYNOMIAL_ORDER, self.polynomial_order
            )));
        }
        if !self.viewpoint.is_finite() {
            return Err(ProcessError::InvalidParameter(
                "viewpoint must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which estimate produced an output point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFit {
    Polynomial,
    Plane,
    Unestimated,
}

/// Counts of each [`SurfaceFit`] over a smoothing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmoothReport {
    pub polynomial: usize,
    pub plane: usize,
    pub unestimated: usize,
}

impl SmoothReport {
    fn record(&mut self, fit: SurfaceFit) {
        match fit {
            SurfaceFit::Polynomial => self.polynomial += 1,
            SurfaceFit::Plane => self.plane += 1,
            SurfaceFit::Unestimated => self.unestimated += 1,
        }
    }

    pub fn degraded(&self) -> usize {
        self.plane + self.unestimated
    }
}

#[derive(Debug, Clone)]
pub struct SmoothedCloud {
    pub points: Vec<NormalPoint>,
    pub report: SmoothReport,
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceSmoother {
    params: SmoothParams,
}

impl SurfaceSmoother {
    pub fn new(params: SmoothParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SmoothParams {
        &self.params
    }

    pub fn smooth(&self, cloud: &PointCloud) -> ProcessResult<SmoothedCloud> {
        self.smooth_with_progress(cloud, &mut Progress::none())
    }

    #[tracing::instrument(skip_all, fields(
        points = cloud.len(),
        order = self.params.polynomial_order,
        radius = self.params.search_radius,
    ))]
    pub fn smooth_with_progress(
        &self,
        cloud: &PointCloud,
        progress: &mut Progress<'_>,
    ) -> ProcessResult<SmoothedCloud> {
        self.params.validate()?;
        let index = SpatialIndex::build(&cloud.points)?;

        let estimates = progress.map_indexed(cloud.len(), |i| self.smooth_point(&index, i));

        let mut report = SmoothReport::default();
        let points = estimates
            .into_iter()
            .map(|(point, fit)| {
                report.record(fit);
                point
            })
            .collect();

        if report.degraded() > 0 {
            warn!(
                "{} points fell back to a plane estimate, {} had too few neighbours",
                report.plane, report.unestimated
            );
        }
        info!(
            "Smoothed {} points ({} polynomial fits)",
            cloud.len(),
            report.polynomial
        );
        Ok(SmoothedCloud { points, report })
    }

    fn smooth_point(&self, index: &SpatialIndex<'_>, i: usize) -> (NormalPoint, SurfaceFit) {
        let query = index.point(i);
        let neighbors: Vec<DVec3> = index
            .within_radius(query, self.params.search_radius)
            .into_iter()
            .map(|neighbor| index.point(neighbor.index))
            .collect();
        if neighbors.len() < MIN_PLANE_NEIGHBORS {
            return (NormalPoint::unestimated(query), SurfaceFit::Unestimated);
        }

        let frame = LocalFrame::fit(query, &neighbors);
        let fitted = if self.params.polynomial_order == 0 {
            None
        } else {
            PolynomialSurface::fit(
                &frame,
                &neighbors,
                self.params.polynomial_order,
                self.params.search_radius,
            )
            .ok()
        };
        let (position, normal, fit) = match fitted {
            Some(surface) => {
                let (position, normal) = surface.project(&frame);
                (position, normal, SurfaceFit::Polynomial)
            }
            None => (frame.origin, frame.normal, SurfaceFit::Plane),
        };

        let normal = if normal.dot(self.params.viewpoint - position) < 0.0 {
            -normal
        } else {
            normal
        };
        (NormalPoint::new(position, normal, frame.curvature), fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sheet(n: usize, step: f64, height: impl Fn(f64, f64) -> f64) -> PointCloud {
        let mut cloud = PointCloud::default();
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (i as f64 * step, j as f64 * step);
                cloud.push(DVec3::new(x, y, height(x, y)));
            }
        }
        cloud
    }

    #[test]
    fn test_default_params() {
        let params = SmoothParams::default();
        assert_eq!(params.polynomial_order, 2);
        assert_eq!(params.search_radius, 0.03);
        assert_eq!(coefficient_count(params.polynomial_order), 6);
    }

    #[test]
    fn test_preserves_count_with_unit_normals() {
        let cloud = sheet(12, 0.005, |x, y| 0.3 * (x * 40.0).sin() * 0.01 + y * 0.1);
        let result = SurfaceSmoother::default().smooth(&cloud).unwrap();

        assert_eq!(result.points.len(), cloud.len());
        for point in &result.points {
            assert_relative_eq!(point.normal.length(), 1.0, epsilon = 1e-9);
        }
        assert_eq!(
            result.report.polynomial + result.report.degraded(),
            cloud.len()
        );
    }

    #[test]
    fn test_flat_sheet_stays_flat() {
        let cloud = sheet(10, 0.005, |_, _| -1.0);
        let result = SurfaceSmoother::default().smooth(&cloud).unwrap();

        for (input, output) in cloud.iter().zip(&result.points) {
            assert_relative_eq!(output.position.z, -1.0, epsilon = 1e-9);
            assert_relative_eq!(output.position.x, input.x, epsilon = 1e-9);
            // viewpoint at the origin lies above the sheet
            assert_relative_eq!(output.normal.z, 1.0, epsilon = 1e-9);
            assert_relative_eq!(output.curvature, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_noisy_sheet_is_pulled_toward_plane() {
        let noise = |x: f64, y: f64| ((x * 7919.0 + y * 104729.0).sin()) * 0.0005;
        let cloud = sheet(14, 0.004, noise);
        let result = SurfaceSmoother::default().smooth(&cloud).unwrap();

        let spread = |zs: Vec<f64>| zs.iter().map(|z| z.abs()).sum::<f64>() / zs.len() as f64;
        let before = spread(cloud.iter().map(|p| p.z).collect());
        let after = spread(result.points.iter().map(|p| p.position.z).collect());
        assert!(after < before);
    }

    #[test]
    fn test_isolated_points_pass_through() {
        let cloud: PointCloud = vec![
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 5.0, 0.0),
        ]
        .into();
        let result = SurfaceSmoother::default().smooth(&cloud).unwrap();

        assert_eq!(result.report.unestimated, 3);
        for (input, output) in cloud.iter().zip(&result.points) {
            assert_eq!(output.position, *input);
            assert_eq!(output.normal, DVec3::Z);
            assert_eq!(output.curvature, 0.0);
        }
    }

    #[test]
    fn test_small_neighbourhood_falls_back_to_plane() {
        let cloud: PointCloud = vec![
            DVec3::new(0.0, 0.0, 2.0),
            DVec3::new(0.01, 0.0, 2.0),
            DVec3::new(0.0, 0.01, 2.0),
            DVec3::new(0.01, 0.01, 2.0),
        ]
        .into();
        let result = SurfaceSmoother::default().smooth(&cloud).unwrap();

        assert_eq!(result.report.plane, 4);
        for point in &result.points {
            assert_relative_eq!(point.position.z, 2.0, epsilon = 1e-9);
            assert_relative_eq!(point.normal.z, -1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_empty_cloud_fails() {
        let result = SurfaceSmoother::default().smooth(&PointCloud::default());
        assert!(matches!(result, Err(ProcessError::EmptyInput)));
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let cloud = sheet(3, 0.01, |_, _| 0.0);
        let smoother = SurfaceSmoother::new(SmoothParams::default().with_search_radius(0.0));
        assert!(matches!(
            smoother.smooth(&cloud),
            Err(ProcessError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_oversized_order_rejected() {
        let cloud = sheet(3, 0.01, |_, _| 0.0);
        for order in [MAX_POLYNOMIAL_ORDER + 1, usize::MAX / 2] {
            let params = SmoothParams::default().with_polynomial_order(order);
            let smoother = SurfaceSmoother::new(params);
            assert!(matches!(
                smoother.smooth(&cloud),
                Err(ProcessError::InvalidParameter(_))
            ));
        }
        let params = SmoothParams::default().with_polynomial_order(MAX_POLYNOMIAL_ORDER);
        assert!(params.validate().is_ok());
    }
}
