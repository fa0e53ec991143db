//! Statistical outlier removal.
//!
//! For each point the mean distance to its `k` nearest other points is
//! computed. Over all points those means have a mean `μ` and population
//! standard deviation `σ`; a point is an inlier when its mean distance is at
//! most `μ + std_multiplier · σ`. The inliers and the outliers are returned
//! as two clouds that each preserve input order.

use crate::error::{ProcessError, ProcessResult};
use crate::progress::Progress;
use crate::spatial::SpatialIndex;
use bodyscan_data::PointCloud;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Parameters for statistical outlier removal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierParams {
    /// Number of neighbours averaged per point. Default: 50.
    pub k_neighbors: usize,

    /// Threshold multiplier on the standard deviation. Default: 1.0.
    pub std_multiplier: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            k_neighbors: 50,
            std_multiplier: 1.0,
        }
    }
}

impl OutlierParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    #[must_use]
    pub const fn with_std_multiplier(mut self, multiplier: f64) -> Self {
        self.std_multiplier = multiplier;
        self
    }

    pub fn validate(&self) -> ProcessResult<()> {
        if self.k_neighbors == 0 {
            return Err(ProcessError::InvalidParameter(
                "k_neighbors must be at least 1".to_string(),
            ));
        }
        if !self.std_multiplier.is_finite() {
            return Err(ProcessError::InvalidParameter(format!(
                "std_multiplier must be finite, got {}",
                self.std_multiplier
            )));
        }
        Ok(())
    }
}

/// Distribution of per-point mean neighbour distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceStats {
    /// Neighbours actually averaged, `min(k, n - 1)`.
    pub k_used: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub threshold: f64,
}

/// The two halves of a filtered cloud.
#[derive(Debug, Clone)]
pub struct OutlierPartition {
    pub inliers: PointCloud,
    pub outliers: PointCloud,
    /// `None` when the cloud was too small to have statistics.
    pub stats: Option<DistanceStats>,
}

impl OutlierPartition {
    pub fn total(&self) -> usize {
        self.inliers.len() + self.outliers.len()
    }

    pub fn outlier_percentage(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        100.0 * self.outliers.len() as f64 / self.total() as f64
    }
}

impl std::fmt::Display for OutlierPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "kept {} of {} points, removed {} ({:.1}%)",
            self.inliers.len(),
            self.total(),
            self.outliers.len(),
            self.outlier_percentage()
        )?;
        if let Some(stats) = &self.stats {
            write!(
                f,
                ", mean distance {:.6}, std dev {:.6}, threshold {:.6}",
                stats.mean, stats.std_dev, stats.threshold
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutlierFilter {
    params: OutlierParams,
}

impl OutlierFilter {
    pub fn new(params: OutlierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &OutlierParams {
        &self.params
    }

    pub fn filter(&self, cloud: &PointCloud) -> ProcessResult<OutlierPartition> {
        self.filter_with_progress(cloud, &mut Progress::none())
    }

    #[tracing::instrument(skip_all, fields(points = cloud.len(), k = self.params.k_neighbors))]
    pub fn filter_with_progress(
        &self,
        cloud: &PointCloud,
        progress: &mut Progress<'_>,
    ) -> ProcessResult<OutlierPartition> {
        self.params.validate()?;

        let n = cloud.len();
        if n <= 1 {
            debug!("Cloud has {} points, nothing to compare against", n);
            return Ok(OutlierPartition {
                inliers: cloud.clone(),
                outliers: PointCloud::default(),
                stats: None,
            });
        }

        let index = SpatialIndex::build(&cloud.points)?;
        let k_used = self.params.k_neighbors.min(n - 1);
        let distances = mean_neighbor_distances(&index, k_used, progress);

        let mean = distances.iter().sum::<f64>() / n as f64;
        let variance = distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
        let std_dev = variance.sqrt();
        let threshold = mean + self.params.std_multiplier * std_dev;

        let mut inliers = PointCloud::default();
        let mut outliers = PointCloud::default();
        for (point, distance) in cloud.iter().zip(&distances) {
            if *distance <= threshold {
                inliers.push(*point);
            } else {
                outliers.push(*point);
            }
        }

        let partition = OutlierPartition {
            inliers,
            outliers,
            stats: Some(DistanceStats {
                k_used,
                mean,
                std_dev,
                threshold,
            }),
        };
        info!("Outlier removal: {}", partition);
        Ok(partition)
    }
}

/// Mean distance from every indexed point to its `k` nearest other points,
/// in index order.
pub fn mean_neighbor_distances(
    index: &SpatialIndex<'_>,
    k: usize,
    progress: &mut Progress<'_>,
) -> Vec<f64> {
    let total = index.len();
    progress.map_indexed(total, |i| {
        if k == 0 {
            return 0.0;
        }
        let neighbors = index.k_nearest(index.point(i), k + 1);
        let sum: f64 = neighbors
            .iter()
            .filter(|neighbor| neighbor.index != i)
            .take(k)
            .map(|neighbor| neighbor.distance)
            .sum();
        sum / k as f64
    })
}
