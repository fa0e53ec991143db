//! Merging a scanned cloud with a captured skeleton into one CSV stream.
//!
//! The output starts with an `X,Y,Z` header, followed by the 25 joints in
//! schema order and then every cloud point in input order. Joints and points
//! are rotated about X by the angle recorded in the skeleton stream. A
//! joint's `x` passes through as the exact text that was read.

use crate::progress::Progress;
use crate::rotation::XRotation;
use bodyscan_data::{CsvWriter, Field, ParsedSkeleton, PointCloud, Strictness};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use tracing::{debug, info, warn};

pub const MERGED_HEADER: [&str; 3] = ["X", "Y", "Z"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeParams {
    pub strictness: Strictness,
    /// Fail when the skeleton cannot be opened. When false the merge
    /// continues with the cloud alone, unrotated.
    pub skeleton_required: bool,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            strictness: Strictness::Lenient,
            skeleton_required: true,
        }
    }
}

/// The skeleton handed to a merge.
#[derive(Debug, Clone)]
pub enum SkeletonSource<'a> {
    Parsed(&'a ParsedSkeleton),
    /// No skeleton could be read; `reason` is logged and reported.
    Unavailable { reason: String },
}

/// How the skeleton contributed to a merged stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SkeletonStatus {
    Loaded { issues: usize, ignored_rows: usize },
    Unavailable { reason: String },
}

/// One output row. Joint `x` values keep their source text.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub x: Field,
    pub y: Field,
    pub z: Field,
}

impl MergedRow {
    fn from_values(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Field::from_value(x),
            y: Field::from_value(y),
            z: Field::from_value(z),
        }
    }

    pub fn fields(&self) -> [&str; 3] {
        [self.x.raw(), self.y.raw(), self.z.raw()]
    }
}

/// The merged stream, held in memory until it is written out.
#[derive(Debug, Clone)]
pub struct MergedStream {
    /// Data rows; the header is implicit.
    pub rows: Vec<MergedRow>,
    pub joint_rows: usize,
    pub angle_degrees: f64,
    pub skeleton: SkeletonStatus,
}

impl MergedStream {
    /// Rows including the header.
    pub fn row_count(&self) -> usize {
        1 + self.rows.len()
    }

    pub fn cloud_rows(&self) -> usize {
        self.rows.len() - self.joint_rows
    }

    pub fn joints(&self) -> &[MergedRow] {
        &self.rows[..self.joint_rows]
    }

    pub fn cloud(&self) -> &[MergedRow] {
        &self.rows[self.joint_rows..]
    }

    /// Write header and rows, returning the number of lines written.
    pub fn write_csv<W: Write>(&self, writer: W) -> io::Result<usize> {
        let mut csv = CsvWriter::new(writer);
        csv.write_row(&MERGED_HEADER)?;
        for row in &self.rows {
            csv.write_row(&row.fields())?;
        }
        csv.flush()?;
        Ok(csv.rows_written())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkeletonMeshMerger {
    params: MergeParams,
}

impl SkeletonMeshMerger {
    pub fn new(params: MergeParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MergeParams {
        &self.params
    }

    #[tracing::instrument(skip_all, fields(points = cloud.len()))]
    pub fn merge(
        &self,
        cloud: &PointCloud,
        skeleton: SkeletonSource<'_>,
        progress: &mut Progress<'_>,
    ) -> MergedStream {
        let (angle_degrees, status) = match &skeleton {
            SkeletonSource::Parsed(parsed) => (
                parsed.frame.angle_degrees,
                SkeletonStatus::Loaded {
                    issues: parsed.issues.len(),
                    ignored_rows: parsed.ignored_rows,
                },
            ),
            SkeletonSource::Unavailable { reason } => {
                warn!("Merging without skeleton: {}", reason);
                (0.0, SkeletonStatus::Unavailable { reason: reason.clone() })
            }
        };
        let rotation = XRotation::from_degrees(angle_degrees);
        debug!("Rotating by {} degrees about X", angle_degrees);

        let mut rows = Vec::with_capacity(cloud.len() + bodyscan_data::JOINT_COUNT);
        if let SkeletonSource::Parsed(parsed) = skeleton {
            for sample in &parsed.frame.joints {
                let (y, z) = rotation.rotate_yz(sample.position.y, sample.position.z);
                let x = if sample.x.is_clean_number() {
                    sample.x.clone()
                } else {
                    Field::from_value(sample.position.x)
                };
                rows.push(MergedRow {
                    x,
                    y: Field::from_value(y),
                    z: Field::from_value(z),
                });
            }
        }
        let joint_rows = rows.len();

        let total = cloud.len();
        for (i, point) in cloud.iter().enumerate() {
            let p = rotation.apply(*point);
            rows.push(MergedRow::from_values(p.x, p.y, p.z));
            progress.tick(i + 1, total);
        }

        info!(
            "Merged {} joints and {} cloud points",
            joint_rows,
            rows.len() - joint_rows
        );
        MergedStream {
            rows,
            joint_rows,
            angle_degrees,
            skeleton: status,
        }
    }
}
