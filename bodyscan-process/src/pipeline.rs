//! File-to-file runs of each processing stage.
//!
//! Each stage reads its inputs completely, computes its result in memory,
//! and only then writes outputs, so a failed run leaves no partial files.

use crate::error::{ProcessError, ProcessResult};
use crate::merge::{MergeParams, MergedStream, SkeletonMeshMerger, SkeletonSource};
use crate::outlier::{OutlierFilter, OutlierParams, OutlierPartition};
use crate::progress::Progress;
use crate::smooth::{SmoothParams, SmoothedCloud, SurfaceSmoother};
use bodyscan_data::{DataError, PcdEncoding, PointCloud, load_pcd, load_skeleton, save_pcd};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default location of the rejected points of an outlier run.
pub const DEFAULT_OUTLIER_PATH: &str = "outliers.pcd";

fn read_cloud(path: &Path) -> ProcessResult<PointCloud> {
    load_pcd(path).map_err(|source| ProcessError::SourceRead {
        path: path.to_path_buf(),
        source,
    })
}

fn write_error(path: &Path, source: DataError) -> ProcessError {
    ProcessError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Where the two halves of an outlier run are written.
#[derive(Debug, Clone)]
pub struct FilterOutputs {
    pub inliers: PathBuf,
    pub outliers: PathBuf,
    pub encoding: PcdEncoding,
}

impl FilterOutputs {
    pub fn new(inliers: impl Into<PathBuf>) -> Self {
        Self {
            inliers: inliers.into(),
            outliers: PathBuf::from(DEFAULT_OUTLIER_PATH),
            encoding: PcdEncoding::Ascii,
        }
    }
}

/// Remove statistical outliers from the cloud at `input`.
#[tracing::instrument(skip_all, fields(input = %input.display()))]
pub fn run_filter(
    input: &Path,
    outputs: &FilterOutputs,
    params: &OutlierParams,
    progress: &mut Progress<'_>,
) -> ProcessResult<OutlierPartition> {
    params.validate()?;
    let cloud = read_cloud(input)?;
    if cloud.is_empty() {
        return Err(ProcessError::EmptyInput);
    }

    let partition = OutlierFilter::new(*params).filter_with_progress(&cloud, progress)?;

    save_pcd(&outputs.inliers, &partition.inliers.points, outputs.encoding)
        .map_err(|e| write_error(&outputs.inliers, e))?;
    if let Err(e) = save_pcd(&outputs.outliers, &partition.outliers.points, outputs.encoding) {
        warn!("Removing {} after failed outlier write", outputs.inliers.display());
        let _ = std::fs::remove_file(&outputs.inliers);
        return Err(write_error(&outputs.outliers, e));
    }
    Ok(partition)
}

/// Resolve the skeleton for a merge, applying the availability policy.
fn read_skeleton_for_merge(
    path: &Path,
    params: &MergeParams,
) -> ProcessResult<Result<bodyscan_data::ParsedSkeleton, String>> {
    match load_skeleton(path, params.strictness) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(DataError::Schema(issue)) => Err(ProcessError::Format(issue)),
        Err(source) if params.skeleton_required => Err(ProcessError::SkeletonUnavailable {
            path: path.to_path_buf(),
            source,
        }),
        Err(source) => Ok(Err(source.to_string())),
    }
}

/// Merge the cloud at `cloud_path` with the skeleton at `skeleton_path` and
/// write the combined CSV to `output`.
#[tracing::instrument(skip_all, fields(
    cloud = %cloud_path.display(),
    skeleton = %skeleton_path.display(),
))]
pub fn run_merge(
    cloud_path: &Path,
    skeleton_path: &Path,
    output: &Path,
    params: &MergeParams,
    progress: &mut Progress<'_>,
) -> ProcessResult<MergedStream> {
    let cloud = read_cloud(cloud_path)?;
    let skeleton = read_skeleton_for_merge(skeleton_path, params)?;
    let source = match &skeleton {
        Ok(parsed) => SkeletonSource::Parsed(parsed),
        Err(reason) => SkeletonSource::Unavailable {
            reason: reason.clone(),
        },
    };

    let stream = SkeletonMeshMerger::new(*params).merge(&cloud, source, progress);
    save_merged(output, &stream)?;
    Ok(stream)
}

fn save_merged(path: &Path, stream: &MergedStream) -> ProcessResult<()> {
    let result = File::create(path).and_then(|file| stream.write_csv(BufWriter::new(file)));
    match result {
        Ok(rows) => {
            info!("Wrote {} rows to {}", rows, path.display());
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(path);
            Err(write_error(path, DataError::from(e)))
        }
    }
}

/// Smooth the cloud at `input` and write points with normals to `output`.
#[tracing::instrument(skip_all, fields(input = %input.display()))]
pub fn run_smooth(
    input: &Path,
    output: &Path,
    params: &SmoothParams,
    encoding: PcdEncoding,
    progress: &mut Progress<'_>,
) -> ProcessResult<SmoothedCloud> {
    params.validate()?;
    let cloud = read_cloud(input)?;
    let smoothed = SurfaceSmoother::new(*params).smooth_with_progress(&cloud, progress)?;
    save_pcd(output, &smoothed.points, encoding).map_err(|e| write_error(output, e))?;
    Ok(smoothed)
}
