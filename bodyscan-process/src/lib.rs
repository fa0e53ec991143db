//! Bodyscan Processing Crate
//!
//! Post-processing stages for body scanner output. Each stage works on
//! immutable point sets and is available both in memory and as a
//! file-to-file run in [`pipeline`].
//!
//! ## Modules
//!
//! - [`spatial`]: k-nearest and radius neighbour queries
//! - [`outlier`]: statistical outlier removal
//! - [`rotation`]: rotation about the X axis
//! - [`merge`]: skeleton and cloud merging into a CSV stream
//! - [`smooth`]: moving least squares smoothing with normals
//! - [`pipeline`]: file-level runs of the stages above

pub mod error;
pub mod merge;
pub mod outlier;
pub mod pipeline;
pub mod progress;
pub mod rotation;
pub mod smooth;
pub mod spatial;

pub use error::{ProcessError, ProcessResult};
pub use merge::{MergeParams, MergedStream, SkeletonMeshMerger, SkeletonSource, SkeletonStatus};
pub use outlier::{OutlierFilter, OutlierParams, OutlierPartition};
pub use progress::Progress;
pub use rotation::{XRotation, rotate_about_x};
pub use smooth::{SmoothParams, SmoothReport, SmoothedCloud, SurfaceSmoother};
pub use spatial::{Neighbor, SpatialIndex};
