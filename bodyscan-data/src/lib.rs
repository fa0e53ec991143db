//! Bodyscan Data Crate
//!
//! Data loading and storage for body scanner output: point clouds in PCD
//! files, skeleton joint records in CSV files, and the point types shared by
//! the processing crate. This crate does no geometry beyond what parsing needs.

pub mod csv;
pub mod error;
pub mod pcd;
pub mod skeleton;
pub mod types;

pub use csv::{CsvWriter, Field, format_coordinate, parse_lenient};
pub use error::DataError;
pub use pcd::{PcdEncoding, load_pcd, save_pcd};
pub use skeleton::{
    FormatIssue, Joint, JOINT_COUNT, ParsedSkeleton, SkeletonFrame, SkeletonSchema, Strictness,
    load_skeleton,
};
pub use types::{NormalPoint, Point3D, PointCloud};
