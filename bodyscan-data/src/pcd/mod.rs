//! PCD (Point Cloud Data) loading and saving

mod header;
mod loader;
mod writer;

pub use header::{PcdEncoding, PcdField, PcdHeader};
pub use loader::{load_pcd, read_pcd};
pub use writer::{PcdRecord, PointNormalRecord, XyzRecord, save_pcd, write_pcd};
