//! PCD file writing functions

use crate::error::DataError;
use crate::pcd::header::PcdEncoding;
use crate::types::{NormalPoint, Point3D};
use bytemuck::{Pod, Zeroable};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Packed `x y z` record, matching PCL's `PointXYZ` field set.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct XyzRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Packed record matching PCL's `PointNormal` field set.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointNormalRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub normal_x: f32,
    pub normal_y: f32,
    pub normal_z: f32,
    pub curvature: f32,
}

/// A point type that can be stored as a PCD record of `F 4` fields.
pub trait PcdRecord {
    type Raw: Pod;

    /// Field names in record order; one `f32` per name.
    const FIELDS: &'static [&'static str];

    fn to_raw(&self) -> Self::Raw;
}

impl PcdRecord for Point3D {
    type Raw = XyzRecord;
    const FIELDS: &'static [&'static str] = &["x", "y", "z"];

    fn to_raw(&self) -> XyzRecord {
        XyzRecord {
            x: self.x as f32,
            y: self.y as f32,
            z: self.z as f32,
        }
    }
}

impl PcdRecord for NormalPoint {
    type Raw = PointNormalRecord;
    const FIELDS: &'static [&'static str] = &[
        "x",
        "y",
        "z",
        "normal_x",
        "normal_y",
        "normal_z",
        "curvature",
    ];

    fn to_raw(&self) -> PointNormalRecord {
        PointNormalRecord {
            x: self.position.x as f32,
            y: self.position.y as f32,
            z: self.position.z as f32,
            normal_x: self.normal.x as f32,
            normal_y: self.normal.y as f32,
            normal_z: self.normal.z as f32,
            curvature: self.curvature as f32,
        }
    }
}

/// Write points as a PCD stream with the given payload encoding.
pub fn write_pcd<W: Write, P: PcdRecord>(
    writer: &mut W,
    points: &[P],
    encoding: PcdEncoding,
) -> Result<(), DataError> {
    if encoding == PcdEncoding::BinaryCompressed {
        return Err(DataError::UnsupportedEncoding(encoding.as_str().to_string()));
    }

    let n = points.len();
    let columns = P::FIELDS.len();
    writeln!(writer, "# .PCD v0.7 - Point Cloud Data file format")?;
    writeln!(writer, "VERSION 0.7")?;
    writeln!(writer, "FIELDS {}", P::FIELDS.join(" "))?;
    writeln!(writer, "SIZE {}", vec!["4"; columns].join(" "))?;
    writeln!(writer, "TYPE {}", vec!["F"; columns].join(" "))?;
    writeln!(writer, "COUNT {}", vec!["1"; columns].join(" "))?;
    writeln!(writer, "WIDTH {}", n)?;
    writeln!(writer, "HEIGHT 1")?;
    writeln!(writer, "VIEWPOINT 0 0 0 1 0 0 0")?;
    writeln!(writer, "POINTS {}", n)?;
    writeln!(writer, "DATA {}", encoding.as_str())?;

    let records: Vec<P::Raw> = points.iter().map(PcdRecord::to_raw).collect();
    match encoding {
        PcdEncoding::Binary => writer.write_all(bytemuck::cast_slice(&records))?,
        _ => {
            let values: &[f32] = bytemuck::cast_slice(&records);
            for row in values.chunks_exact(columns) {
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                writeln!(writer, "{}", line.join(" "))?;
            }
        }
    }
    Ok(())
}

/// Save points to a PCD file.
///
/// A file left behind by a failed write is removed so that no partial
/// output survives.
#[tracing::instrument(skip_all, fields(path = %path.display(), points = points.len()))]
pub fn save_pcd<P: PcdRecord>(
    path: &Path,
    points: &[P],
    encoding: PcdEncoding,
) -> Result<(), DataError> {
    debug!("Writing {} PCD to: {}", encoding.as_str(), path.display());
    let result = File::create(path).map_err(DataError::from).and_then(|file| {
        let mut writer = BufWriter::new(file);
        write_pcd(&mut writer, points, encoding)?;
        writer.flush()?;
        Ok(())
    });

    if let Err(e) = &result {
        warn!("Failed to write PCD file: {}", e);
        let _ = std::fs::remove_file(path);
    } else {
        info!("Saved {} points to {}", points.len(), path.display());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcd::read_pcd;
    use glam::DVec3;
    use std::io::Cursor;

    #[test]
    fn test_write_ascii_header_and_rows() {
        let points = vec![DVec3::new(0.0, 1.0, 2.0), DVec3::new(-0.5, 0.25, 3.0)];
        let mut out = Vec::new();
        write_pcd(&mut out, &points, PcdEncoding::Ascii).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\n"));
        assert!(text.contains("WIDTH 2\nHEIGHT 1\n"));
        assert!(text.ends_with("DATA ascii\n0 1 2\n-0.5 0.25 3\n"));
    }

    #[test]
    fn test_write_normals_binary_reads_back_positions() {
        let points = vec![
            NormalPoint::new(DVec3::new(1.0, 2.0, 3.0), DVec3::Z, 0.0),
            NormalPoint::new(DVec3::new(4.0, 5.0, 6.0), DVec3::X, 0.5),
        ];
        let mut out = Vec::new();
        write_pcd(&mut out, &points, PcdEncoding::Binary).unwrap();

        let cloud = read_pcd(Cursor::new(out)).unwrap();
        assert_eq!(
            cloud.points,
            vec![DVec3::new(1.0, 2.0, 3.0), DVec3::new(4.0, 5.0, 6.0)]
        );
    }

    #[test]
    fn test_write_compressed_rejected() {
        let mut out = Vec::new();
        let result = write_pcd(&mut out, &[DVec3::ZERO], PcdEncoding::BinaryCompressed);
        assert!(matches!(result, Err(DataError::UnsupportedEncoding(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_save_pcd_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.pcd");
        save_pcd(&path, &[DVec3::ONE], PcdEncoding::Ascii).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("POINTS 1\nDATA ascii\n1 1 1\n"));
    }
}
