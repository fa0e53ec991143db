//! PCD file loading functions

use crate::error::{DataError, open};
use crate::pcd::header::{FieldSlot, PcdEncoding, PcdHeader};
use crate::types::{Point3D, PointCloud};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Upper bound on rows reserved up front; the header's count is untrusted.
const ASCII_PREALLOCATION_LIMIT: usize = 1 << 20;

/// Load the `x y z` positions of a PCD file.
///
/// Points with non-finite coordinates (holes in organized clouds) are
/// dropped; the remaining points keep their file order.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_pcd(path: &Path) -> Result<PointCloud, DataError> {
    debug!("Loading PCD points from: {}", path.display());
    let reader = BufReader::new(open(path)?);
    let cloud = read_pcd(reader).map_err(|e| {
        warn!("Failed to parse PCD file: {}", e);
        e.at_path(path)
    })?;
    info!("PCD file parsed: {} points", cloud.len());
    if let Some((min, max)) = cloud.bounds() {
        debug!("Cloud bounds: min {:?}, max {:?}", min, max);
    }
    Ok(cloud)
}

/// Read a PCD stream (header and payload) into a point cloud.
pub fn read_pcd<R: BufRead>(mut reader: R) -> Result<PointCloud, DataError> {
    let header = PcdHeader::read(&mut reader)?;
    let slots = header.xyz_slots()?;
    debug!(
        "PCD v{} header: {} fields, {} points, {} data",
        header.version,
        header.fields.len(),
        header.points,
        header.encoding.as_str()
    );

    let raw = match header.encoding {
        PcdEncoding::Ascii => read_ascii(reader, &header, &slots)?,
        PcdEncoding::Binary => read_binary(reader, &header, &slots)?,
        PcdEncoding::BinaryCompressed => {
            return Err(DataError::UnsupportedEncoding(
                PcdEncoding::BinaryCompressed.as_str().to_string(),
            ));
        }
    };

    let total = raw.len();
    let points: Vec<Point3D> = raw.into_iter().filter(|p| p.is_finite()).collect();
    if points.len() < total {
        warn!(
            "Skipped {} points with non-finite coordinates",
            total - points.len()
        );
    }

    Ok(PointCloud::new(points))
}

fn read_ascii<R: BufRead>(
    reader: R,
    header: &PcdHeader,
    slots: &[FieldSlot; 3],
) -> Result<Vec<Point3D>, DataError> {
    let expected_values = header.values_per_point();
    let mut points = Vec::with_capacity(header.points.min(ASCII_PREALLOCATION_LIMIT));

    for line in reader.lines() {
        if points.len() == header.points {
            break;
        }
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values: Vec<&str> = line.split_whitespace().collect();
        if values.len() < expected_values {
            return Err(DataError::Malformed(format!(
                "point {} has {} values, expected {}",
                points.len(),
                values.len(),
                expected_values
            )));
        }

        let mut coords = [0.0f64; 3];
        for (coord, slot) in coords.iter_mut().zip(slots) {
            let token = values[slot.token];
            *coord = token.parse().map_err(|_| {
                DataError::Malformed(format!(
                    "point {} has non-numeric coordinate '{}'",
                    points.len(),
                    token
                ))
            })?;
        }
        points.push(Point3D::from_array(coords));
    }

    if points.len() < header.points {
        return Err(DataError::Malformed(format!(
            "expected {} points, found {}",
            header.points,
            points.len()
        )));
    }
    Ok(points)
}

fn read_binary<R: Read>(
    mut reader: R,
    header: &PcdHeader,
    slots: &[FieldSlot; 3],
) -> Result<Vec<Point3D>, DataError> {
    let record_size = header.record_size();
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;

    let available = payload.len() / record_size;
    if available < header.points {
        return Err(DataError::Malformed(format!(
            "binary payload holds {} bytes, enough for {} of {} points of {} bytes",
            payload.len(),
            available,
            header.points,
            record_size
        )));
    }

    let points = payload
        .chunks_exact(record_size)
        .take(header.points)
        .map(|record| {
            let [x, y, z] = (*slots).map(|slot| read_scalar(record, slot));
            Point3D::new(x, y, z)
        })
        .collect();
    Ok(points)
}

/// Payloads are host-endian packed records, as PCL writes them.
fn read_scalar(record: &[u8], slot: FieldSlot) -> f64 {
    let bytes = &record[slot.byte..slot.byte + slot.size];
    if slot.size == 8 {
        bytemuck::pod_read_unaligned::<f64>(bytes)
    } else {
        bytemuck::pod_read_unaligned::<f32>(bytes) as f64
    }
}
