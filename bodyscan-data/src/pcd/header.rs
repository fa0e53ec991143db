//! PCD header parsing

use crate::error::DataError;
use std::io::BufRead;

/// Payload encoding named by the `DATA` header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdEncoding {
    Ascii,
    Binary,
    BinaryCompressed,
}

impl PcdEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            PcdEncoding::Ascii => "ascii",
            PcdEncoding::Binary => "binary",
            PcdEncoding::BinaryCompressed => "binary_compressed",
        }
    }

    fn parse(token: &str) -> Result<Self, DataError> {
        match token {
            "ascii" => Ok(PcdEncoding::Ascii),
            "binary" => Ok(PcdEncoding::Binary),
            "binary_compressed" => Ok(PcdEncoding::BinaryCompressed),
            other => Err(DataError::Malformed(format!("unknown DATA type '{}'", other))),
        }
    }
}

/// One declared field, e.g. `x` with `SIZE 4`, `TYPE F`, `COUNT 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcdField {
    pub name: String,
    pub size: usize,
    pub kind: char,
    pub count: usize,
}

/// Where a scalar field lives inside an ASCII row and a binary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldSlot {
    pub token: usize,
    pub byte: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PcdHeader {
    pub version: String,
    pub fields: Vec<PcdField>,
    pub width: usize,
    pub height: usize,
    pub points: usize,
    pub encoding: PcdEncoding,
}

impl PcdHeader {
    /// Parse header lines up to and including `DATA`, leaving the reader
    /// positioned at the first payload byte.
    pub fn read<R: BufRead>(reader: &mut R) -> Result<Self, DataError> {
        let mut version = String::from("0.7");
        let mut names: Vec<String> = Vec::new();
        let mut sizes: Vec<usize> = Vec::new();
        let mut kinds: Vec<char> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();
        let mut width = 0;
        let mut height = 1;
        let mut points = None;

        let mut line = String::new();
        let encoding = loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(DataError::Malformed(
                    "unexpected end of file in PCD header".to_string(),
                ));
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let key = parts.next().unwrap_or_default();
            let values: Vec<&str> = parts.collect();

            match key {
                "VERSION" => {
                    if let Some(v) = values.first() {
                        version = v.to_string();
                    }
                }
                "FIELDS" => names = values.iter().map(|s| s.to_string()).collect(),
                "SIZE" => sizes = parse_list(key, &values)?,
                "TYPE" => kinds = values.iter().filter_map(|s| s.chars().next()).collect(),
                "COUNT" => counts = parse_list(key, &values)?,
                "WIDTH" => width = parse_single(key, &values)?,
                "HEIGHT" => height = parse_single(key, &values)?,
                "POINTS" => points = Some(parse_single(key, &values)?),
                "VIEWPOINT" => {}
                "DATA" => {
                    let token = values.first().copied().unwrap_or("ascii");
                    break PcdEncoding::parse(token)?;
                }
                other => {
                    return Err(DataError::Malformed(format!(
                        "unknown PCD header key '{}'",
                        other
                    )));
                }
            }
        };

        if names.is_empty() {
            return Err(DataError::Malformed("PCD header has no FIELDS".to_string()));
        }

        let fields: Vec<PcdField> = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| PcdField {
                name,
                size: sizes.get(i).copied().unwrap_or(4),
                kind: kinds.get(i).copied().unwrap_or('F'),
                count: counts.get(i).copied().unwrap_or(1),
            })
            .collect();
        checked_record_size(&fields)?;

        let points = match points {
            Some(points) => points,
            None => width.checked_mul(height).ok_or_else(|| {
                DataError::Malformed(format!(
                    "WIDTH {} x HEIGHT {} overflows the point count",
                    width, height
                ))
            })?,
        };

        Ok(Self {
            version,
            fields,
            width,
            height,
            points,
            encoding,
        })
    }

    /// Number of whitespace-separated values in one ASCII row.
    pub fn values_per_point(&self) -> usize {
        self.fields
            .iter()
            .fold(0usize, |total, f| total.saturating_add(f.count))
    }

    /// Size in bytes of one packed binary record.
    pub fn record_size(&self) -> usize {
        self.fields.iter().fold(0usize, |total, f| {
            total.saturating_add(f.size.saturating_mul(f.count))
        })
    }

    /// Locate the `x`, `y`, `z` fields, which must be 4- or 8-byte floats.
    pub(crate) fn xyz_slots(&self) -> Result<[FieldSlot; 3], DataError> {
        let mut slots = [None; 3];
        let mut token = 0;
        let mut byte = 0;
        for field in &self.fields {
            let axis = match field.name.as_str() {
                "x" => Some(0),
                "y" => Some(1),
                "z" => Some(2),
                _ => None,
            };
            if let Some(axis) = axis {
                if field.kind != 'F' || !(field.size == 4 || field.size == 8) || field.count == 0 {
                    return Err(DataError::Malformed(format!(
                        "field '{}' must be a 4 or 8 byte float, found TYPE {} SIZE {} COUNT {}",
                        field.name, field.kind, field.size, field.count
                    )));
                }
                slots[axis] = Some(FieldSlot {
                    token,
                    byte,
                    size: field.size,
                });
            }
            token = token.saturating_add(field.count);
            byte = byte.saturating_add(field.size.saturating_mul(field.count));
        }

        match slots {
            [Some(x), Some(y), Some(z)] => Ok([x, y, z]),
            _ => Err(DataError::Malformed(
                "PCD header must declare x, y and z fields".to_string(),
            )),
        }
    }
}

fn checked_record_size(fields: &[PcdField]) -> Result<usize, DataError> {
    fields
        .iter()
        .try_fold(0usize, |total, f| {
            f.size
                .checked_mul(f.count)
                .and_then(|bytes| total.checked_add(bytes))
        })
        .ok_or_else(|| DataError::Malformed("PCD record size overflows".to_string()))
}

fn parse_single(key: &str, values: &[&str]) -> Result<usize, DataError> {
    values
        .first()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| DataError::Malformed(format!("invalid {} value", key)))
}

fn parse_list(key: &str, values: &[&str]) -> Result<Vec<usize>, DataError> {
    values
        .iter()
        .map(|v| {
            v.parse()
                .map_err(|_| DataError::Malformed(format!("invalid {} entry '{}'", key, v)))
        })
        .collect()
}
