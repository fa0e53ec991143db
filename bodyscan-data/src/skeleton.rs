//! Skeleton joint records exported by the body tracker.
//!
//! A skeleton file is a CSV stream of `label,x,y,z` rows laid out by a fixed
//! schema: one header row, one row whose `x` field carries the frame's
//! rotation angle in degrees, then one row per joint in [`Joint`] order.
//! [`SkeletonSchema`] names each row slot so the layout is validated in one
//! place instead of by row counters.

use crate::csv::{CsvRecord, Field, read_records};
use crate::error::{DataError, open};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Number of joints in a skeleton frame.
pub const JOINT_COUNT: usize = 25;

/// Fields per skeleton row: label, x, y, z.
pub const FIELDS_PER_ROW: usize = 4;

/// Tracked body joints, in the order their rows appear in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    SpineBase,
    SpineMid,
    Neck,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
    SpineShoulder,
    HandTipLeft,
    ThumbLeft,
    HandTipRight,
    ThumbRight,
}

impl Joint {
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::SpineBase,
        Joint::SpineMid,
        Joint::Neck,
        Joint::Head,
        Joint::ShoulderLeft,
        Joint::ElbowLeft,
        Joint::WristLeft,
        Joint::HandLeft,
        Joint::ShoulderRight,
        Joint::ElbowRight,
        Joint::WristRight,
        Joint::HandRight,
        Joint::HipLeft,
        Joint::KneeLeft,
        Joint::AnkleLeft,
        Joint::FootLeft,
        Joint::HipRight,
        Joint::KneeRight,
        Joint::AnkleRight,
        Joint::FootRight,
        Joint::SpineShoulder,
        Joint::HandTipLeft,
        Joint::ThumbLeft,
        Joint::HandTipRight,
        Joint::ThumbRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Tracker name of the joint, e.g. `SPINEBASE`.
    pub fn name(self) -> &'static str {
        match self {
            Joint::SpineBase => "SPINEBASE",
            Joint::SpineMid => "SPINEMID",
            Joint::Neck => "NECK",
            Joint::Head => "HEAD",
            Joint::ShoulderLeft => "SHOULDERLEFT",
            Joint::ElbowLeft => "ELBOWLEFT",
            Joint::WristLeft => "WRISTLEFT",
            Joint::HandLeft => "HANDLEFT",
            Joint::ShoulderRight => "SHOULDERRIGHT",
            Joint::ElbowRight => "ELBOWRIGHT",
            Joint::WristRight => "WRISTRIGHT",
            Joint::HandRight => "HANDRIGHT",
            Joint::HipLeft => "HIPLEFT",
            Joint::KneeLeft => "KNEELEFT",
            Joint::AnkleLeft => "ANKLELEFT",
            Joint::FootLeft => "FOOTLEFT",
            Joint::HipRight => "HIPRIGHT",
            Joint::KneeRight => "KNEERIGHT",
            Joint::AnkleRight => "ANKLERIGHT",
            Joint::FootRight => "FOOTRIGHT",
            Joint::SpineShoulder => "SPINESHOULDER",
            Joint::HandTipLeft => "HANDTIPLEFT",
            Joint::ThumbLeft => "THUMBLEFT",
            Joint::HandTipRight => "HANDTIPRIGHT",
            Joint::ThumbRight => "THUMBRIGHT",
        }
    }
}

/// Meaning of one row position in the skeleton stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Header,
    Angle,
    Joint(Joint),
}

/// Ordered row layout of a skeleton stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonSchema {
    slots: Vec<Slot>,
}

impl Default for SkeletonSchema {
    fn default() -> Self {
        let slots = [Slot::Header, Slot::Angle]
            .into_iter()
            .chain(Joint::ALL.into_iter().map(Slot::Joint))
            .collect();
        Self { slots }
    }
}

impl SkeletonSchema {
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of rows with a defined meaning.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Walk `records` against the schema.
    ///
    /// In [`Strictness::Lenient`] mode every deviation is collected as a
    /// [`FormatIssue`] and the frame is still produced: unparsable numbers
    /// read as `0.0`, a missing angle as `0`, and missing joints as the
    /// origin. In [`Strictness::Strict`] mode the first deviation is
    /// returned as the error.
    pub fn parse(
        &self,
        records: &[CsvRecord],
        strictness: Strictness,
    ) -> Result<ParsedSkeleton, FormatIssue> {
        let mut issues = Vec::new();
        let mut report = |issue: FormatIssue| -> Result<(), FormatIssue> {
            match strictness {
                Strictness::Strict => Err(issue),
                Strictness::Lenient => {
                    warn!("Skeleton format issue: {}", issue);
                    issues.push(issue);
                    Ok(())
                }
            }
        };

        let mut angle_degrees = None;
        let mut joints = Vec::with_capacity(JOINT_COUNT);

        for (slot, record) in self.slots.iter().zip(records) {
            let row = SkeletonRow::from_record(record);
            match slot {
                Slot::Header => {}
                Slot::Angle => {
                    if row.field_count < 2 {
                        report(FormatIssue::MissingFields {
                            line: row.line,
                            found: row.field_count,
                        })?;
                    } else if !row.x.is_numeric() {
                        report(FormatIssue::NotNumeric {
                            line: row.line,
                            field: "angle",
                            raw: row.x.raw().to_string(),
                        })?;
                    }
                    angle_degrees = Some(row.x.value());
                }
                Slot::Joint(joint) => {
                    if row.label != joint.name() {
                        debug!(
                            "Line {}: label '{}' read as {}",
                            row.line,
                            row.label,
                            joint.name()
                        );
                    }
                    if row.field_count < FIELDS_PER_ROW {
                        report(FormatIssue::MissingFields {
                            line: row.line,
                            found: row.field_count,
                        })?;
                    } else {
                        for (name, field) in [("x", &row.x), ("y", &row.y), ("z", &row.z)] {
                            if !field.is_numeric() {
                                report(FormatIssue::NotNumeric {
                                    line: row.line,
                                    field: name,
                                    raw: field.raw().to_string(),
                                })?;
                            }
                        }
                    }
                    joints.push(JointSample {
                        joint: *joint,
                        position: DVec3::new(row.x.value(), row.y.value(), row.z.value()),
                        x: row.x,
                    });
                }
            }
        }

        let angle_degrees = match angle_degrees {
            Some(angle) => angle,
            None => {
                report(FormatIssue::MissingAngle)?;
                0.0
            }
        };

        if joints.len() < JOINT_COUNT {
            report(FormatIssue::MissingJoints {
                expected: JOINT_COUNT,
                found: joints.len(),
            })?;
            for joint in &Joint::ALL[joints.len()..] {
                joints.push(JointSample::missing(*joint));
            }
        }

        let ignored_rows = records.len().saturating_sub(self.slots.len());
        if ignored_rows > 0 {
            debug!("Ignoring {} skeleton rows past the schema", ignored_rows);
        }

        Ok(ParsedSkeleton {
            frame: SkeletonFrame {
                angle_degrees,
                joints,
            },
            issues,
            ignored_rows,
        })
    }
}

/// How skeleton format deviations are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Warn and substitute zeros.
    #[default]
    Lenient,
    /// Fail on the first deviation.
    Strict,
}

/// A deviation of the skeleton stream from its schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatIssue {
    #[error("line {line}: expected 4 fields, found {found}")]
    MissingFields { line: usize, found: usize },

    #[error("line {line}: {field} is not a number: {raw:?}")]
    NotNumeric {
        line: usize,
        field: &'static str,
        raw: String,
    },

    #[error("rotation angle row is missing")]
    MissingAngle,

    #[error("expected {expected} joint rows, found {found}")]
    MissingJoints { expected: usize, found: usize },
}

struct SkeletonRow {
    line: usize,
    field_count: usize,
    label: String,
    x: Field,
    y: Field,
    z: Field,
}

impl SkeletonRow {
    fn from_record(record: &CsvRecord) -> Self {
        let text = |i: usize| record.fields.get(i).map(String::as_str).unwrap_or("");
        Self {
            line: record.line,
            field_count: record.fields.len(),
            label: text(0).to_string(),
            x: Field::parse(text(1)),
            y: Field::parse(text(2)),
            z: Field::parse(text(3)),
        }
    }
}

/// One joint as read from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSample {
    pub joint: Joint,
    /// The `x` field, kept verbatim since it passes through unrotated.
    pub x: Field,
    pub position: DVec3,
}

impl JointSample {
    fn missing(joint: Joint) -> Self {
        Self {
            joint,
            x: Field::from_value(0.0),
            position: DVec3::ZERO,
        }
    }
}

/// The 25 joints of one captured frame plus its rotation angle.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonFrame {
    pub angle_degrees: f64,
    pub joints: Vec<JointSample>,
}

/// A parsed frame together with the deviations tolerated while parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSkeleton {
    pub frame: SkeletonFrame,
    pub issues: Vec<FormatIssue>,
    /// Rows beyond the schema, which carry no meaning.
    pub ignored_rows: usize,
}

/// Read a skeleton stream from any buffered reader.
pub fn read_skeleton<R: BufRead>(
    reader: R,
    strictness: Strictness,
) -> Result<ParsedSkeleton, DataError> {
    let records = read_records(reader, FIELDS_PER_ROW)?;
    Ok(SkeletonSchema::default().parse(&records, strictness)?)
}

/// Load a skeleton CSV file.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_skeleton(path: &Path, strictness: Strictness) -> Result<ParsedSkeleton, DataError> {
    debug!("Loading skeleton from: {}", path.display());
    let reader = BufReader::new(open(path)?);
    read_skeleton(reader, strictness).map_err(|e| e.at_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn skeleton_text(angle: &str, joint_rows: usize) -> String {
        let mut text = String::from("Joint,X,Y,Z\n");
        text.push_str(&format!("Degree,{},0,0\n", angle));
        for joint in Joint::ALL.iter().take(joint_rows) {
            text.push_str(&format!("{},{}.5,1,2\n", joint.name(), joint.index()));
        }
        text
    }

    #[test]
    fn test_schema_layout() {
        let schema = SkeletonSchema::default();
        assert_eq!(schema.len(), 27);
        assert_eq!(schema.slots()[0], Slot::Header);
        assert_eq!(schema.slots()[1], Slot::Angle);
        assert_eq!(schema.slots()[2], Slot::Joint(Joint::SpineBase));
        assert_eq!(schema.slots()[26], Slot::Joint(Joint::ThumbRight));
    }

    #[test]
    fn test_joint_indices_match_order() {
        for (i, joint) in Joint::ALL.iter().enumerate() {
            assert_eq!(joint.index(), i);
        }
        assert_eq!(Joint::ThumbRight.index(), 24);
    }

    #[test]
    fn test_parse_complete_stream() {
        let parsed =
            read_skeleton(Cursor::new(skeleton_text("45", 25)), Strictness::Strict).unwrap();
        assert_eq!(parsed.frame.angle_degrees, 45.0);
        assert_eq!(parsed.frame.joints.len(), JOINT_COUNT);
        assert!(parsed.issues.is_empty());

        let head = &parsed.frame.joints[Joint::Head.index()];
        assert_eq!(head.joint, Joint::Head);
        assert_eq!(head.x.raw(), "3.5");
        assert_eq!(head.position, DVec3::new(3.5, 1.0, 2.0));
    }

    #[test]
    fn test_extra_rows_ignored() {
        let mut text = skeleton_text("0", 25);
        text.push_str("EXTRA,9,9,9\nEXTRA,9,9,9\n");
        let parsed = read_skeleton(Cursor::new(text), Strictness::Strict).unwrap();
        assert_eq!(parsed.ignored_rows, 2);
        assert_eq!(parsed.frame.joints.len(), JOINT_COUNT);
    }

    #[test]
    fn test_lenient_malformed_angle_reads_zero() {
        let parsed =
            read_skeleton(Cursor::new(skeleton_text("abc", 25)), Strictness::Lenient).unwrap();
        assert_eq!(parsed.frame.angle_degrees, 0.0);
        assert_eq!(parsed.issues.len(), 1);
        assert!(matches!(parsed.issues[0], FormatIssue::NotNumeric { field: "angle", .. }));
    }

    #[test]
    fn test_strict_malformed_angle_fails() {
        let result = read_skeleton(Cursor::new(skeleton_text("abc", 25)), Strictness::Strict);
        assert!(matches!(
            result,
            Err(DataError::Schema(FormatIssue::NotNumeric { line: 2, .. }))
        ));
    }

    #[test]
    fn test_lenient_missing_joints_padded() {
        let parsed =
            read_skeleton(Cursor::new(skeleton_text("10", 20)), Strictness::Lenient).unwrap();
        assert_eq!(parsed.frame.joints.len(), JOINT_COUNT);
        assert_eq!(
            parsed.issues,
            vec![FormatIssue::MissingJoints {
                expected: JOINT_COUNT,
                found: 20
            }]
        );
        let last = &parsed.frame.joints[24];
        assert_eq!(last.joint, Joint::ThumbRight);
        assert_eq!(last.position, DVec3::ZERO);
        assert_eq!(last.x.raw(), "0");
    }

    #[test]
    fn test_lenient_short_row() {
        let text = skeleton_text("0", 25).replacen("NECK,2.5,1,2", "NECK", 1);
        let parsed = read_skeleton(Cursor::new(text), Strictness::Lenient).unwrap();
        assert_eq!(
            parsed.issues,
            vec![FormatIssue::MissingFields { line: 5, found: 1 }]
        );
        assert_eq!(parsed.frame.joints[Joint::Neck.index()].position, DVec3::ZERO);
    }

    #[test]
    fn test_empty_stream_lenient() {
        let parsed = read_skeleton(Cursor::new(""), Strictness::Lenient).unwrap();
        assert_eq!(parsed.frame.joints.len(), JOINT_COUNT);
        assert_eq!(parsed.issues.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_skeleton(Path::new("/nonexistent/skeleton.csv"), Strictness::Lenient);
        assert!(matches!(result, Err(DataError::NotFound { .. })));
    }
}
