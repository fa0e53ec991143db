//! Line-oriented, comma-delimited text records.
//!
//! Numeric fields are parsed permissively, the way C's `strtod` does: the
//! longest numeric prefix is used and text without one reads as `0.0`.
//! Coordinates are written with six significant digits in `%g` style so the
//! merged files match what downstream tools already consume.

use crate::error::DataError;
use std::io::{self, BufRead, Write};

/// Significant digits used when writing coordinates.
pub const COORDINATE_PRECISION: usize = 6;

/// A text field together with its permissive numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    raw: String,
    value: f64,
    numeric: bool,
}

impl Field {
    pub fn parse(raw: &str) -> Self {
        let prefix = numeric_prefix(raw);
        Self {
            raw: raw.to_string(),
            value: prefix.unwrap_or(0.0),
            numeric: prefix.is_some(),
        }
    }

    /// A field produced from a computed value, formatted for output.
    pub fn from_value(value: f64) -> Self {
        Self {
            raw: format_coordinate(value),
            value,
            numeric: true,
        }
    }

    /// The source text, exactly as read.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Whether the text started with a number at all.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    /// Whether the whole text is a number, with no padding or trailing junk.
    pub fn is_clean_number(&self) -> bool {
        self.numeric && self.raw.parse::<f64>().is_ok()
    }
}

/// Parse the numeric prefix of `text`, yielding `0.0` when there is none.
pub fn parse_lenient(text: &str) -> f64 {
    numeric_prefix(text).unwrap_or(0.0)
}

fn numeric_prefix(text: &str) -> Option<f64> {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let rest = &s[end..];
    for word in ["infinity", "inf", "nan"] {
        if rest
            .get(..word.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(word))
        {
            return s[..end + word.len()].parse().ok();
        }
    }

    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let int_digits = digits(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = digits(exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse().ok()
}

/// Format a coordinate like a default C++ output stream (`%g`, precision 6).
pub fn format_coordinate(value: f64) -> String {
    // negative zero prints as 0
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:.*e}", COORDINATE_PRECISION - 1, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= COORDINATE_PRECISION as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (COORDINATE_PRECISION as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// One non-blank input line split into fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRecord {
    /// 1-based line number in the source.
    pub line: usize,
    pub fields: Vec<String>,
}

/// Read non-blank lines, splitting each into at most `max_fields` fields.
/// The last field keeps any remaining commas.
pub fn read_records<R: BufRead>(reader: R, max_fields: usize) -> Result<Vec<CsvRecord>, DataError> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        records.push(CsvRecord {
            line: i + 1,
            fields: line.splitn(max_fields, ',').map(str::to_string).collect(),
        });
    }
    Ok(records)
}

/// Writes comma-separated rows and counts them.
pub struct CsvWriter<W: Write> {
    inner: W,
    rows: usize,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, rows: 0 }
    }

    pub fn write_row<S: AsRef<str>>(&mut self, fields: &[S]) -> io::Result<()> {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.inner.write_all(b",")?;
            }
            self.inner.write_all(field.as_ref().as_bytes())?;
        }
        self.inner.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
