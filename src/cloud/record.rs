//! # Point Records and Capture Parsing
//!
//! A capture is a tabular file produced by a completed scan, one row per
//! sample with columns `X`, `Y`, `Z`, `SIGNAL_STRENGTH`. Raw coordinate
//! precision is preserved here; rounding happens only at encode time.

use serde::Deserialize;

use crate::error::Result;

/// One sample from a scan capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    /// X coordinate in capture units
    pub x: f64,

    /// Y coordinate in capture units
    pub y: f64,

    /// Z coordinate in capture units
    pub z: f64,

    /// Return signal strength (0-255)
    pub signal_strength: u8,
}

/// An ordered sequence of point records plus the name of the file it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// Source file name
    pub source: String,

    /// Point records in capture order
    pub records: Vec<PointRecord>,
}

impl Capture {
    /// Create a capture from already-parsed records
    pub fn new(source: impl Into<String>, records: Vec<PointRecord>) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }

    /// Number of point records in the capture
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the capture holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// On-disk row shape of a capture file
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "X")]
    x: f64,

    #[serde(rename = "Y")]
    y: f64,

    #[serde(rename = "Z")]
    z: f64,

    #[serde(rename = "SIGNAL_STRENGTH")]
    signal_strength: u8,
}

/// Parse raw capture bytes into an ordered sequence of point records.
///
/// A capture with a valid header and zero data rows parses successfully into
/// an empty [`Capture`]; callers must treat that as "nothing to encode", not
/// as a parse failure.
///
/// # Errors
///
/// Returns error if the data cannot be decoded into rows carrying the four
/// required named fields.
pub fn parse_capture(source: &str, data: &[u8]) -> Result<Capture> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut records = Vec::new();
    for row in reader.deserialize() {
        let raw: RawRecord = row?;
        records.push(PointRecord {
            x: raw.x,
            y: raw.y,
            z: raw.z,
            signal_strength: raw.signal_strength,
        });
    }

    Ok(Capture::new(source, records))
}
