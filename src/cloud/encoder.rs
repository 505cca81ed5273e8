//! # Point Cloud Encoder
//!
//! Serializes a capture into one of the downloadable 3D formats.

use bytes::{BufMut, BytesMut};

use super::format::{self, BINARY_POINT_SIZE};
use super::record::{Capture, PointRecord};
use crate::error::{Result, ScanRigError};

/// Output formats supported by the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudFormat {
    /// PLY with ASCII point lines
    PlyAscii,

    /// PLY with 13-byte little-endian binary point records
    PlyBinary,

    /// Bare coordinate lines, no header
    Xyz,
}

impl CloudFormat {
    /// Resolve a format from its request name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ply" => Some(Self::PlyAscii),
            "ply_binary" => Some(Self::PlyBinary),
            "xyz" => Some(Self::Xyz),
            _ => None,
        }
    }

    /// Request name for this format
    pub fn name(self) -> &'static str {
        match self {
            Self::PlyAscii => "ply",
            Self::PlyBinary => "ply_binary",
            Self::Xyz => "xyz",
        }
    }

    /// File extension for encoded output
    pub fn extension(self) -> &'static str {
        match self {
            Self::PlyAscii | Self::PlyBinary => "ply",
            Self::Xyz => "xyz",
        }
    }
}

/// Encode a capture into the requested format.
///
/// The encode is atomic: a capture that cannot produce a complete, valid file
/// produces no bytes at all.
///
/// # Errors
///
/// Returns [`ScanRigError::EmptyCapture`] if the capture contains zero
/// records; an empty-but-present file is never produced.
pub fn encode(capture: &Capture, format: CloudFormat) -> Result<Vec<u8>> {
    if capture.is_empty() {
        return Err(ScanRigError::EmptyCapture(capture.source.clone()));
    }

    Ok(match format {
        CloudFormat::PlyAscii => encode_ply_ascii(capture),
        CloudFormat::PlyBinary => encode_ply_binary(capture),
        CloudFormat::Xyz => encode_xyz(capture),
    })
}

/// One ASCII point line: coordinates rounded to two decimals, then the
/// signal strength byte
fn point_line(record: &PointRecord) -> String {
    format!(
        "{} {} {} {}",
        format::format_coord(record.x),
        format::format_coord(record.y),
        format::format_coord(record.z),
        record.signal_strength
    )
}

fn encode_ply_ascii(capture: &Capture) -> Vec<u8> {
    let mut out = format::ply_header(capture.len(), false);
    for record in &capture.records {
        out.push('\n');
        out.push_str(&point_line(record));
    }
    out.into_bytes()
}

fn encode_ply_binary(capture: &Capture) -> Vec<u8> {
    let header = format::ply_header(capture.len(), true);

    // exact final size: no padding after the last record
    let mut buffer = BytesMut::with_capacity(header.len() + capture.len() * BINARY_POINT_SIZE);
    buffer.put_slice(header.as_bytes());

    for record in &capture.records {
        buffer.put_f32_le(format::round_coord(record.x) as f32);
        buffer.put_f32_le(format::round_coord(record.y) as f32);
        buffer.put_f32_le(format::round_coord(record.z) as f32);
        buffer.put_u8(record.signal_strength);
    }

    buffer.to_vec()
}

fn encode_xyz(capture: &Capture) -> Vec<u8> {
    capture
        .records
        .iter()
        .map(point_line)
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}
