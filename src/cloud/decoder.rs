//! # Point Cloud Decoder
//!
//! Decodes binary PLY files back into point records, for re-import and for
//! verifying encoder output.

use super::format::{BINARY_POINT_SIZE, PLY_FORMAT_BINARY, PLY_MAGIC};
use super::record::PointRecord;
use crate::error::{Result, ScanRigError};

/// Decode a binary little-endian PLY buffer into point records.
///
/// # Errors
///
/// Returns error if:
/// - The end-of-header marker is missing
/// - The header is not valid UTF-8, not PLY, or not the binary form
/// - The vertex count is missing or malformed
/// - The body is not exactly `13 * vertex_count` bytes
pub fn decode_ply_binary(data: &[u8]) -> Result<Vec<PointRecord>> {
    const END_MARKER: &[u8] = b"end_header\n";

    let marker_pos = data
        .windows(END_MARKER.len())
        .position(|window| window == END_MARKER)
        .ok_or_else(|| ScanRigError::CloudFormat("missing end_header marker".to_string()))?;
    let body_start = marker_pos + END_MARKER.len();

    let header = std::str::from_utf8(&data[..body_start])
        .map_err(|_| ScanRigError::CloudFormat("header is not valid UTF-8".to_string()))?;

    let mut lines = header.lines();
    if lines.next() != Some(PLY_MAGIC) {
        return Err(ScanRigError::CloudFormat("not a PLY file".to_string()));
    }

    if !header.contains(PLY_FORMAT_BINARY) {
        return Err(ScanRigError::CloudFormat(
            "not a binary_little_endian PLY file".to_string(),
        ));
    }

    let count: usize = header
        .lines()
        .find_map(|line| line.strip_prefix("element vertex "))
        .ok_or_else(|| ScanRigError::CloudFormat("missing vertex count".to_string()))?
        .trim()
        .parse()
        .map_err(|_| ScanRigError::CloudFormat("malformed vertex count".to_string()))?;

    let body = &data[body_start..];
    if body.len() != count * BINARY_POINT_SIZE {
        return Err(ScanRigError::CloudFormat(format!(
            "expected {} point bytes, got {}",
            count * BINARY_POINT_SIZE,
            body.len()
        )));
    }

    let mut records = Vec::with_capacity(count);
    for chunk in body.chunks_exact(BINARY_POINT_SIZE) {
        records.push(PointRecord {
            x: read_f32_le(&chunk[0..4]) as f64,
            y: read_f32_le(&chunk[4..8]) as f64,
            z: read_f32_le(&chunk[8..12]) as f64,
            signal_strength: chunk[12],
        });
    }

    Ok(records)
}

fn read_f32_le(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
