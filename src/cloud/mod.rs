//! # Point Cloud Module
//!
//! Parsing and serialization of scan captures.
//!
//! This module handles:
//! - Parsing tabular captures (X, Y, Z, signal strength) into point records
//! - PLY encoding, ASCII and binary little-endian (13 bytes per point)
//! - XYZ encoding (bare coordinate lines, no header)
//! - Decoding binary PLY back into point records

pub mod format;
pub mod record;
pub mod encoder;
pub mod decoder;

pub use encoder::CloudFormat;
pub use record::{Capture, PointRecord};
