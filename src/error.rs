//! # Error Types
//!
//! Custom error types for Scan Rig using `thiserror`.

use thiserror::Error;

/// Main error type for Scan Rig
#[derive(Debug, Error)]
pub enum ScanRigError {
    /// Rejected launch/cancel requests (unknown operation, bad parameters,
    /// or a launch while a worker is already active)
    #[error("request error: {0}")]
    Request(String),

    /// Capture data that cannot be decoded into point records
    #[error("capture parse error: {0}")]
    CaptureParse(#[from] csv::Error),

    /// Encoding was asked to produce a file from a capture with no records
    #[error("capture '{0}' contains no records")]
    EmptyCapture(String),

    /// Malformed point cloud data handed to the decoder
    #[error("point cloud format error: {0}")]
    CloudFormat(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Scan Rig
pub type Result<T> = std::result::Result<T, ScanRigError>;
