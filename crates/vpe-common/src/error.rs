//! Error types for OpenVPE

use thiserror::Error;

/// OpenVPE error type
#[derive(Error, Debug)]
pub enum VpeError {
    /// Configuration rejected at construction time
    #[error("config error: {0}")]
    Config(String),

    /// Steering pick range wider than the slot table
    #[error("steering range {range} exceeds table capacity {capacity}")]
    SteeringRange {
        /// Requested pick range
        range: u32,
        /// Slots available in the table
        capacity: usize,
    },
}

/// Result type for OpenVPE
pub type VpeResult<T> = Result<T, VpeError>;
