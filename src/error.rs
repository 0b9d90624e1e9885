//! Library error type. Construction-time validation only — the detector hot
//! path never fails (it returns packages or asks for more data).

use thiserror::Error;

/// Errors raised when building detector components with bad parameters.
#[derive(Debug, Error, PartialEq)]
pub enum DetectorError {
    /// Median window must be odd and nonzero.
    #[error("median window must be odd and nonzero, got {0}")]
    InvalidMedianWindow(usize),

    /// Peak follower rates must lie strictly inside (0, 1).
    #[error("peak follower {name} rate must be in (0, 1), got {value}")]
    InvalidFollowerRate { name: &'static str, value: f32 },

    /// DC blocker ring length must be nonzero.
    #[error("dc blocker length must be nonzero")]
    InvalidDcBlockerLen,

    /// Sample rate must be nonzero where one is consumed at construction.
    #[error("sample rate must be nonzero")]
    InvalidSampleRate,
}
