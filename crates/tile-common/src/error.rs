//! Error types for earth-tiles services.
//!
//! One taxonomy for the whole pipeline. Recoverable upstream failures
//! (unreachable or undecodable source tiles) never surface here: the
//! compositor resolves them to a placeholder image. Everything in this enum
//! is either a structural problem with the request or an infrastructure
//! fault worth reporting to the caller.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Primary error type for tile operations.
#[derive(Debug, Error)]
pub enum TileError {
    // === Source Errors ===
    #[error("Upstream fetch failed: {0}")]
    FetchFailed(String),

    #[error("Failed to decode source image: {0}")]
    DecodeFailed(String),

    #[error("Images must have 1, 3, or 4 bands, got {0}")]
    UnsupportedBandCount(usize),

    // === Compositing Errors ===
    #[error("Reprojection failed: {0}")]
    WarpFailed(String),

    #[error("Failed to encode tile: {0}")]
    EncodeFailed(String),

    // === Storage Errors ===
    #[error("Cache error: {0}")]
    CacheError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl TileError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TileError::FetchFailed(_) | TileError::DecodeFailed(_) => 502,
            TileError::ServiceUnavailable(_) => 503,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for TileError {
    fn from(err: std::io::Error) -> Self {
        TileError::InternalError(err.to_string())
    }
}
