//! Error types for tile address handling.

use thiserror::Error;

/// Why a zoom/column/row triple is not a valid tile address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileAddressError {
    #[error("Invalid parameter value for '{param}': {value} must not be negative")]
    Negative { param: &'static str, value: i64 },

    #[error("Invalid parameter value for 'tilematrix': zoom {zoom} exceeds the maximum of {max}")]
    ZoomTooLarge { zoom: i64, max: u32 },

    #[error(
        "Invalid parameter value for '{param}': {value} is out of range for zoom {zoom} (valid range: 0-{})",
        .limit - 1
    )]
    OutOfRange {
        param: &'static str,
        value: i64,
        zoom: u32,
        limit: u64,
    },
}

impl TileAddressError {
    /// Name of the request parameter that carried the bad value.
    pub fn param(&self) -> &'static str {
        match self {
            TileAddressError::Negative { param, .. } => param,
            TileAddressError::ZoomTooLarge { .. } => "tilematrix",
            TileAddressError::OutOfRange { param, .. } => param,
        }
    }
}
