use geostore_types::TypeError;

/// Errors produced while matching geometry to cells.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeoError {
    /// Coordinate sequence is empty, odd-length, or non-finite.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Requested level is beyond what the tessellation supports.
    #[error("invalid level {level}: tessellation supports 0..={max}")]
    InvalidLevel { level: u8, max: u8 },
}

impl From<TypeError> for GeoError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::InvalidGeometry(reason) => Self::InvalidGeometry(reason),
            other => Self::InvalidGeometry(other.to_string()),
        }
    }
}

/// Result alias for geometry matching.
pub type GeoResult<T> = Result<T, GeoError>;
