use serde_json::Value;
use thiserror::Error;

/// A time field that is neither numeric seconds nor a recognized date-time
#[derive(Debug, Clone, PartialEq, Error)]
#[error("time field is not a valid time value: {raw}")]
pub struct TimeParseError {
    pub raw: String,
}

impl TimeParseError {
    pub fn new(raw: &Value) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }
}

/// A geometry field in no encoding the parser understands
#[derive(Debug, Clone, PartialEq, Error)]
#[error("geometry is not a supported geometry type: {raw}")]
pub struct GeometryParseError {
    pub raw: String,
}

impl GeometryParseError {
    pub fn new(raw: &Value) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }
}

/// Why a single ingested row was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error(transparent)]
    Time(#[from] TimeParseError),

    #[error(transparent)]
    Geometry(#[from] GeometryParseError),

    #[error("row has no field {0}")]
    MissingField(String),

    #[error("field {0} does not hold an entity name")]
    MissingEntity(String),
}

#[derive(Debug, Error)]
pub enum PlayError {
    /// Ingestion stopped at `row`; rows before it were kept
    #[error("bad data in row {row}: {source}")]
    Data {
        row: usize,
        #[source]
        source: DataError,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("overlay could not be created: {0}")]
    Overlay(String),
}

impl PlayError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        PlayError::Configuration(msg.into())
    }
}

pub type PlayResult<T> = Result<T, PlayError>;
