//! Error taxonomy for the visualization core.
//!
//! None of these are fatal: a failed fetch leaves the previous collection on
//! screen, a rejected submission leaves the collection unchanged, and a
//! surface error only drops the offending draw call.

use std::path::PathBuf;

use thiserror::Error;

/// Loading the complaint collection from the data endpoint failed.
#[derive(Debug, Error)]
pub enum DataFetchError {
    #[error("failed to read complaints from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse complaint payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("complaint endpoint error: {0}")]
    Endpoint(String),
}

/// A complaint submission is missing required fields or carries bad values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `issue_type`")]
    MissingIssueType,

    #[error("missing required field `coordinates`")]
    MissingCoordinates,

    #[error("coordinates must be a finite [latitude, longitude] pair")]
    InvalidCoordinates,
}

/// A call against the map surface could not be honored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("unknown source `{0}`")]
    UnknownSource(String),

    #[error("source `{0}` already exists")]
    DuplicateSource(String),

    #[error("layer `{0}` already exists")]
    DuplicateLayer(String),

    #[error("map surface has been destroyed")]
    Destroyed,
}
