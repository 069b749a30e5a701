//! File-backed complaint data endpoint.
//!
//! `list` returns the whole `{ "complaints": [...] }` document; `submit`
//! validates one complaint, appends it and writes the document back.

use std::path::{Path, PathBuf};

use complaint_map::complaint::{ComplaintCollection, ComplaintSubmission};
use complaint_map::store::ComplaintSource;
use complaint_map::{Complaint, DataFetchError, ValidationError};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid complaint data: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Failed to read complaints from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse complaints file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to write complaints to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EndpointError {
    /// HTTP-style status: 400 for bad submissions, 500 for storage failures.
    pub fn status(&self) -> u16 {
        match self {
            EndpointError::Invalid(_) => 400,
            _ => 500,
        }
    }
}

#[derive(Debug)]
pub struct ComplaintRepository {
    path: PathBuf,
    // Serializes read-modify-write cycles of `submit`.
    write_lock: Mutex<()>,
}

impl ComplaintRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty collection file if none exists yet.
    pub async fn ensure_exists(&self) -> Result<(), EndpointError> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(());
        }
        info!("Creating empty complaint file at {:?}", self.path);
        self.write(&ComplaintCollection::default()).await
    }

    pub async fn list(&self) -> Result<ComplaintCollection, EndpointError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| EndpointError::Read {
                path: self.path.clone(),
                source,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Validate and append one complaint; returns the updated collection.
    /// A rejected submission leaves the file untouched.
    pub async fn submit(
        &self,
        submission: ComplaintSubmission,
    ) -> Result<ComplaintCollection, EndpointError> {
        let today = chrono::Local::now().date_naive();
        let complaint = submission.validate(today)?;

        let _guard = self.write_lock.lock().await;
        let mut data = self.list().await?;
        data.complaints.push(complaint);
        self.write(&data).await?;
        info!("Stored complaint #{}", data.complaints.len() - 1);
        Ok(data)
    }

    async fn write(&self, data: &ComplaintCollection) -> Result<(), EndpointError> {
        let json = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| {
                error!("Failed to write {:?}: {}", self.path, source);
                EndpointError::Write {
                    path: self.path.clone(),
                    source,
                }
            })
    }
}

impl ComplaintSource for ComplaintRepository {
    async fn fetch(&self) -> Result<Vec<Complaint>, DataFetchError> {
        self.list()
            .await
            .map(|data| data.complaints)
            .map_err(|e| DataFetchError::Endpoint(e.to_string()))
    }
}
