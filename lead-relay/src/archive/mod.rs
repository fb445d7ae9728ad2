//! Spreadsheet archival of full lead submissions for human review.
//!
//! Runs on its own route and never shares a failure with the conversion path.

mod row;
mod sheets;

pub use row::{ArchiveRow, ArchiveSubmission};
pub use sheets::SheetsArchiver;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Which archival settings are absent. Serialized as-is in the error response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MissingSettings {
    pub email: bool,
    pub key: bool,
    #[serde(rename = "sheetId")]
    pub sheet_id: bool,
}

impl MissingSettings {
    pub fn any(&self) -> bool {
        self.email || self.key || self.sheet_id
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("spreadsheet archival is not configured")]
    NotConfigured(MissingSettings),

    #[error("service account authentication failed: {0}")]
    Auth(String),

    #[error("spreadsheet API rejected the append with status {status}: {body}")]
    UpstreamRejection { status: StatusCode, body: String },

    #[error("spreadsheet API request failed: {0}")]
    Transport(String),

    #[error("spreadsheet API request timed out after {0:?}")]
    Timeout(Duration),
}

impl ArchiveError {
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            ArchiveError::NotConfigured(_) => "misconfigured",
            ArchiveError::Auth(_) => "auth_error",
            ArchiveError::UpstreamRejection { .. } => "rejected",
            ArchiveError::Transport(_) => "transport_error",
            ArchiveError::Timeout(_) => "timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReceipt {
    /// A1 range the row landed in, as reported by the store
    pub updated_range: Option<String>,
}

/// Appends one row per submission to a tabular store.
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn append(&self, row: &ArchiveRow) -> Result<ArchiveReceipt, ArchiveError>;
}
