use crate::archive::{ArchiveError, ArchiveRow, ArchiveSubmission, Archiver, MissingSettings};
use crate::metrics_defs::ARCHIVE_REQUESTS;
use chrono::{DateTime, Utc};
use hyper::StatusCode;
use serde::Serialize;
use shared::counter;
use std::sync::Arc;

/// Body of the `/api/saveToSheet` response.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<MissingSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ArchiveResponse {
    fn error(status: StatusCode, error: &str) -> Self {
        ArchiveResponse {
            status,
            success: false,
            message: None,
            updated_range: None,
            error: Some(error.to_string()),
            missing: None,
            details: None,
        }
    }
}

/// Appends a questionnaire submission to the review spreadsheet.
pub struct ArchiveHandler {
    archiver: Arc<dyn Archiver>,
}

impl ArchiveHandler {
    pub fn new(archiver: Arc<dyn Archiver>) -> Self {
        ArchiveHandler { archiver }
    }

    pub async fn handle(&self, body: &[u8], now: DateTime<Utc>) -> ArchiveResponse {
        let submission = match ArchiveSubmission::from_body(body) {
            Ok(submission) => submission,
            Err(e) => {
                counter!(ARCHIVE_REQUESTS, "outcome" => "malformed_input").increment(1);
                tracing::warn!(error = %e, "Malformed archive body");
                return ArchiveResponse {
                    details: Some(e.to_string()),
                    ..ArchiveResponse::error(StatusCode::BAD_REQUEST, "Invalid request body")
                };
            }
        };

        tracing::debug!(submission = ?submission, "Archiving submission");
        let row = ArchiveRow::from_submission(&submission, now);

        let (outcome, response) = match self.archiver.append(&row).await {
            Ok(receipt) => {
                tracing::info!(updated_range = ?receipt.updated_range, "Submission archived");
                let response = ArchiveResponse {
                    status: StatusCode::OK,
                    success: true,
                    message: Some("Submission saved".into()),
                    updated_range: receipt.updated_range,
                    error: None,
                    missing: None,
                    details: None,
                };
                ("success", response)
            }
            Err(ArchiveError::NotConfigured(missing)) => {
                tracing::error!(
                    missing_email = missing.email,
                    missing_key = missing.key,
                    missing_sheet_id = missing.sheet_id,
                    "Spreadsheet archival is not configured"
                );
                let response = ArchiveResponse {
                    missing: Some(missing),
                    ..ArchiveResponse::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Spreadsheet archival is not configured",
                    )
                };
                ("misconfigured", response)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to archive submission");
                let response = ArchiveResponse {
                    details: Some(e.to_string()),
                    ..ArchiveResponse::error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to save submission",
                    )
                };
                (e.outcome(), response)
            }
        };

        counter!(ARCHIVE_REQUESTS, "outcome" => outcome).increment(1);
        response
    }
}
