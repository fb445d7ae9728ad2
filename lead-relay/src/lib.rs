pub mod api;
pub mod archive;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod http;
pub mod metrics_defs;
pub mod normalizer;
pub mod service;
pub mod submission;

#[cfg(test)]
mod testutils;

use archive::SheetsArchiver;
use errors::LeadRelayError;
use service::LeadRelayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

pub async fn run(config: config::Config) -> Result<(), LeadRelayError> {
    warn_missing_settings(&config);

    let archiver = Arc::new(SheetsArchiver::new(config.archive.clone()));
    let relay_service = LeadRelayService::new(&config, archiver);
    let admin_service = AdminService::<_, LeadRelayError>::new(|| true);

    let relay_task = run_http_service(&config.listener.host, config.listener.port, relay_service);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(relay_task, admin_task)?;
    Ok(())
}

// Missing secrets are not fatal at startup: each request reports them again.
fn warn_missing_settings(config: &config::Config) {
    let missing = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());

    if missing(&config.conversion.access_token) {
        tracing::warn!(setting = "access_token", "Conversion API setting is not configured");
    }

    let archive = &config.archive;
    for (setting, value) in [
        ("service_account_email", &archive.service_account_email),
        ("private_key", &archive.private_key),
        ("spreadsheet_id", &archive.spreadsheet_id),
    ] {
        if missing(value) {
            tracing::warn!(setting, "Spreadsheet archival setting is not configured");
        }
    }
}
