use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Empty pixel id")]
    EmptyPixelId,

    #[error("Default currency must be a three letter code, got {0:?}")]
    InvalidCurrency(String),

    #[error("Default value must be a finite number >= 0, got {0}")]
    InvalidDefaultValue(f64),

    #[error("Timeout for {0} cannot be 0")]
    ZeroTimeout(&'static str),

    #[error("max_body_bytes cannot be 0")]
    ZeroBodyLimit,
}

/// Lead relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the public lead endpoints
    #[serde(default)]
    pub listener: Listener,
    /// Listener for health and readiness probes
    #[serde(default = "Listener::default_admin")]
    pub admin_listener: Listener,
    /// Upper bound on accepted request bodies
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: Listener::default(),
            admin_listener: Listener::default_admin(),
            max_body_bytes: default_max_body_bytes(),
            conversion: ConversionConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.max_body_bytes == 0 {
            return Err(ValidationError::ZeroBodyLimit);
        }

        self.conversion.validate()?;

        if self.archive.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("archive"));
        }

        Ok(())
    }

    /// Overrides secrets and deployment identifiers from the environment.
    ///
    /// `lookup` is `std::env::var` in production; empty values are treated as unset.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(pixel_id) = var("META_PIXEL_ID") {
            self.conversion.pixel_id = pixel_id;
        }
        if let Some(token) = var("META_ACCESS_TOKEN") {
            self.conversion.access_token = Some(token);
        }
        if let Some(code) = var("META_TEST_EVENT_CODE") {
            self.conversion.test_event_code = Some(code);
        }
        if let Some(email) = var("GOOGLE_SERVICE_ACCOUNT_EMAIL") {
            self.archive.service_account_email = Some(email);
        }
        if let Some(key) = var("GOOGLE_PRIVATE_KEY") {
            // Keys pasted into env files usually carry escaped newlines
            self.archive.private_key = Some(key.replace("\\n", "\n"));
        }
        if let Some(sheet_id) = var("GOOGLE_SHEET_ID") {
            self.archive.spreadsheet_id = Some(sheet_id);
        }
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl Listener {
    fn default_admin() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3001,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Which submission fields feed the hashed name keys of `user_data`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityFieldSet {
    /// `firstName` -> `fn`, `lastName` -> `ln`
    #[default]
    SplitName,
    /// `fullName` -> `fn`, no `ln`
    FullName,
}

/// Conversion API settings
#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversionConfig {
    pub pixel_id: String,
    /// Access credential. Usually injected through `META_ACCESS_TOKEN`.
    pub access_token: Option<String>,
    /// Routes events to the platform's test console when set.
    pub test_event_code: Option<String>,
    pub api_base_url: Url,
    pub api_version: String,
    /// Used when the client does not send `eventSourceUrl`
    pub default_event_source_url: String,
    pub default_currency: String,
    pub default_value: f64,
    pub identity_fields: IdentityFieldSet,
    pub include_custom_data: bool,
    pub timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        ConversionConfig {
            pixel_id: "1816534509233210".into(),
            access_token: None,
            test_event_code: None,
            api_base_url: Url::parse("https://graph.facebook.com").expect("static url"),
            api_version: "v19.0".into(),
            default_event_source_url: "https://koreandiet.store/".into(),
            default_currency: "KRW".into(),
            default_value: 0.0,
            identity_fields: IdentityFieldSet::default(),
            include_custom_data: true,
            timeout_secs: 10,
        }
    }
}

impl ConversionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pixel_id.trim().is_empty() {
            return Err(ValidationError::EmptyPixelId);
        }

        let currency = &self.default_currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(currency.clone()));
        }

        // serde_json writes non-finite floats as null
        if !self.default_value.is_finite() || self.default_value < 0.0 {
            return Err(ValidationError::InvalidDefaultValue(self.default_value));
        }

        if self.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout("conversion"));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("pixel_id", &self.pixel_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("test_event_code", &self.test_event_code)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("api_version", &self.api_version)
            .field("default_event_source_url", &self.default_event_source_url)
            .field("default_currency", &self.default_currency)
            .field("default_value", &self.default_value)
            .field("identity_fields", &self.identity_fields)
            .field("include_custom_data", &self.include_custom_data)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Spreadsheet archival settings
#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArchiveConfig {
    pub service_account_email: Option<String>,
    /// PEM encoded service account key
    pub private_key: Option<String>,
    pub spreadsheet_id: Option<String>,
    /// A1 range rows are appended to
    pub range: String,
    pub token_url: Url,
    pub sheets_base_url: Url,
    pub timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            service_account_email: None,
            private_key: None,
            spreadsheet_id: None,
            range: "Sheet1!A:N".into(),
            token_url: Url::parse("https://oauth2.googleapis.com/token").expect("static url"),
            sheets_base_url: Url::parse("https://sheets.googleapis.com").expect("static url"),
            timeout_secs: 10,
        }
    }
}

impl ArchiveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl std::fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("service_account_email", &self.service_account_email)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .field("token_url", &self.token_url.as_str())
            .field("sheets_base_url", &self.sheets_base_url.as_str())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}
