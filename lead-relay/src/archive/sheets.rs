use super::{ArchiveError, ArchiveReceipt, ArchiveRow, Archiver, MissingSettings};
use crate::config::ArchiveConfig;
use crate::http::upstream_error_message;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::timeout;
use url::Url;

const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Appends rows to a Google spreadsheet using service account credentials.
///
/// A short-lived access token is minted for every append; nothing is cached between
/// requests.
pub struct SheetsArchiver {
    client: reqwest::Client,
    config: ArchiveConfig,
}

struct Credentials<'a> {
    email: &'a str,
    private_key: &'a str,
    spreadsheet_id: &'a str,
}

impl SheetsArchiver {
    pub fn new(config: ArchiveConfig) -> Self {
        SheetsArchiver {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn credentials(&self) -> Result<Credentials<'_>, ArchiveError> {
        let email = non_blank(&self.config.service_account_email);
        let private_key = non_blank(&self.config.private_key);
        let spreadsheet_id = non_blank(&self.config.spreadsheet_id);

        match (email, private_key, spreadsheet_id) {
            (Some(email), Some(private_key), Some(spreadsheet_id)) => Ok(Credentials {
                email,
                private_key,
                spreadsheet_id,
            }),
            _ => Err(ArchiveError::NotConfigured(MissingSettings {
                email: email.is_none(),
                key: private_key.is_none(),
                sheet_id: spreadsheet_id.is_none(),
            })),
        }
    }

    fn signed_assertion(&self, credentials: &Credentials<'_>, now: u64) -> Result<String, ArchiveError> {
        #[derive(Debug, Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: u64,
            exp: u64,
        }

        let claims = Claims {
            iss: credentials.email,
            scope: SPREADSHEETS_SCOPE,
            aud: self.config.token_url.as_str(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|error| ArchiveError::Auth(format!("invalid private key: {error}")))?;

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|error| ArchiveError::Auth(error.to_string()))
    }

    async fn access_token(&self, credentials: &Credentials<'_>) -> Result<String, ArchiveError> {
        #[derive(Debug, Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|error| ArchiveError::Auth(error.to_string()))?
            .as_secs();
        let assertion = self.signed_assertion(credentials, now)?;

        let response = self
            .client
            .post(self.config.token_url.clone())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read token response body".to_string());
            return Err(ArchiveError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|error| ArchiveError::Auth(error.to_string()))?;

        Ok(token.access_token)
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}:append?valueInputOption=USER_ENTERED`
    fn append_url(&self, spreadsheet_id: &str) -> Result<Url, ArchiveError> {
        let range_segment = format!("{}:append", self.config.range);
        let mut url = self.config.sheets_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ArchiveError::Transport("sheets_base_url cannot be a base".into()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                spreadsheet_id,
                "values",
                range_segment.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        Ok(url)
    }

    async fn append_row(&self, row: &ArchiveRow) -> Result<ArchiveReceipt, ArchiveError> {
        #[derive(Serialize)]
        struct ValueRange<'a> {
            values: [&'a ArchiveRow; 1],
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct AppendUpdates {
            updated_range: Option<String>,
        }

        #[derive(Deserialize)]
        struct AppendResponse {
            updates: Option<AppendUpdates>,
        }

        let credentials = self.credentials()?;
        let url = self.append_url(credentials.spreadsheet_id)?;
        let token = self.access_token(&credentials).await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&ValueRange { values: [row] })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ArchiveError::UpstreamRejection { status, body });
        }

        let parsed: AppendResponse = response.json().await.map_err(transport_error)?;
        Ok(ArchiveReceipt {
            updated_range: parsed.updates.and_then(|u| u.updated_range),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn transport_error(error: reqwest::Error) -> ArchiveError {
    ArchiveError::Transport(upstream_error_message(error))
}

#[async_trait]
impl Archiver for SheetsArchiver {
    async fn append(&self, row: &ArchiveRow) -> Result<ArchiveReceipt, ArchiveError> {
        let limit: Duration = self.config.timeout();
        timeout(limit, self.append_row(row))
            .await
            .map_err(|_| ArchiveError::Timeout(limit))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveSubmission;
    use chrono::Utc;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = include_str!("../../testdata/test_service_account_key.pem");

    fn config(server: &MockServer) -> ArchiveConfig {
        ArchiveConfig {
            service_account_email: Some("relay@project.iam.gserviceaccount.com".into()),
            private_key: Some(TEST_KEY.into()),
            spreadsheet_id: Some("sheet-1".into()),
            token_url: Url::parse(&format!("{}/token", server.uri())).unwrap(),
            sheets_base_url: Url::parse(&server.uri()).unwrap(),
            timeout_secs: 2,
            ..Default::default()
        }
    }

    fn row() -> ArchiveRow {
        let submission = ArchiveSubmission {
            full_name: Some("Somchai Jaidee".into()),
            is_pregnant: Some("no".into()),
            ..Default::default()
        };
        ArchiveRow::from_submission(&submission, Utc::now())
    }

    async fn mount_token_endpoint(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
            ))
            .and(body_string_contains("assertion="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.test",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_append_success() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Sheet1!A:N:append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "spreadsheetId": "sheet-1",
                "updates": {"updatedRange": "Sheet1!A7:N7", "updatedRows": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let archiver = SheetsArchiver::new(config(&server));
        let receipt = archiver.append(&row()).await.unwrap();
        assert_eq!(receipt.updated_range.as_deref(), Some("Sheet1!A7:N7"));

        let requests = server.received_requests().await.unwrap();
        let append = requests
            .iter()
            .find(|r| r.url.path().ends_with(":append"))
            .unwrap();
        let body: Value = append.body_json().unwrap();
        let values = body["values"].as_array().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].as_array().unwrap().len(), 14);
        assert_eq!(values[0][1], "Somchai Jaidee");
        assert_eq!(values[0][10], "ไม่ใช่");
    }

    #[tokio::test]
    async fn test_missing_settings_make_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = config(&server);
        config.private_key = None;
        config.spreadsheet_id = Some(" ".into());

        let err = SheetsArchiver::new(config).append(&row()).await.unwrap_err();
        match err {
            ArchiveError::NotConfigured(missing) => {
                assert_eq!(
                    missing,
                    MissingSettings {
                        email: false,
                        key: true,
                        sheet_id: true
                    }
                );
                assert!(missing.any());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_key_is_auth_error() {
        let server = MockServer::start().await;
        let mut config = config(&server);
        config.private_key = Some("not a pem".into());

        let err = SheetsArchiver::new(config).append(&row()).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Auth(_)));
    }

    #[tokio::test]
    async fn test_token_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let err = SheetsArchiver::new(config(&server)).append(&row()).await.unwrap_err();
        match err {
            ArchiveError::Auth(message) => assert!(message.contains("invalid_grant")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_keeps_cause() {
        let server = MockServer::start().await;
        let mut config = config(&server);
        config.token_url = Url::parse("http://127.0.0.1:1/token").unwrap();

        let err = SheetsArchiver::new(config).append(&row()).await.unwrap_err();
        match err {
            ArchiveError::Transport(message) => {
                assert!(message.to_lowercase().contains("connect"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_append_rejection() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server).await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Sheet1!A:N:append"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let err = SheetsArchiver::new(config(&server)).append(&row()).await.unwrap_err();
        match err {
            ArchiveError::UpstreamRejection { status, body } => {
                assert_eq!(status, reqwest::StatusCode::FORBIDDEN);
                assert_eq!(body, "permission denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
