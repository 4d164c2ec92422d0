use crate::config::Settings;
use crate::utils::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const HTTP_TIMEOUT_SECS: u64 = 30;
// Token the Firestore emulator accepts as an admin credential
const EMULATOR_TOKEN: &str = "owner";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Service-account descriptor (the JSON key file downloaded from the console)
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub account_type: String,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

// Claims of the signed assertion exchanged for an access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Authentication(format!(
                "cannot read credential file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> AppResult<Self> {
        let key: ServiceAccountKey = serde_json::from_str(raw)
            .map_err(|e| AppError::Authentication(format!("malformed credential descriptor: {}", e)))?;

        if key.account_type != "service_account" {
            return Err(AppError::Authentication(format!(
                "credential type is '{}', expected 'service_account'",
                key.account_type
            )));
        }
        for (name, value) in [
            ("project_id", &key.project_id),
            ("private_key", &key.private_key),
            ("client_email", &key.client_email),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Authentication(format!(
                    "credential descriptor has an empty '{}'",
                    name
                )));
            }
        }

        Ok(key)
    }

    /// Signs the RS256 JWT-bearer assertion for the datastore scope.
    pub fn sign_assertion(&self, now: DateTime<Utc>) -> AppResult<String> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: DATASTORE_SCOPE.to_string(),
            aud: self.token_uri.clone(),
            iat,
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| AppError::Authentication(format!("invalid private key: {}", e)))?;

        encode(&header, &claims, &key)
            .map_err(|e| AppError::Authentication(format!("failed to sign assertion: {}", e)))
    }
}

/// Trades a signed assertion for an OAuth access token.
pub async fn exchange_token(http: &reqwest::Client, key: &ServiceAccountKey) -> AppResult<String> {
    let assertion = key.sign_assertion(Utc::now())?;

    log::debug!("🔑 Requesting access token from {}", key.token_uri);

    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| AppError::Authentication(format!("token request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => body,
        };
        return Err(AppError::Authentication(format!(
            "token endpoint rejected the credential ({}): {}",
            status, detail
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| AppError::Authentication(format!("unreadable token response: {}", e)))?;

    if let Some(expires_in) = token.expires_in {
        log::debug!("🔑 Access token valid for {}s", expires_in);
    }

    Ok(token.access_token)
}

// FIRESTORE_EMULATOR_HOST is `host:port`, but tolerate a scheme or trailing slash
fn emulator_authority(host: &str) -> &str {
    let host = host.trim();
    let host = host
        .strip_prefix("http://")
        .or_else(|| host.strip_prefix("https://"))
        .unwrap_or(host);
    host.trim_end_matches('/')
}

/// Authenticated handle to one Firestore database, scoped to the run.
#[derive(Clone)]
pub struct Session {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    database_id: String,
    access_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub async fn initialize(settings: &Settings) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Authentication(format!("failed to build HTTP client: {}", e)))?;

        if let Some(host) = &settings.emulator_host {
            let project_id = settings.project_id.clone().ok_or_else(|| {
                AppError::Config("FIRESTORE_PROJECT_ID is required with the emulator".to_string())
            })?;
            log::info!("🧪 Using Firestore emulator at {}", host);
            return Ok(Self {
                http,
                base_url: format!("http://{}/v1", emulator_authority(host)),
                project_id,
                database_id: settings.database_id.clone(),
                access_token: EMULATOR_TOKEN.to_string(),
            });
        }

        let key = ServiceAccountKey::from_file(&settings.credentials_path)?;
        let access_token = exchange_token(&http, &key).await?;
        let project_id = settings
            .project_id
            .clone()
            .unwrap_or_else(|| key.project_id.clone());

        Ok(Self {
            http,
            base_url: FIRESTORE_API_BASE.to_string(),
            project_id,
            database_id: settings.database_id.clone(),
            access_token,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// `.../projects/{project}/databases/{database}/documents`
    pub fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url, self.project_id, self.database_id
        )
    }
}
