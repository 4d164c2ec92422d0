use crate::models::UserRecord;
use crate::services::credentials_service::Session;
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Point reads and full-document writes against a keyed collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns `None` when no document exists under `key`.
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<UserRecord>>;

    /// Replaces the whole document under `key` with `record`.
    async fn set(&self, collection: &str, key: &str, record: &UserRecord) -> AppResult<()>;
}

/// Firestore REST v1 document store
#[derive(Debug, Clone)]
pub struct Firestore {
    session: Session,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    fields: UserRecord,
    #[serde(default)]
    update_time: Option<String>,
}

#[derive(Serialize)]
struct DocumentWrite<'a> {
    fields: &'a UserRecord,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl Firestore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    fn document_url(&self, collection: &str, key: &str) -> String {
        document_url(&self.session.documents_root(), collection, key)
    }
}

pub fn document_url(documents_root: &str, collection: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        documents_root,
        urlencoding::encode(collection),
        urlencoding::encode(key)
    )
}

/// Renders a failed response as `STATUS (code): message`.
fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(kind) => format!("{} ({}): {}", kind, status.as_u16(), envelope.error.message),
            None => format!("{}: {}", status, envelope.error.message),
        },
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, body.trim()),
    }
}

#[async_trait]
impl DocumentStore for Firestore {
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<UserRecord>> {
        let url = self.document_url(collection, key);
        log::debug!("📥 GET {}", url);

        let response = self
            .session
            .http()
            .get(&url)
            .bearer_auth(self.session.access_token())
            .send()
            .await
            .map_err(|e| AppError::Read(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Read(describe_failure(status, &body)));
        }

        let document: Document = response
            .json()
            .await
            .map_err(|e| AppError::Read(format!("unreadable document: {}", e)))?;

        log::debug!(
            "📄 Read {} ({} fields, updated {})",
            document.name.as_deref().unwrap_or(key),
            document.fields.field_count(),
            document.update_time.as_deref().unwrap_or("unknown")
        );

        Ok(Some(document.fields))
    }

    async fn set(&self, collection: &str, key: &str, record: &UserRecord) -> AppResult<()> {
        let url = self.document_url(collection, key);
        log::debug!("📤 PATCH {}", url);

        // No updateMask: the stored document is replaced as a whole
        let response = self
            .session
            .http()
            .patch(&url)
            .bearer_auth(self.session.access_token())
            .json(&DocumentWrite { fields: record })
            .send()
            .await
            .map_err(|e| AppError::Write(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Write(describe_failure(status, &body)));
        }

        Ok(())
    }
}
