//! REST client for the auth, account and history endpoints.
//!
//! Every authenticated call sends `Authorization: Bearer <token>`. Status
//! codes are mapped onto [`ApiError`]; a 401 means the token is no longer
//! valid and the caller is expected to drop its credentials and close the
//! board session.

pub mod models;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::board::NoteRecord;
use crate::errors::ApiError;
use funban_common::Note;
pub use models::{Account, HistoryItem, HistoryRef, SignIn};
use models::{
    ChangeEmailRequest, ChangePasswordRequest, ErrorBody, SignInRequest, SnapshotOwnerFields,
    SnapshotRequest,
};

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── auth ────────────────────────────────────────────────────────────

    /// Exchange credentials for an access token. Does not need a token.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SignIn, ApiError> {
        let url = self.url("/auth/signin");
        tracing::debug!(%url, "signing in");
        let response = self
            .http
            .post(&url)
            .json(&SignInRequest { username, password })
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            tracing::debug!(status = response.status().as_u16(), "sign-in rejected");
            return Err(ApiError::SignInRejected);
        }
        response
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    pub async fn me(&self) -> Result<Account, ApiError> {
        self.get("/auth/me").await
    }

    pub async fn change_password(&self, old: &str, new: &str) -> Result<(), ApiError> {
        self.post_ignoring_body(
            "/auth/password",
            &ChangePasswordRequest {
                old_password: old,
                new_password: new,
            },
        )
        .await
    }

    pub async fn change_email(&self, new_email: &str) -> Result<(), ApiError> {
        self.post_ignoring_body("/auth/email", &ChangeEmailRequest { new_email })
            .await
    }

    // ── history ─────────────────────────────────────────────────────────

    pub async fn history(&self) -> Result<Vec<HistoryItem>, ApiError> {
        self.get("/history").await
    }

    pub async fn history_item(&self, id: i64) -> Result<HistoryItem, ApiError> {
        self.get(&format!("/history/browser/{}", id)).await
    }

    pub async fn history_last(&self) -> Result<HistoryItem, ApiError> {
        self.get("/history/browser").await
    }

    /// Store the given notes as a labelled snapshot.
    pub async fn post_snapshot(&self, label: &str, notes: &[NoteRecord]) -> Result<(), ApiError> {
        let snapshot = encode_snapshot(notes)?;
        self.post_ignoring_body("/history", &SnapshotRequest { label, snapshot })
            .await
    }

    // ── plumbing ────────────────────────────────────────────────────────

    fn bearer(&self) -> Result<&str, ApiError> {
        self.token.as_deref().ok_or(ApiError::MissingToken)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(String, Response), ApiError> {
        let token = self.bearer()?;
        let url = self.url(path);
        tracing::debug!(%method, %url, "api request");

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", token));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.clone(),
            source,
        })?;
        let response = check_status(response).await?;
        Ok((url, response))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let (url, response) = self.send::<()>(Method::GET, path, None).await?;
        response
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    async fn post_ignoring_body<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        self.send(Method::POST, path, Some(body)).await?;
        Ok(())
    }
}

/// Map non-success statuses onto [`ApiError`].
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    tracing::warn!(status = status.as_u16(), url = %response.url(), "api request failed");

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::BAD_REQUEST => {
            let raw = response.text().await.unwrap_or_default();
            Err(validation_error(&raw))
        }
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound),
        StatusCode::INTERNAL_SERVER_ERROR => Err(ApiError::Server),
        other => Err(ApiError::Unexpected {
            status: other.as_u16(),
        }),
    }
}

fn validation_error(raw: &str) -> ApiError {
    let body: ErrorBody = serde_json::from_str(raw).unwrap_or_default();
    let message = body
        .message
        .or(body.detail)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if raw.trim().is_empty() {
                "Bad request".to_string()
            } else {
                raw.trim().to_string()
            }
        });
    ApiError::Validation {
        code: body.code,
        message,
    }
}

/// base64 of the UTF-8 JSON encoding of `notes`.
pub fn encode_snapshot(notes: &[NoteRecord]) -> Result<String, ApiError> {
    let json = serde_json::to_vec(notes)
        .map_err(|e| ApiError::Snapshot(format!("failed to encode notes: {}", e)))?;
    Ok(STANDARD.encode(json))
}

/// Decode the `snapshot` field of a history item. Items without a snapshot
/// decode to an empty list.
pub fn decode_snapshot(item: &HistoryItem) -> Result<Vec<NoteRecord>, ApiError> {
    let Some(encoded) = item.snapshot.as_deref() else {
        return Ok(Vec::new());
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::Snapshot(format!("not valid base64: {}", e)))?;
    let values: Vec<serde_json::Value> = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::Snapshot(format!("not a JSON list of notes: {}", e)))?;

    values
        .into_iter()
        .map(|value| {
            let owner: SnapshotOwnerFields = serde_json::from_value(value.clone())
                .map_err(|e| ApiError::Snapshot(e.to_string()))?;
            let note: Note =
                serde_json::from_value(value).map_err(|e| ApiError::Snapshot(e.to_string()))?;
            Ok(owner.into_record(note))
        })
        .collect()
}
