//! Typed error hierarchy for the funban client.
//!
//! Three top-level enums cover the three subsystems:
//! - `SyncError`: WebSocket session setup and command issuing
//! - `ApiError`: REST calls against the auth and history endpoints
//! - `ConfigError`: loading and writing `funban.toml`

use thiserror::Error;

/// Errors from the realtime sync subsystem.
///
/// Socket failures after the session is running are not surfaced here; the
/// connection task logs them and reconnects.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid WebSocket URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("WebSocket URL must use ws:// or wss://, got '{scheme}'")]
    UnsupportedScheme { scheme: String },

    #[error("Connection is not open (status: {status})")]
    NotOpen { status: String },

    #[error("Timed out after {seconds}s waiting for {what}")]
    Timeout { seconds: u64, what: String },

    #[error("Command {uuid} was abandoned before the server acknowledged it")]
    Abandoned { uuid: String },

    #[error("Sync session has shut down")]
    SessionClosed,

    #[error(transparent)]
    Protocol(#[from] funban_common::ProtocolError),
}

/// Errors from the REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No access token available")]
    MissingToken,

    #[error("Sign-in failed: check your email and password.")]
    SignInRejected,

    /// The server rejected the token; callers must tear the session down.
    #[error("Unauthorized: your session has expired, please sign in again.")]
    Unauthorized,

    /// 400 response carrying the server's code and message.
    #[error("{message}")]
    Validation { code: Option<String>, message: String },

    #[error("Forbidden: You do not have access to this resource.")]
    Forbidden,

    #[error("Not Found: The requested resource could not be found.")]
    NotFound,

    #[error("Internal Server Error: Please try again later.")]
    Server,

    #[error("An unexpected error occurred. Please try again later. (HTTP {status})")]
    Unexpected { status: u16 },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid history snapshot: {0}")]
    Snapshot(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_error_not_open_carries_status() {
        let err = SyncError::NotOpen {
            status: "connecting".to_string(),
        };
        assert!(err.to_string().contains("connecting"));
    }

    #[test]
    fn sync_error_converts_from_protocol_error() {
        let inner = funban_common::ProtocolError::MissingType;
        let err: SyncError = inner.into();
        assert!(matches!(
            err,
            SyncError::Protocol(funban_common::ProtocolError::MissingType)
        ));
    }

    #[test]
    fn api_error_validation_displays_server_message() {
        let err = ApiError::Validation {
            code: Some("E_EMAIL_TAKEN".to_string()),
            message: "Email already in use".to_string(),
        };
        assert_eq!(err.to_string(), "Email already in use");
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn api_error_unauthorized_is_matchable() {
        let err = ApiError::Unauthorized;
        assert!(err.is_unauthorized());
    }

    #[test]
    fn api_error_fixed_messages() {
        assert!(ApiError::Forbidden.to_string().starts_with("Forbidden"));
        assert!(ApiError::NotFound.to_string().starts_with("Not Found"));
        assert!(ApiError::Server.to_string().starts_with("Internal Server Error"));
        assert!(
            ApiError::Unexpected { status: 418 }
                .to_string()
                .contains("418")
        );
    }

    #[test]
    fn config_error_invalid_value_carries_key() {
        let err = ConfigError::InvalidValue {
            key: "sync.reconnect_delay_ms".to_string(),
            message: "must be positive".to_string(),
        };
        assert!(err.to_string().contains("sync.reconnect_delay_ms"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&SyncError::SessionClosed);
        assert_std_error(&ApiError::MissingToken);
        let config_err = ConfigError::InvalidValue {
            key: "k".into(),
            message: "m".into(),
        };
        assert_std_error(&config_err);
    }
}
