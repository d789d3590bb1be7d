//! Platform error payloads and ban failure classification.

use serde::Deserialize;
use std::fmt;

use banlist_core::BanFailure;

/// JSON error code: missing permissions.
pub const MISSING_PERMISSIONS: u64 = 50013;
/// JSON error code reported when a ban cannot be added again.
pub const BAN_CONFLICT: u64 = 30035;
/// JSON error code: unknown user.
pub const UNKNOWN_USER: u64 = 10013;

/// Error body returned by the platform on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    /// Platform JSON error code
    #[serde(default)]
    pub code: Option<u64>,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

/// A failed REST call.
#[derive(Debug)]
pub enum RestError {
    /// Connection, timeout or body decoding failure
    Transport(reqwest::Error),
    /// The platform answered with a non-success status
    Api {
        /// HTTP status code
        status: u16,
        /// Decoded error body, empty when undecodable
        body: ApiErrorBody,
    },
    /// Request could not be built
    Request(String),
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::Api { status, body } => match body.code {
                Some(code) => write!(f, "HTTP {status} (code {code}): {}", body.message),
                None => write!(f, "HTTP {status}: {}", body.message),
            },
            Self::Request(message) => write!(f, "invalid request: {message}"),
        }
    }
}

impl std::error::Error for RestError {}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

/// Map a failed ban call onto the engine's failure taxonomy.
///
/// A 403 is always a permission failure, whatever its JSON code. A 404 means
/// the user is gone unless the body names a different unknown entity.
pub fn classify_ban_error(err: &RestError) -> BanFailure {
    match err {
        RestError::Api { status: 403, .. } => BanFailure::permission(err.to_string()),
        RestError::Api { status, body } => match (*status, body.code) {
            (_, Some(MISSING_PERMISSIONS)) => BanFailure::permission(err.to_string()),
            (_, Some(BAN_CONFLICT)) => BanFailure::conflict(err.to_string()),
            (_, Some(UNKNOWN_USER)) | (404, None) => BanFailure::not_found(err.to_string()),
            _ => BanFailure::transient(err.to_string()),
        },
        RestError::Transport(_) | RestError::Request(_) => BanFailure::transient(err.to_string()),
    }
}
