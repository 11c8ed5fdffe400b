//! Client side of the PIN gate.
//!
//! [`gate::AuthGate`] blocks everything until a correct PIN is entered, then
//! hands out an [`http::AuthorizedClient`] that stamps the token on every
//! request. Logging out drops that client; callers are left with the bare
//! [`http::HttpClient`] again.

pub mod api;
pub mod gate;
pub mod http;
pub mod store;

pub use api::MemoriesClient;
pub use gate::{AuthGate, GateError, GateState, Keypress, PinValidator, RemoteVerifier};
pub use http::{AuthorizedClient, Dispatch, HttpClient};
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Unable to reach the server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid API URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("{status}: {message}")]
    Http { status: StatusCode, message: String },
    #[error("Token cannot be sent as a header value")]
    InvalidToken,
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status of a rejected request, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
