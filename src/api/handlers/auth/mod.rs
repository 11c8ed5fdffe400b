//! PIN authorization for the API.
//!
//! Protected routes are wrapped by [`authorizer::require_pin`], which reads
//! the raw `Authorization` header (no scheme, no encoding) on every request
//! and compares it with the configured [`Credential`](crate::credential::Credential).
//! Nothing is cached between requests.
//!
//! [`verify::verify_pin`] lets a client check a PIN before persisting it.
//!
//! There is no lockout, backoff or rate limiting after failed attempts, and
//! the comparison is not constant time.

pub mod authorizer;
pub mod types;
pub mod verify;

pub use authorizer::{authorize, require_pin, AuthFailure, UNAUTHORIZED_MESSAGE};
