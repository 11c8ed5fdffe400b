//! Outbound HTTP with and without the PIN header.
//!
//! [`HttpClient`] never touches `Authorization`. [`AuthorizedClient`] wraps
//! one and overwrites that header on every request it sends; it can only be
//! built from a bare client, so wrappers never nest.

use super::ClientError;
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Client, Method, RequestBuilder, Response,
};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, future::Future, time::Duration};
use url::Url;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Default request timeout applied to every call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request dispatch shared by the bare and the authorized client.
pub trait Dispatch: Send + Sync {
    /// Start a request against the API base URL.
    fn request(&self, method: Method, path: &str) -> RequestBuilder;

    /// Send a request and return the response unmodified.
    fn send(
        &self,
        request: RequestBuilder,
    ) -> impl Future<Output = Result<Response, ClientError>> + Send;
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Url::parse(base_url)?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Dispatch for HttpClient {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, build_url_with_base(&self.base_url, path))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        Ok(request.send().await?)
    }
}

/// Bare client plus the token it injects.
///
/// Not `Clone`: the gate owns the only instance, so dropping it on logout
/// stops the token from going out.
pub struct AuthorizedClient {
    inner: HttpClient,
    token: SecretString,
}

impl AuthorizedClient {
    #[must_use]
    pub fn new(inner: HttpClient, token: SecretString) -> Self {
        Self { inner, token }
    }

    /// The wrapped client, untouched by the wrapper.
    #[must_use]
    pub fn inner(&self) -> &HttpClient {
        &self.inner
    }
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthorizedClient")
            .field("base_url", &self.inner.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Dispatch for AuthorizedClient {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner.request(method, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let mut request = request.build()?;

        let mut value = HeaderValue::from_str(self.token.expose_secret())
            .map_err(|_| ClientError::InvalidToken)?;
        value.set_sensitive(true);

        // insert replaces whatever the caller put there
        request.headers_mut().insert(AUTHORIZATION, value);

        Ok(self.inner.client.execute(request).await?)
    }
}

/// Builds a URL from an explicit base URL and the provided path.
#[must_use]
pub fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn build_url_joins_with_single_slash() {
        assert_eq!(
            build_url_with_base("http://localhost:8080/", "/api/notes"),
            "http://localhost:8080/api/notes"
        );
        assert_eq!(
            build_url_with_base("http://localhost:8080", "api/notes"),
            "http://localhost:8080/api/notes"
        );
        assert_eq!(build_url_with_base("  ", "/api/notes"), "/api/notes");
    }

    #[test]
    fn new_rejects_invalid_base_url() {
        assert!(matches!(
            HttpClient::new("not a url"),
            Err(ClientError::Url(_))
        ));
    }

    #[test]
    fn bare_request_has_no_authorization() -> Result<()> {
        let client = HttpClient::new("http://localhost:8080")?;
        let request = client.request(Method::GET, "/api/notes").build()?;
        assert!(request.headers().get(AUTHORIZATION).is_none());
        assert_eq!(request.url().as_str(), "http://localhost:8080/api/notes");
        Ok(())
    }

    #[test]
    fn authorized_client_debug_hides_token() -> Result<()> {
        let client = AuthorizedClient::new(
            HttpClient::new("http://localhost:8080")?,
            SecretString::from("4079"),
        );
        let debug = format!("{client:?}");
        assert!(!debug.contains("4079"));
        assert!(debug.contains("REDACTED"));
        Ok(())
    }
}
