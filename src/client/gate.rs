//! PIN pad state machine guarding the client.
//!
//! ```text
//! Locked --digit--> Unlocking --4th digit, valid--> Unlocked --logout--> Locked
//!                       |
//!                       +--4th digit, invalid--> Error --800ms--> Locked
//! ```
//!
//! Any keypress while in `Error` cancels the pending reset and starts a fresh
//! entry, so a late reset can never wipe digits typed after the rejection.

use super::{
    http::{AuthorizedClient, Dispatch, HttpClient},
    store::{StoreError, TokenStore, AUTH_FLAG_KEY, TOKEN_KEY},
    ClientError,
};
use crate::{
    api::handlers::auth::types::VerifyRequest,
    credential::{Credential, PIN_DIGITS},
};
use reqwest::{Method, StatusCode};
use secrecy::SecretString;
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// How long a rejected entry stays on screen before the pad resets.
pub const ERROR_RESET_DELAY: Duration = Duration::from_millis(800);

pub const INCORRECT_PIN_MESSAGE: &str = "Incorrect PIN, please try again.";
pub const LOGGED_OUT_MESSAGE: &str = "Logged out";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Unlocking,
    Unlocked,
    Error,
}

/// Outcome of a single keypress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keypress {
    /// Digit buffered; holds how many digits are entered so far.
    Pending(usize),
    Unlocked,
    /// Entry rejected; holds the notification to show.
    Rejected(&'static str),
    /// The gate is already open.
    Ignored,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("PIN keys are digits only, got {0:?}")]
    InvalidDigit(char),
    #[error("Failed to persist session: {0}")]
    Store(#[from] StoreError),
    #[error("PIN verification failed: {0}")]
    Verify(#[from] ClientError),
}

/// Decides whether a complete entry is the PIN.
pub trait PinValidator: Send + Sync {
    /// # Errors
    /// Returns an error if the decision could not be made
    fn validate(&self, candidate: &str) -> impl Future<Output = Result<bool, ClientError>> + Send;
}

impl PinValidator for Credential {
    async fn validate(&self, candidate: &str) -> Result<bool, ClientError> {
        Ok(self.is_valid(candidate))
    }
}

/// Asks the server's verify endpoint instead of holding the PIN locally.
#[derive(Clone, Debug)]
pub struct RemoteVerifier {
    client: HttpClient,
}

impl RemoteVerifier {
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl PinValidator for RemoteVerifier {
    async fn validate(&self, candidate: &str) -> Result<bool, ClientError> {
        let request = self
            .client
            .request(Method::POST, "/api/auth/verify")
            .json(&VerifyRequest {
                pin: candidate.to_string(),
            });

        let response = self.client.send(request).await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            status => Err(ClientError::Http {
                status,
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

pub struct AuthGate<S, V> {
    store: S,
    validator: V,
    bare: HttpClient,
    state: GateState,
    buffer: String,
    authorized: Option<AuthorizedClient>,
    reset_at: Option<Instant>,
    notice: Option<&'static str>,
}

impl<S: TokenStore, V: PinValidator> AuthGate<S, V> {
    /// Build the gate, reopening it straight away when a token was persisted.
    ///
    /// # Errors
    /// Returns an error if the persisted state cannot be read
    pub fn restore(store: S, validator: V, bare: HttpClient) -> Result<Self, GateError> {
        let token = store.get(TOKEN_KEY)?;

        let mut gate = Self {
            store,
            validator,
            bare,
            state: GateState::Locked,
            buffer: String::new(),
            authorized: None,
            reset_at: None,
            notice: None,
        };

        if let Some(token) = token {
            debug!("Restoring persisted session");
            gate.install(token);
        }

        Ok(gate)
    }

    #[must_use]
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Number of digits currently buffered.
    #[must_use]
    pub fn entered(&self) -> usize {
        self.buffer.len()
    }

    /// Notification to display, if any.
    #[must_use]
    pub fn notice(&self) -> Option<&'static str> {
        self.notice
    }

    /// When a rejected entry will be cleared.
    #[must_use]
    pub fn reset_deadline(&self) -> Option<Instant> {
        self.reset_at
    }

    /// The token-stamping client; `None` unless unlocked.
    #[must_use]
    pub fn client(&self) -> Option<&AuthorizedClient> {
        match self.state {
            GateState::Unlocked => self.authorized.as_ref(),
            _ => None,
        }
    }

    /// The client without any injected header.
    #[must_use]
    pub fn bare(&self) -> &HttpClient {
        &self.bare
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Feed one key of the PIN pad.
    ///
    /// # Errors
    /// Returns an error for non-digit keys, or if validating or persisting fails
    pub async fn press(&mut self, key: char) -> Result<Keypress, GateError> {
        if self.state == GateState::Unlocked {
            return Ok(Keypress::Ignored);
        }
        if !key.is_ascii_digit() {
            return Err(GateError::InvalidDigit(key));
        }

        self.dismiss_error();
        self.buffer.push(key);

        if self.buffer.len() < PIN_DIGITS {
            self.state = GateState::Unlocking;
            return Ok(Keypress::Pending(self.buffer.len()));
        }

        let accepted = match self.validator.validate(&self.buffer).await {
            Ok(accepted) => accepted,
            Err(err) => {
                self.buffer.clear();
                self.state = GateState::Locked;
                return Err(err.into());
            }
        };

        if accepted {
            let token = std::mem::take(&mut self.buffer);
            self.unlock(token)?;
            Ok(Keypress::Unlocked)
        } else {
            warn!("Rejected PIN entry");
            self.state = GateState::Error;
            self.notice = Some(INCORRECT_PIN_MESSAGE);
            self.reset_at = Some(Instant::now() + ERROR_RESET_DELAY);
            Ok(Keypress::Rejected(INCORRECT_PIN_MESSAGE))
        }
    }

    /// Remove the last digit.
    pub fn delete(&mut self) {
        match self.state {
            GateState::Unlocked => {}
            GateState::Error => self.dismiss_error(),
            GateState::Locked | GateState::Unlocking => {
                self.buffer.pop();
                self.state = if self.buffer.is_empty() {
                    GateState::Locked
                } else {
                    GateState::Unlocking
                };
            }
        }
    }

    /// Apply the pending reset if its deadline has passed. Returns true when
    /// the gate went back to `Locked`.
    pub fn poll_reset(&mut self, now: Instant) -> bool {
        match self.reset_at {
            Some(deadline) if self.state == GateState::Error && now >= deadline => {
                self.buffer.clear();
                self.reset_at = None;
                self.state = GateState::Locked;
                true
            }
            _ => false,
        }
    }

    /// Sleep until the pending reset fires and apply it.
    pub async fn wait_reset(&mut self) -> bool {
        match self.reset_at {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.poll_reset(deadline)
            }
            None => false,
        }
    }

    /// Forget the token and go back to a locked pad.
    ///
    /// # Errors
    /// Returns an error if the persisted state cannot be cleared
    pub fn logout(&mut self) -> Result<&'static str, GateError> {
        // the wrapper goes first so a failed removal never leaves it installed
        self.authorized = None;
        self.buffer.clear();
        self.reset_at = None;
        self.state = GateState::Locked;

        let cleared = self
            .store
            .remove(TOKEN_KEY)
            .and_then(|()| self.store.remove(AUTH_FLAG_KEY));
        if let Err(err) = cleared {
            warn!("Failed to clear persisted session: {err}");
            return Err(err.into());
        }

        self.notice = Some(LOGGED_OUT_MESSAGE);
        info!("Logged out");
        Ok(LOGGED_OUT_MESSAGE)
    }

    fn unlock(&mut self, token: String) -> Result<(), GateError> {
        if self.state == GateState::Unlocked && self.authorized.is_some() {
            return Ok(());
        }

        self.store.set(AUTH_FLAG_KEY, "true")?;
        self.store.set(TOKEN_KEY, &token)?;
        self.install(token);

        info!("Gate unlocked");
        Ok(())
    }

    fn install(&mut self, token: String) {
        if self.authorized.is_none() {
            self.authorized = Some(AuthorizedClient::new(
                self.bare.clone(),
                SecretString::from(token),
            ));
        }
        self.buffer.clear();
        self.reset_at = None;
        self.notice = None;
        self.state = GateState::Unlocked;
    }

    fn dismiss_error(&mut self) {
        self.notice = None;
        if self.state == GateState::Error {
            self.buffer.clear();
            self.reset_at = None;
            self.state = GateState::Locked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::MemoryTokenStore;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn gate(store: MemoryTokenStore) -> Result<AuthGate<MemoryTokenStore, Credential>> {
        Ok(AuthGate::restore(
            store,
            Credential::from("4079"),
            HttpClient::new("http://localhost:8080")?,
        )?)
    }

    async fn enter<S: TokenStore, V: PinValidator>(
        gate: &mut AuthGate<S, V>,
        pin: &str,
    ) -> Result<Vec<Keypress>> {
        let mut outcomes = Vec::new();
        for key in pin.chars() {
            outcomes.push(gate.press(key).await?);
        }
        Ok(outcomes)
    }

    /// Counts how often a complete entry is checked.
    #[derive(Default)]
    struct CountingValidator {
        calls: AtomicUsize,
    }

    impl PinValidator for CountingValidator {
        async fn validate(&self, candidate: &str) -> Result<bool, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(candidate == "4079")
        }
    }

    /// Memory store whose removal of one key always fails.
    struct StickyStore {
        inner: MemoryTokenStore,
        sticky: &'static str,
    }

    impl TokenStore for StickyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            if key == self.sticky {
                return Err(std::io::Error::other("read-only state file").into());
            }
            self.inner.remove(key)
        }
    }

    #[tokio::test]
    async fn starts_locked_without_token() -> Result<()> {
        let gate = gate(MemoryTokenStore::new())?;
        assert_eq!(gate.state(), GateState::Locked);
        assert!(gate.client().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn restores_unlocked_from_persisted_token() -> Result<()> {
        let store = MemoryTokenStore::new();
        store.set(TOKEN_KEY, "4079")?;

        let gate = gate(store)?;
        assert_eq!(gate.state(), GateState::Unlocked);
        assert!(gate.client().is_some());
        // restoring is not a new write
        assert_eq!(gate.store().writes(TOKEN_KEY), 1);
        Ok(())
    }

    #[tokio::test]
    async fn partial_entry_never_validates() -> Result<()> {
        let mut gate = gate(MemoryTokenStore::new())?;
        let outcomes = enter(&mut gate, "407").await?;
        assert_eq!(
            outcomes,
            vec![Keypress::Pending(1), Keypress::Pending(2), Keypress::Pending(3)]
        );
        assert_eq!(gate.state(), GateState::Unlocking);
        assert_eq!(gate.entered(), 3);
        assert_eq!(gate.store().writes(TOKEN_KEY), 0);
        Ok(())
    }

    #[tokio::test]
    async fn correct_pin_unlocks_and_persists_once() -> Result<()> {
        let mut gate = gate(MemoryTokenStore::new())?;
        let outcomes = enter(&mut gate, "4079").await?;

        assert_eq!(outcomes.last(), Some(&Keypress::Unlocked));
        assert_eq!(gate.state(), GateState::Unlocked);
        assert_eq!(gate.entered(), 0);
        assert_eq!(gate.store().get(TOKEN_KEY)?.as_deref(), Some("4079"));
        assert_eq!(gate.store().get(AUTH_FLAG_KEY)?.as_deref(), Some("true"));
        assert_eq!(gate.store().writes(TOKEN_KEY), 1);

        // unlocking again must neither write nor re-wrap
        gate.unlock("4079".to_string())?;
        assert_eq!(gate.store().writes(TOKEN_KEY), 1);
        assert_eq!(gate.press('1').await?, Keypress::Ignored);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_pin_clears_exactly_at_deadline() -> Result<()> {
        let mut gate = gate(MemoryTokenStore::new())?;
        let outcomes = enter(&mut gate, "1234").await?;

        assert_eq!(outcomes.last(), Some(&Keypress::Rejected(INCORRECT_PIN_MESSAGE)));
        assert_eq!(gate.state(), GateState::Error);
        assert_eq!(gate.notice(), Some(INCORRECT_PIN_MESSAGE));
        assert!(gate.client().is_none());
        assert_eq!(gate.store().writes(TOKEN_KEY), 0);

        let deadline = gate
            .reset_deadline()
            .ok_or_else(|| anyhow::anyhow!("no reset scheduled"))?;

        assert!(!gate.poll_reset(deadline - Duration::from_millis(1)));
        assert_eq!(gate.state(), GateState::Error);
        assert_eq!(gate.entered(), 4);

        assert!(gate.poll_reset(deadline));
        assert_eq!(gate.state(), GateState::Locked);
        assert_eq!(gate.entered(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn wait_reset_sleeps_the_full_delay() -> Result<()> {
        let mut gate = gate(MemoryTokenStore::new())?;
        enter(&mut gate, "0000").await?;

        let started = Instant::now();
        assert!(gate.wait_reset().await);
        assert_eq!(started.elapsed(), ERROR_RESET_DELAY);
        assert_eq!(gate.state(), GateState::Locked);
        Ok(())
    }

    #[tokio::test]
    async fn keypress_after_rejection_cancels_reset() -> Result<()> {
        let mut gate = gate(MemoryTokenStore::new())?;
        enter(&mut gate, "1234").await?;
        let deadline = gate
            .reset_deadline()
            .ok_or_else(|| anyhow::anyhow!("no reset scheduled"))?;

        assert_eq!(gate.press('4').await?, Keypress::Pending(1));
        assert_eq!(gate.notice(), None);
        assert_eq!(gate.reset_deadline(), None);

        // the stale deadline must not wipe the fresh digit
        assert!(!gate.poll_reset(deadline + Duration::from_millis(1)));
        assert_eq!(gate.entered(), 1);

        assert_eq!(enter(&mut gate, "079").await?.last(), Some(&Keypress::Unlocked));
        Ok(())
    }

    #[tokio::test]
    async fn delete_walks_back_to_locked() -> Result<()> {
        let mut gate = gate(MemoryTokenStore::new())?;
        enter(&mut gate, "40").await?;

        gate.delete();
        assert_eq!(gate.state(), GateState::Unlocking);
        assert_eq!(gate.entered(), 1);

        gate.delete();
        gate.delete();
        assert_eq!(gate.state(), GateState::Locked);
        assert_eq!(gate.entered(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn non_digit_is_rejected() -> Result<()> {
        let mut gate = gate(MemoryTokenStore::new())?;
        assert!(matches!(
            gate.press('a').await,
            Err(GateError::InvalidDigit('a'))
        ));
        assert_eq!(gate.entered(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_everything() -> Result<()> {
        let mut gate = gate(MemoryTokenStore::new())?;
        enter(&mut gate, "4079").await?;

        assert_eq!(gate.logout()?, LOGGED_OUT_MESSAGE);
        assert_eq!(gate.state(), GateState::Locked);
        assert!(gate.client().is_none());
        assert_eq!(gate.store().get(TOKEN_KEY)?, None);
        assert_eq!(gate.store().get(AUTH_FLAG_KEY)?, None);

        // the cycle can start over
        assert_eq!(enter(&mut gate, "4079").await?.last(), Some(&Keypress::Unlocked));
        Ok(())
    }

    #[tokio::test]
    async fn validates_once_per_complete_entry() -> Result<()> {
        let mut gate = AuthGate::restore(
            MemoryTokenStore::new(),
            CountingValidator::default(),
            HttpClient::new("http://localhost:8080")?,
        )?;

        enter(&mut gate, "123").await?;
        assert_eq!(gate.validator.calls.load(Ordering::SeqCst), 0);

        enter(&mut gate, "4").await?;
        assert_eq!(gate.validator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.state(), GateState::Error);

        enter(&mut gate, "4079").await?;
        assert_eq!(gate.validator.calls.load(Ordering::SeqCst), 2);
        assert_eq!(gate.state(), GateState::Unlocked);

        // keys after unlocking are ignored, not validated
        enter(&mut gate, "1111").await?;
        assert_eq!(gate.validator.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn failed_logout_still_drops_the_client() -> Result<()> {
        let store = StickyStore {
            inner: MemoryTokenStore::new(),
            sticky: AUTH_FLAG_KEY,
        };
        let mut gate = AuthGate::restore(
            store,
            Credential::from("4079"),
            HttpClient::new("http://localhost:8080")?,
        )?;
        enter(&mut gate, "4079").await?;
        assert!(gate.client().is_some());

        assert!(matches!(gate.logout(), Err(GateError::Store(_))));
        assert_eq!(gate.state(), GateState::Locked);
        assert!(gate.client().is_none());
        assert!(gate.authorized.is_none());
        assert_eq!(gate.notice(), None);
        assert_eq!(gate.store().get(TOKEN_KEY)?, None);
        Ok(())
    }
}
