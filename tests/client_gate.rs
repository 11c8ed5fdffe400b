//! End-to-end checks of the PIN gate against a live server.
//!
//! The router runs on an ephemeral port with in-memory storage. The client
//! side goes through the real `reqwest` stack, so these tests see exactly
//! what goes over the wire.

use anyhow::{Context, Result};
use keepsake::{
    api::{self, storage::MemStorage, uploads::UploadStore},
    client::{
        gate::INCORRECT_PIN_MESSAGE, AuthGate, Dispatch, FileTokenStore, GateState, HttpClient,
        Keypress, MemoriesClient, MemoryTokenStore, PinValidator, RemoteVerifier, TokenStore,
    },
    credential::Credential,
};
use reqwest::{header::AUTHORIZATION, Method, StatusCode};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::{net::TcpListener, task::JoinHandle};

const PIN: &str = "4079";

struct TestServer {
    url: String,
    _uploads: TempDir,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn spawn_server() -> Result<TestServer> {
    let uploads = tempfile::tempdir()?;
    let store = UploadStore::open(uploads.path()).await?;
    let app = api::router(
        Arc::new(Credential::from(PIN)),
        Arc::new(MemStorage::new()),
        Arc::new(store),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });

    Ok(TestServer {
        url: format!("http://{addr}"),
        _uploads: uploads,
        handle,
    })
}

async fn enter<S: TokenStore, V: PinValidator>(
    gate: &mut AuthGate<S, V>,
    pin: &str,
) -> Result<Keypress> {
    let mut last = Keypress::Ignored;
    for key in pin.chars() {
        last = gate.press(key).await?;
    }
    Ok(last)
}

#[tokio::test]
async fn unlocked_client_reaches_protected_routes() -> Result<()> {
    let server = spawn_server().await?;
    let mut gate = AuthGate::restore(
        MemoryTokenStore::new(),
        Credential::from(PIN),
        HttpClient::new(&server.url)?,
    )?;

    assert_eq!(enter(&mut gate, PIN).await?, Keypress::Unlocked);
    let client = gate.client().context("gate should be unlocked")?;
    let memories = MemoriesClient::new(client);

    let note = memories
        .add_note(&keepsake::api::storage::NewNote {
            title: "First date".to_string(),
            content: "Pizza by the river".to_string(),
        })
        .await?;
    assert_eq!(memories.note(note.id).await?, note);

    let notes = memories.notes(Some("first")).await?;
    assert_eq!(notes, vec![note]);

    let missing = memories
        .photo(999)
        .await
        .err()
        .context("unknown photo must be an error")?;
    assert_eq!(missing.status(), Some(StatusCode::NOT_FOUND));
    Ok(())
}

#[tokio::test]
async fn authorized_client_overwrites_caller_header() -> Result<()> {
    let server = spawn_server().await?;
    let mut gate = AuthGate::restore(
        MemoryTokenStore::new(),
        Credential::from(PIN),
        HttpClient::new(&server.url)?,
    )?;
    enter(&mut gate, PIN).await?;
    let client = gate.client().context("gate should be unlocked")?;

    let request = client
        .request(Method::GET, "/api/photos")
        .header(AUTHORIZATION, "0000");
    let response = client.send(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn logout_restores_bare_client() -> Result<()> {
    let server = spawn_server().await?;
    let mut gate = AuthGate::restore(
        MemoryTokenStore::new(),
        Credential::from(PIN),
        HttpClient::new(&server.url)?,
    )?;
    enter(&mut gate, PIN).await?;
    gate.logout()?;

    assert!(gate.client().is_none());

    let bare = gate.bare();
    let response = bare.send(bare.request(Method::GET, "/api/notes")).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(
        body,
        serde_json::json!({ "message": "Unauthorized: Invalid PIN" })
    );

    let err = MemoriesClient::new(bare)
        .notes(None)
        .await
        .err()
        .context("bare client must be rejected")?;
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    Ok(())
}

#[tokio::test]
async fn remote_verifier_uses_verify_endpoint() -> Result<()> {
    let server = spawn_server().await?;
    let bare = HttpClient::new(&server.url)?;
    let mut gate = AuthGate::restore(
        MemoryTokenStore::new(),
        RemoteVerifier::new(bare.clone()),
        bare,
    )?;

    assert_eq!(
        enter(&mut gate, "1234").await?,
        Keypress::Rejected(INCORRECT_PIN_MESSAGE)
    );
    assert_eq!(gate.state(), GateState::Error);
    assert!(gate.client().is_none());
    assert_eq!(gate.store().writes("pin"), 0);

    // next key dismisses the rejection and starts over
    assert_eq!(enter(&mut gate, PIN).await?, Keypress::Unlocked);
    assert_eq!(gate.store().get("pin")?.as_deref(), Some(PIN));
    Ok(())
}

#[tokio::test]
async fn session_survives_restart() -> Result<()> {
    let server = spawn_server().await?;
    let state = tempfile::tempdir()?;
    let path = state.path().join("session.json");

    {
        let mut gate = AuthGate::restore(
            FileTokenStore::new(&path),
            Credential::from(PIN),
            HttpClient::new(&server.url)?,
        )?;
        enter(&mut gate, PIN).await?;
    }

    let gate = AuthGate::restore(
        FileTokenStore::new(&path),
        Credential::from(PIN),
        HttpClient::new(&server.url)?,
    )?;
    assert_eq!(gate.state(), GateState::Unlocked);

    let client = gate.client().context("restored gate should be unlocked")?;
    assert!(MemoriesClient::new(client).photos(None).await?.is_empty());
    Ok(())
}
