use crate::{
    api::storage::{NewNote, Note, NotePatch, Photo},
    client::{
        http::build_url_with_base, AuthGate, Dispatch, FileTokenStore, GateError, GateState,
        HttpClient, Keypress, MemoriesClient, PinValidator, RemoteVerifier, TokenStore,
    },
    credential::{Credential, PIN_DIGITS},
};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Local, Utc};
use secrecy::SecretString;
use std::path::PathBuf;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::sleep_until,
};
use tracing::debug;

#[derive(Debug)]
pub enum Command {
    Unlock,
    Logout,
    Photos {
        search: Option<String>,
    },
    Notes {
        search: Option<String>,
    },
    Photo {
        id: i32,
    },
    Note {
        id: i32,
    },
    NoteAdd {
        title: String,
        content: String,
    },
    NoteEdit {
        id: i32,
        title: Option<String>,
        content: Option<String>,
    },
    NoteRm {
        id: i32,
    },
    PhotoAdd {
        file: PathBuf,
        caption: Option<String>,
    },
    PhotoRm {
        id: i32,
    },
}

#[derive(Debug)]
pub struct Args {
    pub api_url: String,
    pub state_file: PathBuf,
    /// Validate locally against this PIN instead of calling the server.
    pub pin: Option<SecretString>,
    pub command: Command,
}

/// Execute a client command behind the gate.
/// # Errors
/// Returns an error if the gate is locked or the server call fails.
pub async fn execute(args: Args) -> Result<()> {
    let bare = HttpClient::new(&args.api_url)?;
    let store = FileTokenStore::new(&args.state_file);
    debug!("Client state file: {}", args.state_file.display());

    match args.pin {
        Some(pin) => {
            let gate = AuthGate::restore(store, Credential::new(pin), bare)?;
            run(gate, args.command).await
        }
        None => {
            let verifier = RemoteVerifier::new(bare.clone());
            let gate = AuthGate::restore(store, verifier, bare)?;
            run(gate, args.command).await
        }
    }
}

async fn run<S: TokenStore, V: PinValidator>(
    mut gate: AuthGate<S, V>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Unlock => unlock(&mut gate).await,
        Command::Logout => {
            println!("{}", gate.logout()?);
            Ok(())
        }
        command => {
            let Some(client) = gate.client() else {
                bail!("Locked: run `keepsake unlock` first");
            };
            let api_url = gate.bare().base_url().to_string();
            request(&MemoriesClient::new(client), &api_url, command).await
        }
    }
}

/// Read PIN keys from stdin until the gate opens.
///
/// Digits are keys, `-` deletes the last one. A rejected entry is shown
/// until the reset delay passes or another key arrives.
async fn unlock<S: TokenStore, V: PinValidator>(gate: &mut AuthGate<S, V>) -> Result<()> {
    if gate.state() == GateState::Unlocked {
        println!("Already unlocked");
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(gate);

    loop {
        let line = match gate.reset_deadline() {
            Some(deadline) => tokio::select! {
                line = lines.next_line() => line?,
                () = sleep_until(deadline) => {
                    gate.poll_reset(deadline);
                    prompt(gate);
                    continue;
                }
            },
            None => lines.next_line().await?,
        };

        let Some(line) = line else {
            return Err(anyhow!("Input closed before the PIN was accepted"));
        };

        if feed(gate, &line).await? {
            println!("Unlocked");
            return Ok(());
        }

        prompt(gate);
    }
}

/// Press every key of one input line. Keys after a rejection start a new
/// entry. Returns true once the gate is open.
async fn feed<S: TokenStore, V: PinValidator>(
    gate: &mut AuthGate<S, V>,
    line: &str,
) -> Result<bool> {
    for key in line.trim().chars() {
        if key == '-' {
            gate.delete();
            continue;
        }

        match gate.press(key).await {
            Ok(Keypress::Unlocked) => return Ok(true),
            Ok(Keypress::Rejected(notice)) => eprintln!("{notice}"),
            Ok(Keypress::Pending(_) | Keypress::Ignored) => {}
            Err(GateError::InvalidDigit(key)) => debug!("Ignoring key {key:?}"),
            Err(err) => return Err(err.into()),
        }
    }

    Ok(gate.state() == GateState::Unlocked)
}

fn prompt<S: TokenStore, V: PinValidator>(gate: &AuthGate<S, V>) {
    let entered = gate.entered().min(PIN_DIGITS);
    println!(
        "PIN [{}{}]",
        "*".repeat(entered),
        "_".repeat(PIN_DIGITS - entered)
    );
}

async fn request<D: Dispatch>(
    client: &MemoriesClient<'_, D>,
    api_url: &str,
    command: Command,
) -> Result<()> {
    match command {
        Command::Photos { search } => {
            for photo in client.photos(search.as_deref()).await? {
                println!("{}", photo_line(&photo, api_url));
            }
        }
        Command::Notes { search } => {
            for note in client.notes(search.as_deref()).await? {
                println!("{}", note_line(&note));
            }
        }
        Command::Photo { id } => {
            println!("{}", photo_line(&client.photo(id).await?, api_url));
        }
        Command::Note { id } => {
            println!("{}", note_line(&client.note(id).await?));
        }
        Command::NoteAdd { title, content } => {
            let note = client.add_note(&NewNote { title, content }).await?;
            println!("Note added\n{}", note_line(&note));
        }
        Command::NoteEdit { id, title, content } => {
            let note = client.edit_note(id, &NotePatch { title, content }).await?;
            println!("Note updated\n{}", note_line(&note));
        }
        Command::NoteRm { id } => {
            client.delete_note(id).await?;
            println!("Note deleted");
        }
        Command::PhotoAdd { file, caption } => {
            let photo = client.upload_photo(&file, caption.as_deref()).await?;
            println!("Photo uploaded\n{}", photo_line(&photo, api_url));
        }
        Command::PhotoRm { id } => {
            client.delete_photo(id).await?;
            println!("Photo deleted");
        }
        Command::Unlock | Command::Logout => {}
    }

    Ok(())
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string()
}

fn photo_line(photo: &Photo, api_url: &str) -> String {
    format!(
        "#{} {} {} {}",
        photo.id,
        format_date(&photo.date),
        photo.caption.as_deref().unwrap_or("(no caption)"),
        build_url_with_base(api_url, &format!("/api/uploads/{}", photo.filename))
    )
}

fn note_line(note: &Note) -> String {
    format!(
        "#{} {} {}\n    {}",
        note.id,
        format_date(&note.date),
        note.title,
        note.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryTokenStore;
    use chrono::TimeZone;

    #[test]
    fn photo_line_links_upload() {
        let photo = Photo {
            id: 7,
            filename: "1700000000000-42.jpg".to_string(),
            caption: None,
            date: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default(),
        };
        let line = photo_line(&photo, "http://localhost:8080/");
        assert!(line.starts_with("#7 "));
        assert!(line.contains("(no caption)"));
        assert!(line.ends_with("http://localhost:8080/api/uploads/1700000000000-42.jpg"));
    }

    #[tokio::test]
    async fn locked_gate_refuses_requests() -> Result<()> {
        let gate = AuthGate::restore(
            MemoryTokenStore::new(),
            Credential::from("4079"),
            HttpClient::new("http://127.0.0.1:9")?,
        )?;

        let err = run(gate, Command::Notes { search: None })
            .await
            .err()
            .map(|err| err.to_string());
        assert_eq!(err.as_deref(), Some("Locked: run `keepsake unlock` first"));
        Ok(())
    }

    #[tokio::test]
    async fn keys_after_a_rejection_start_a_new_entry() -> Result<()> {
        let mut gate = AuthGate::restore(
            MemoryTokenStore::new(),
            Credential::from("4079"),
            HttpClient::new("http://127.0.0.1:9")?,
        )?;

        assert!(feed(&mut gate, "12344079").await?);
        assert_eq!(gate.store().get("pin")?.as_deref(), Some("4079"));

        gate.logout()?;
        assert!(!feed(&mut gate, "1234 40").await?);
        assert_eq!(gate.state(), GateState::Unlocking);
        assert_eq!(gate.entered(), 2);
        Ok(())
    }
}
