use crate::cli::{
    actions::{
        client::{self, Command},
        server, Action,
    },
    commands::default_state_file,
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("missing subcommand"))?;

    if name == "server" {
        return server_args(sub);
    }

    let command = match name {
        "unlock" => Command::Unlock,
        "logout" => Command::Logout,
        "photos" => Command::Photos {
            search: string(sub, "search"),
        },
        "notes" => Command::Notes {
            search: string(sub, "search"),
        },
        "photo" => Command::Photo { id: id(sub)? },
        "note" => Command::Note { id: id(sub)? },
        "note-add" => Command::NoteAdd {
            title: string(sub, "title").context("missing required argument: --title")?,
            content: string(sub, "content").context("missing required argument: --content")?,
        },
        "note-edit" => Command::NoteEdit {
            id: id(sub)?,
            title: string(sub, "title"),
            content: string(sub, "content"),
        },
        "note-rm" => Command::NoteRm { id: id(sub)? },
        "photo-add" => Command::PhotoAdd {
            file: sub
                .get_one::<PathBuf>("file")
                .cloned()
                .context("missing required argument: FILE")?,
            caption: string(sub, "caption"),
        },
        "photo-rm" => Command::PhotoRm { id: id(sub)? },
        other => return Err(anyhow!("unknown subcommand: {other}")),
    };

    // `--pin` only exists on unlock; elsewhere the stored token is enough.
    let pin = if name == "unlock" {
        string(sub, "pin").map(SecretString::from)
    } else {
        None
    };

    Ok(Action::Client(client::Args {
        api_url: string(sub, "api-url").unwrap_or_else(|| "http://localhost:8080".to_string()),
        state_file: sub
            .get_one::<PathBuf>("state-file")
            .cloned()
            .unwrap_or_else(default_state_file),
        pin,
        command,
    }))
}

fn server_args(sub: &ArgMatches) -> Result<Action> {
    Ok(Action::Server(server::Args {
        port: sub.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: string(sub, "dsn").context("missing required argument: --dsn")?,
        pin: string(sub, "pin")
            .map(SecretString::from)
            .context("missing required argument: --pin")?,
        uploads_dir: sub
            .get_one::<PathBuf>("uploads-dir")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("uploads")),
    }))
}

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn id(matches: &ArgMatches) -> Result<i32> {
    matches
        .get_one::<i32>("id")
        .copied()
        .context("missing required argument: ID")
}
