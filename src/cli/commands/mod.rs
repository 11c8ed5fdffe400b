use crate::credential::is_pin_format;
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};
use std::path::PathBuf;

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn validator_pin() -> ValueParser {
    ValueParser::from(move |pin: &str| -> std::result::Result<String, String> {
        if is_pin_format(pin) {
            Ok(pin.to_string())
        } else {
            Err("PIN must be exactly 4 digits".to_string())
        }
    })
}

/// `<config dir>/keepsake/session.json`, or a relative file as a last resort.
#[must_use]
pub fn default_state_file() -> PathBuf {
    dirs::config_dir().map_or_else(
        || PathBuf::from(".keepsake-session.json"),
        |dir| dir.join(env!("CARGO_PKG_NAME")).join("session.json"),
    )
}

fn pin_arg() -> Arg {
    Arg::new("pin")
        .long("pin")
        .help("Shared 4-digit PIN")
        .env("KEEPSAKE_PIN")
        .hide_env_values(true)
        .value_parser(validator_pin())
}

fn search_arg() -> Arg {
    Arg::new("search")
        .short('s')
        .long("search")
        .help("Case-insensitive text to look for")
}

fn id_arg(help: &'static str) -> Arg {
    Arg::new("id")
        .help(help)
        .required(true)
        .value_parser(clap::value_parser!(i32))
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("keepsake")
        .about("Private photos and notes behind a shared PIN")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("KEEPSAKE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Server base URL used by the client commands")
                .default_value("http://localhost:8080")
                .env("KEEPSAKE_API_URL")
                .global(true),
        )
        .arg(
            Arg::new("state-file")
                .long("state-file")
                .help("Where the client keeps its session")
                .env("KEEPSAKE_STATE_FILE")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand(
            Command::new("server")
                .about("Run the HTTP API")
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .help("Port to listen on")
                        .default_value("8080")
                        .env("KEEPSAKE_PORT")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    Arg::new("dsn")
                        .short('d')
                        .long("dsn")
                        .help("Database connection string")
                        .env("KEEPSAKE_DSN")
                        .required(true),
                )
                .arg(pin_arg().required(true))
                .arg(
                    Arg::new("uploads-dir")
                        .long("uploads-dir")
                        .help("Directory holding uploaded photos")
                        .default_value("uploads")
                        .env("KEEPSAKE_UPLOADS_DIR")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("unlock")
                .about("Enter the PIN and keep the session")
                .arg(pin_arg().help(
                    "Check entries against this PIN locally instead of asking the server",
                )),
        )
        .subcommand(Command::new("logout").about("Forget the stored session"))
        .subcommand(
            Command::new("photos")
                .about("List photos, newest first")
                .arg(search_arg()),
        )
        .subcommand(
            Command::new("notes")
                .about("List notes, newest first")
                .arg(search_arg()),
        )
        .subcommand(
            Command::new("photo")
                .about("Show one photo")
                .arg(id_arg("Photo id")),
        )
        .subcommand(
            Command::new("note")
                .about("Show one note")
                .arg(id_arg("Note id")),
        )
        .subcommand(
            Command::new("note-add")
                .about("Create a note")
                .arg(Arg::new("title").long("title").required(true))
                .arg(Arg::new("content").long("content").required(true)),
        )
        .subcommand(
            Command::new("note-edit")
                .about("Change the title and/or content of a note")
                .arg(id_arg("Note id"))
                .arg(Arg::new("title").long("title"))
                .arg(Arg::new("content").long("content")),
        )
        .subcommand(
            Command::new("note-rm")
                .about("Delete a note")
                .arg(id_arg("Note id")),
        )
        .subcommand(
            Command::new("photo-add")
                .about("Upload an image")
                .arg(
                    Arg::new("file")
                        .help("Image file (jpeg, jpg, png, gif, heic)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(Arg::new("caption").long("caption")),
        )
        .subcommand(
            Command::new("photo-rm")
                .about("Delete a photo and its file")
                .arg(id_arg("Photo id")),
        )
}
