//! Private photos and notes shared behind a single PIN.
//!
//! - [`api`]: the HTTP server. Every photo and note route checks the
//!   `Authorization` header against the configured PIN.
//! - [`client`]: the PIN pad gate and the HTTP client it unlocks.
//! - [`cli`]: argument parsing, logging setup and the actions behind each
//!   subcommand.

pub mod api;
pub mod cli;
pub mod client;
pub mod credential;
