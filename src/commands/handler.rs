//! Command Parsing and Dispatch
//!
//! Turns a decoded token sequence into a [`Command`] and executes it
//! against the shared store, producing exactly one [`Reply`].
//!
//! ## Commands
//!
//! - `PING` - liveness check, replies `+PONG`
//! - `SET key value` - insert or overwrite, replies `+OK`
//! - `GET key` - replies the value as a bulk string, or the null bulk
//!   string for an absent key
//! - `BACKUP` - synchronously writes a snapshot; replies
//!   `+OK backup saved`, or an error describing the I/O failure
//!
//! Arity is strict for every command, PING included: a wrong argument
//! count is rejected with an error reply and never touches the store.

use crate::protocol::Reply;
use crate::snapshot::SnapshotManager;
use crate::storage::Store;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// A request, decoded from the ordered token sequence of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `PING`
    Ping,
    /// `SET key value`
    Set { key: Bytes, value: Bytes },
    /// `GET key`
    Get { key: Bytes },
    /// `BACKUP`
    Backup,
    /// Any command name this server does not implement
    Unknown(String),
}

/// Errors produced while building a [`Command`] from tokens.
///
/// These are recoverable protocol-level errors: they become error replies
/// and the session continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The frame decoded to zero tokens
    #[error("ERR empty command")]
    Empty,

    /// Wrong argument count for a recognized command
    #[error("ERR wrong number of arguments for '{command}' command")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
}

impl Command {
    /// Builds a command from the token sequence of one decoded frame.
    ///
    /// The first token is the command name (matched case-insensitively),
    /// the rest are its arguments. Unrecognized names become
    /// [`Command::Unknown`] so the dispatcher can reply with the name the
    /// client actually sent.
    pub fn from_tokens(tokens: &[Bytes]) -> Result<Command, CommandError> {
        let (name_token, args) = tokens.split_first().ok_or(CommandError::Empty)?;
        let name = String::from_utf8_lossy(name_token);

        match name.to_uppercase().as_str() {
            "PING" => {
                expect_arity("PING", 0, args)?;
                Ok(Command::Ping)
            }
            "SET" => {
                expect_arity("SET", 2, args)?;
                Ok(Command::Set {
                    key: args[0].clone(),
                    value: args[1].clone(),
                })
            }
            "GET" => {
                expect_arity("GET", 1, args)?;
                Ok(Command::Get {
                    key: args[0].clone(),
                })
            }
            "BACKUP" => {
                expect_arity("BACKUP", 0, args)?;
                Ok(Command::Backup)
            }
            _ => Ok(Command::Unknown(name.into_owned())),
        }
    }
}

fn expect_arity(
    command: &'static str,
    expected: usize,
    args: &[Bytes],
) -> Result<(), CommandError> {
    if args.len() != expected {
        return Err(CommandError::Arity {
            command,
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Executes commands against the shared store and snapshot manager.
///
/// Cloning is cheap (two `Arc`s); each session holds its own dispatcher
/// handle.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    /// The shared store
    store: Arc<Store>,
    /// The shared snapshot manager
    snapshots: Arc<SnapshotManager>,
}

impl CommandDispatcher {
    /// Creates a dispatcher over the given store and snapshot manager.
    pub fn new(store: Arc<Store>, snapshots: Arc<SnapshotManager>) -> Self {
        Self { store, snapshots }
    }

    /// Executes one decoded token sequence and returns the reply.
    ///
    /// Never panics and never drops a request: every token sequence,
    /// including empty and malformed ones, maps to exactly one reply.
    pub fn execute(&self, tokens: &[Bytes]) -> Reply {
        let command = match Command::from_tokens(tokens) {
            Ok(command) => command,
            Err(e) => return Reply::error(e.to_string()),
        };

        match command {
            Command::Ping => Reply::pong(),
            Command::Set { key, value } => self.cmd_set(key, value),
            Command::Get { key } => self.cmd_get(&key),
            Command::Backup => self.cmd_backup(),
            Command::Unknown(name) => {
                debug!(command = %name, "Unknown command");
                Reply::error(format!("ERR unknown command '{}'", name))
            }
        }
    }

    /// Runs the auto-backup check; the session calls this after every
    /// dispatched command.
    pub fn check_auto_backup(&self) {
        self.snapshots.check_auto_backup(&self.store);
    }

    fn cmd_set(&self, key: Bytes, value: Bytes) -> Reply {
        self.store.set(key, value);
        Reply::ok()
    }

    fn cmd_get(&self, key: &[u8]) -> Reply {
        match self.store.get(key) {
            Some(value) => Reply::bulk(value),
            None => Reply::null(),
        }
    }

    fn cmd_backup(&self) -> Reply {
        match self.snapshots.save(&self.store) {
            Ok(path) => {
                debug!(path = %path.display(), "Manual backup saved");
                Reply::simple("OK backup saved")
            }
            Err(e) => {
                warn!(error = %e, "Manual backup failed");
                Reply::error(format!("ERR backup failed: {}", e))
            }
        }
    }
}
