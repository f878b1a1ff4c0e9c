//! Commands accepted by the interactive client.
//!
//! A line typed at the prompt is either a dot-command handled by the client itself or
//! a pubsubsql command sent to the server as is.
//!
//! # Overview
//! The [`Command`] enum represents:
//!
//! - `Exit`: Disconnect and quit.
//! - `Execute(String)`: Send a command and print its reply.
//! - `Stream(String)`: Send a command without waiting for a reply.
//! - `Wait(Option<u64>)`: Wait once for a published message.
//! - `Listen`: Print published messages until interrupted.
//!
//! # Example
//! ```rust
//! use pubsubsql::Command;
//!
//! let cmd = Command::try_from(".wait 500").unwrap();
//! assert_eq!(cmd, Command::Wait(Some(500)));
//! ```
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("failed to read input: {0}")]
    Input(String),

    #[error("no command provided")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Execute(String),
    Stream(String),
    /// Wait for a published message, optionally overriding the default timeout in
    /// milliseconds.
    Wait(Option<u64>),
    Listen,
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let line = value.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(head, rest)| (head, rest.trim()));

        match head {
            "" => Err(CommandError::Empty),
            ".exit" => Ok(Command::Exit),
            ".listen" => Ok(Command::Listen),
            ".stream" if rest.is_empty() => Err(CommandError::InvalidCommandArguments {
                command: head.to_string(),
                reason: "requires a command to stream. Example: .stream insert into stocks (ticker) values (IBM)"
                    .to_string(),
            }),
            ".stream" => Ok(Command::Stream(rest.to_string())),
            ".wait" if rest.is_empty() => Ok(Command::Wait(None)),
            ".wait" => {
                let timeout =
                    rest.parse::<u64>()
                        .map_err(|_| CommandError::InvalidCommandArguments {
                            command: head.to_string(),
                            reason: "timeout should be a non-negative number of milliseconds."
                                .to_string(),
                        })?;
                Ok(Command::Wait(Some(timeout)))
            }
            s if s.starts_with('.') => Err(CommandError::UnrecognizedCommand(s.to_string())),
            _ => Ok(Command::Execute(line.to_string())),
        }
    }
}
