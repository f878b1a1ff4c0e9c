pub mod cli;
pub mod command;
pub mod error;
pub mod protocol;

pub use cli::prompt;
pub use command::{Command, CommandError};
pub use error::ClientError;
pub use protocol::Client;
