use std::fmt;

const STREAM_PREFIX: &str = "stream ";
const CLOSE: &str = "close";

/// Outbound command forms understood by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Command whose reply the client waits for.
    Execute(String),
    /// Command the client sends without waiting for a reply.
    Stream(String),
    /// Tells the server the connection is going away.
    Close,
}

impl Request {
    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Request::Execute(command) => command.into_bytes(),
            other => other.to_string().into_bytes(),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Execute(command) => f.write_str(command),
            Request::Stream(command) => write!(f, "{STREAM_PREFIX}{command}"),
            Request::Close => f.write_str(CLOSE),
        }
    }
}
