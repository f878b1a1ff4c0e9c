//! Client-server communication protocol.
//!
//! This module implements the client side of the pubsubsql protocol: framing of
//! messages over a TCP stream, the JSON reply model and the session that correlates
//! replies, published messages and multi-batch result sets with the requests that
//! caused them.
//!
//! # Overview
//!
//! Commands are plain UTF-8 text. Every command sent by the client is tagged with a
//! request id taken from a monotonically increasing counter, and the server tags its
//! reply with the same id. The server may also push messages to subscribed clients at
//! any time; those carry request id `0`.
//!
//! A reply with many rows is split into batches. Each batch is a separate frame with
//! the request id of the command and describes which rows of the result set it holds.
//!
//! # Key Components
//!
//! - [`Client`]: The session; connect, execute, stream, cursor over rows, wait for
//!   published messages.
//! - [`Transport`]: Abstraction over the framed byte stream, implemented for TCP by
//!   [`NetTransport`].
//! - [`Response`]: Decoded JSON reply.
//!
//! # Binary Format
//!
//! - Each message begins with an 8 byte header: payload size then request id, both
//!   big-endian `u32`.
//! - The payload follows; commands are raw text, replies are JSON objects.
//!
//! # See Also
//!
//! - [`cli`](crate::cli): Interactive front end driving a [`Client`].
mod client;
mod cursor;
mod request;
mod response;
mod transport;

pub use client::Client;
pub use cursor::{Cursor, Step};
pub use request::Request;
pub use response::{ColumnIndex, Response, STATUS_OK};
pub use transport::{Frame, HEADER_SIZE, NetTransport, ProtocolTransport, Transport, TransportError};
