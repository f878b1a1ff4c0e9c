//! Client session.
//!
//! [`Client`] owns one [`Transport`] and runs the request/response protocol over it:
//!
//! - every outbound command gets the next request id; id `0` is never used since the
//!   server tags published messages with it,
//! - replies are matched to the last request by id, published messages seen while
//!   waiting are queued in a backlog and stale frames of abandoned result sets are
//!   dropped,
//! - result sets spanning several frames are walked with [`Client::next_row`].
//!
//! Any transport failure drops the connection and resets the session before the
//! error reaches the caller, so a new [`Client::connect`] is always safe afterwards.
use std::{
    cmp::Ordering,
    collections::VecDeque,
    mem,
    time::{Duration, Instant},
};

use log::{debug, info, trace, warn};

use crate::ClientError;

use super::{
    ColumnIndex, Cursor, Frame, NetTransport, Request, Response, Transport, TransportError,
    cursor::Step,
};

pub struct Client<T: Transport = NetTransport> {
    transport: T,
    request_id: u32,
    response: Response,
    columns: ColumnIndex,
    cursor: Cursor,
    backlog: VecDeque<Vec<u8>>,
    raw_json: String,
}

impl Client<NetTransport> {
    pub fn new() -> Self {
        Self::with_transport(NetTransport::new())
    }
}

impl Default for Client<NetTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            request_id: 1,
            response: Response::default(),
            columns: ColumnIndex::default(),
            cursor: Cursor::new(),
            backlog: VecDeque::new(),
            raw_json: String::new(),
        }
    }

    /// Connects to the server at `address`, given as `host:port`.
    ///
    /// The address is validated before anything else happens. An existing
    /// connection is closed before the new one is opened.
    pub fn connect(&mut self, address: &str) -> Result<(), ClientError> {
        let (host, port) = parse_address(address)?;
        self.disconnect();

        if let Err(source) = self.transport.open(host, port) {
            self.transport.close();
            return Err(ClientError::Connection {
                address: address.to_string(),
                source,
            });
        }
        info!("connected to {address}");
        Ok(())
    }

    /// Closes the connection, if any, and resets the session.
    ///
    /// The server is notified with a `close` command so it can release
    /// subscriptions; failing to deliver it is ignored.
    pub fn disconnect(&mut self) {
        if self.is_connected() {
            if let Err(e) = self.write(Request::Close) {
                debug!("close notification not delivered: {e}");
            }
            info!("disconnected");
        }
        self.backlog.clear();
        self.reset();
        self.transport.close();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_open()
    }

    /// Sends `command` and blocks until the server replies to it.
    pub fn execute(&mut self, command: &str) -> Result<(), ClientError> {
        self.reset();
        self.write(Request::Execute(command.to_string()))?;

        loop {
            let frame = self.read(None)?.ok_or(ClientError::ReadTimeout)?;
            if frame.is_published() {
                trace!("queued published message while awaiting {}", self.request_id);
                self.backlog.push_back(frame.payload);
                continue;
            }

            match frame.request_id.cmp(&self.request_id) {
                Ordering::Equal => return self.accept(&frame.payload),
                Ordering::Less => {
                    debug!("discarded stale frame for request {}", frame.request_id)
                }
                Ordering::Greater => return Err(invalid_request_id(&frame, self.request_id)),
            }
        }
    }

    /// Sends `command` as a stream request without waiting for a reply.
    pub fn stream(&mut self, command: &str) -> Result<(), ClientError> {
        self.reset();
        self.write(Request::Stream(command.to_string()))
    }

    /// Moves to the next row of the current result set.
    ///
    /// Returns `false` once every row has been visited. When the current batch is
    /// exhausted and the server announced more rows, the next batch is read from
    /// the connection, blocking until it arrives.
    pub fn next_row(&mut self) -> Result<bool, ClientError> {
        loop {
            match self.cursor.advance(&self.response) {
                Step::Row => return Ok(true),
                Step::Done => return Ok(false),
                Step::FetchNext => self.fetch_batch()?,
            }
        }
    }

    /// Value of column `name` in the current row, or `""` when there is none.
    pub fn value_by_name(&self, name: &str) -> &str {
        self.columns
            .ordinal(name)
            .map_or("", |ordinal| self.value_by_ordinal(ordinal))
    }

    /// Value of the zero-based column `ordinal` in the current row, or `""` when
    /// there is none.
    pub fn value_by_ordinal(&self, ordinal: usize) -> &str {
        let Some(row) = self.cursor.position() else {
            return "";
        };
        if ordinal >= self.columns.len() || !self.response.has_batch() {
            return "";
        }
        self.response.value(row, ordinal).unwrap_or("")
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    /// Waits up to `timeout` for a message published by the server.
    ///
    /// Messages queued while waiting for other replies are returned first, without
    /// touching the connection. Frames left over from abandoned result sets are
    /// discarded and count against the same `timeout`. The message becomes the
    /// current response, so its rows are read with [`Client::next_row`].
    pub fn wait_for_pubsub(&mut self, timeout: Duration) -> Result<bool, ClientError> {
        if timeout.is_zero() {
            return Ok(false);
        }
        self.reset();

        if let Some(payload) = self.backlog.pop_front() {
            self.accept(&payload)?;
            return Ok(true);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            let Some(frame) = self.read(Some(remaining))? else {
                return Ok(false);
            };
            if frame.is_published() {
                self.accept(&frame.payload)?;
                return Ok(true);
            }
            debug!(
                "discarded frame of abandoned request {}",
                frame.request_id
            );
        }
    }

    pub fn action(&self) -> &str {
        &self.response.action
    }

    pub fn pubsub_id(&self) -> &str {
        &self.response.pubsub_id
    }

    /// Total number of rows in the current result set, across all batches.
    pub fn row_count(&self) -> u64 {
        self.response.row_count
    }

    /// Payload text of the current response.
    pub fn raw_json(&self) -> &str {
        &self.raw_json
    }

    fn fetch_batch(&mut self) -> Result<(), ClientError> {
        let columns = mem::take(&mut self.columns);
        self.response = Response::default();
        self.raw_json.clear();
        self.cursor.rewind();

        let frame = loop {
            let frame = self.read(None)?.ok_or(ClientError::ReadTimeout)?;
            if frame.is_published() {
                trace!("queued published message while fetching a batch");
                self.backlog.push_back(frame.payload);
                continue;
            }
            if frame.request_id != self.request_id {
                return Err(invalid_request_id(&frame, self.request_id));
            }
            break frame;
        };

        self.load(&frame.payload)?;
        self.columns = if self.response.columns.is_empty() {
            columns
        } else {
            ColumnIndex::new(&self.response.columns)
        };
        debug!(
            "fetched rows {}..={} of {}",
            self.response.from_row, self.response.to_row, self.response.row_count
        );
        Ok(())
    }

    /// Loads `payload` as the current response and indexes its columns.
    fn accept(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        self.load(payload)?;
        self.columns = ColumnIndex::new(&self.response.columns);
        debug!(
            "accepted '{}' reply with {} rows",
            self.response.action, self.response.row_count
        );
        Ok(())
    }

    fn load(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        let response = Response::parse(payload)?;
        self.raw_json = String::from_utf8_lossy(payload).into_owned();
        self.response = response;

        if self.response.is_ok() {
            Ok(())
        } else {
            Err(ClientError::Server(self.response.message.clone()))
        }
    }

    fn write(&mut self, request: Request) -> Result<(), ClientError> {
        self.request_id = self.request_id.wrapping_add(1).max(1);
        debug!("request {}: {request}", self.request_id);

        let payload = request.into_payload();
        if let Err(e) = self.transport.write_framed(self.request_id, &payload) {
            self.hard_disconnect(&e);
            return Err(e.into());
        }
        Ok(())
    }

    fn read(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>, ClientError> {
        match self.transport.read_framed(timeout) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                self.hard_disconnect(&e);
                Err(e.into())
            }
        }
    }

    fn hard_disconnect(&mut self, cause: &TransportError) {
        warn!("dropping connection: {cause}");
        self.backlog.clear();
        self.transport.close();
        self.reset();
    }

    fn reset(&mut self) {
        self.response = Response::default();
        self.columns = ColumnIndex::default();
        self.cursor.reset();
        self.raw_json.clear();
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn parse_address(address: &str) -> Result<(&str, u16), ClientError> {
    let (host, port) = address
        .split_once(':')
        .ok_or_else(|| ClientError::InvalidAddress(address.to_string()))?;

    if host.is_empty() {
        return Err(ClientError::MissingHost);
    }
    if port.is_empty() {
        return Err(ClientError::MissingPort);
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| ClientError::InvalidPort(port.to_string()))?;
    Ok((host, port))
}

fn invalid_request_id(frame: &Frame, expected: u32) -> ClientError {
    ClientError::Protocol(format!(
        "invalid request id {}, expected {expected}",
        frame.request_id
    ))
}
