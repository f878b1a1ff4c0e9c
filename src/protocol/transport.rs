use std::{
    io::{self, ErrorKind, Read, Write},
    net::{Shutdown, TcpStream},
    time::Duration,
};

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
    decode_from_slice, encode_into_std_write,
};
use log::{debug, trace};
use thiserror::Error;

/// Size in bytes of the header preceding every payload on the wire.
pub const HEADER_SIZE: usize = 8;

/// Largest payload accepted in either direction.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLarge(usize),
    #[error("incoming frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(u32),
    #[error("failed to encode frame header: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
    #[error("failed to decode frame header: {0}")]
    Deserialize(#[from] bincode::error::DecodeError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

/// Fixed-width header: payload size followed by the request id.
#[derive(Debug, Clone, Copy, Encode, Decode, PartialEq, Eq)]
struct Header {
    size: u32,
    request_id: u32,
}

/// A single message read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub request_id: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Frames carrying request id `0` were pushed by the server and answer no request.
    pub fn is_published(&self) -> bool {
        self.request_id == 0
    }
}

/// Byte stream the client session drives.
///
/// `read_framed` returns `Ok(None)` when `timeout` elapsed before a frame arrived;
/// a `None` timeout blocks until a frame or an error shows up.
pub trait Transport {
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn write_framed(&mut self, request_id: u32, payload: &[u8]) -> Result<(), TransportError>;
    fn read_framed(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>, TransportError>;
}

/// Frames messages over `stream`.
///
/// Header bytes received before a read timeout are kept and completed by the next
/// read, so a timeout never splits the stream out of step with the framing.
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
    config: Configuration<BigEndian, Fixint>,
    header: [u8; HEADER_SIZE],
    filled: usize,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_fixed_int_encoding();
        Self {
            stream,
            config,
            header: [0; HEADER_SIZE],
            filled: 0,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    pub fn write_frame(&mut self, request_id: u32, payload: &[u8]) -> Result<(), TransportError> {
        let size = u32::try_from(payload.len())
            .ok()
            .filter(|size| *size <= MAX_FRAME_SIZE)
            .ok_or(TransportError::PayloadTooLarge(payload.len()))?;
        encode_into_std_write(Header { size, request_id }, &mut self.stream, self.config)?;
        self.stream.write_all(payload)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn read_frame(&mut self) -> Result<Frame, TransportError> {
        match self.poll_header()? {
            Some(header) => self.read_payload(header),
            None => Err(io::Error::from(ErrorKind::TimedOut).into()),
        }
    }

    /// Fills the header, returning `Ok(None)` if the stream timed out first.
    fn poll_header(&mut self) -> Result<Option<Header>, TransportError> {
        while self.filled < HEADER_SIZE {
            match self.stream.read(&mut self.header[self.filled..]) {
                Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof).into()),
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if is_timeout(&e) => {
                    if self.filled > 0 {
                        trace!("timed out with {} header bytes pending", self.filled);
                    }
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.filled = 0;
        let (header, _): (Header, usize) = decode_from_slice(&self.header, self.config)?;
        if header.size > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(header.size));
        }
        Ok(Some(header))
    }

    fn read_payload(&mut self, header: Header) -> Result<Frame, TransportError> {
        let mut payload = vec![0u8; header.size as usize];
        self.stream.read_exact(&mut payload)?;
        trace!(
            "read frame: request id {}, {} bytes",
            header.request_id, header.size
        );
        Ok(Frame {
            request_id: header.request_id,
            payload,
        })
    }
}

/// TCP implementation of [`Transport`].
#[derive(Default)]
pub struct NetTransport {
    inner: Option<ProtocolTransport<TcpStream>>,
}

impl NetTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn connected(&mut self) -> Result<&mut ProtocolTransport<TcpStream>, TransportError> {
        self.inner.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl Transport for NetTransport {
    fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.close();
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        debug!("opened connection to {host}:{port}");
        self.inner = Some(ProtocolTransport::new(stream));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(transport) = self.inner.take() {
            // Peer may already be gone.
            let _ = transport.get_ref().shutdown(Shutdown::Both);
            debug!("closed connection");
        }
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn write_framed(&mut self, request_id: u32, payload: &[u8]) -> Result<(), TransportError> {
        self.connected()?.write_frame(request_id, payload)
    }

    fn read_framed(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>, TransportError> {
        let transport = self.connected()?;
        // A zero duration is rejected by the socket layer.
        let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        transport.get_ref().set_read_timeout(timeout)?;

        let Some(header) = transport.poll_header()? else {
            return Ok(None);
        };

        if timeout.is_some() {
            transport.get_ref().set_read_timeout(None)?;
        }
        transport.read_payload(header).map(Some)
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        io::{Cursor, Seek},
    };

    use super::*;

    /// Stream handing out scripted chunks and errors, one per read.
    struct Trickle {
        chunks: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Ok(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Ok(chunk.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn encoded(request_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut transport = ProtocolTransport::new(Cursor::new(Vec::new()));
        transport.write_frame(request_id, payload).unwrap();
        transport.stream.into_inner()
    }

    #[test]
    fn read_write_frame() {
        let stream = Cursor::new(Vec::new());
        let mut transport = ProtocolTransport::new(stream);

        transport.write_frame(7, b"select * from stocks").unwrap();
        transport.stream.seek(std::io::SeekFrom::Start(0)).unwrap();
        let frame = transport.read_frame().unwrap();

        assert_eq!(frame.request_id, 7);
        assert_eq!(frame.payload, b"select * from stocks");
    }

    #[test]
    fn header_is_big_endian_size_then_id() {
        let stream = Cursor::new(Vec::new());
        let mut transport = ProtocolTransport::new(stream);

        transport.write_frame(258, b"close").unwrap();
        let bytes = transport.stream.into_inner();

        assert_eq!(&bytes[..HEADER_SIZE], &[0, 0, 0, 5, 0, 0, 1, 2]);
        assert_eq!(&bytes[HEADER_SIZE..], b"close");
    }

    #[test]
    fn empty_payload_frame() {
        let stream = Cursor::new(Vec::new());
        let mut transport = ProtocolTransport::new(stream);

        transport.write_frame(0, b"").unwrap();
        transport.stream.seek(std::io::SeekFrom::Start(0)).unwrap();
        let frame = transport.read_frame().unwrap();

        assert!(frame.is_published());
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn truncated_payload_is_an_io_error() {
        let mut bytes = vec![0, 0, 0, 10, 0, 0, 0, 1];
        bytes.extend_from_slice(b"short");
        let mut transport = ProtocolTransport::new(Cursor::new(bytes));

        let err = transport.read_frame().unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn timeout_inside_header_resumes() {
        let bytes = encoded(0, b"{\"status\":\"ok\"}");
        let stream = Trickle {
            chunks: VecDeque::from([
                Ok(bytes[..4].to_vec()),
                Err(io::Error::from(ErrorKind::WouldBlock)),
                Ok(bytes[4..6].to_vec()),
                Err(io::Error::from(ErrorKind::TimedOut)),
                Ok(bytes[6..].to_vec()),
            ]),
        };
        let mut transport = ProtocolTransport::new(stream);

        assert_eq!(transport.poll_header().unwrap(), None);
        assert_eq!(transport.poll_header().unwrap(), None);
        let header = transport.poll_header().unwrap().unwrap();
        let frame = transport.read_payload(header).unwrap();

        assert_eq!(frame.request_id, 0);
        assert_eq!(frame.payload, b"{\"status\":\"ok\"}");
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut bytes = (MAX_FRAME_SIZE + 1).to_be_bytes().to_vec();
        bytes.extend_from_slice(&3u32.to_be_bytes());
        let mut transport = ProtocolTransport::new(Cursor::new(bytes));

        let err = transport.read_frame().unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge(size) if size == MAX_FRAME_SIZE + 1));
    }

    #[test]
    fn end_of_stream_inside_header() {
        let mut transport = ProtocolTransport::new(Cursor::new(vec![0, 0, 0]));

        let err = transport.read_frame().unwrap_err();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == ErrorKind::UnexpectedEof));
    }

    #[test]
    fn closed_net_transport_refuses_io() {
        let mut transport = NetTransport::new();

        assert!(!transport.is_open());
        assert!(matches!(
            transport.write_framed(1, b"status"),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.read_framed(None),
            Err(TransportError::NotConnected)
        ));
        transport.close();
        assert!(!transport.is_open());
    }
}
