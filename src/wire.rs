//! Length-prefixed frame transport.
//!
//! One frame on the wire is a 4-byte big-endian payload length followed by
//! that many bytes of UTF-8 JSON, symmetric in both directions. There is no
//! framing-level compression or encryption; the peer is a trusted loopback
//! process.
//!
//! Reading is built around [`FrameBuffer`], which accumulates bytes from a
//! non-blocking stream until a complete frame is available. A single
//! `read_stream` call never corresponds to a single underlying socket read:
//! a frame may arrive split across many reads, or several frames may arrive
//! in one.

use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

/// Sleep between empty polls of a non-blocking stream.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Largest payload we will accept in a single frame.
///
/// A length prefix above this is treated as a malformed frame rather than an
/// allocation request.
pub(crate) const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Errors produced by the frame transport.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FrameError {
    /// The peer declared a frame longer than [`MAX_FRAME_LEN`].
    #[error("declared frame length {0} exceeds the {MAX_FRAME_LEN} byte limit")]
    Oversized(u32),
    /// The underlying stream failed.
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
}

/// The outcome of one poll of a non-blocking stream.
pub(crate) enum ReadStatus {
    /// A complete frame payload is available.
    Completed(Vec<u8>),
    /// Bytes were read but no frame is complete yet.
    Progress,
    /// No data was available.
    WouldBlock,
    /// The peer closed the connection.
    Disconnected,
}

/// Writes one frame: big-endian length prefix, then the payload, flushed.
pub(crate) fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| std::io::Error::other("frame payload exceeds u32 length"))?;
    write_all_robust(stream, &len.to_be_bytes())?;
    write_all_robust(stream, payload)?;
    stream.flush()
}

/// `write_all` that survives `Interrupted` and `WouldBlock`.
///
/// The write half of a connection is shared with a reader thread that toggles
/// the stream non-blocking, so short writes and `WouldBlock` are expected
/// here even on a healthy socket.
fn write_all_robust(stream: &mut TcpStream, mut buf: &[u8]) -> std::io::Result<()> {
    while !buf.is_empty() {
        match stream.write(buf) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write whole frame",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// A reassembly buffer for length-prefixed frames.
pub(crate) struct FrameBuffer {
    bytes: Vec<u8>,
    scratch: [u8; 4096],
}

impl FrameBuffer {
    pub(crate) fn new() -> Self {
        FrameBuffer {
            bytes: Vec::new(),
            scratch: [0; 4096],
        }
    }

    /// Appends raw bytes received from the stream.
    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Discards all buffered bytes.
    ///
    /// Used to resynchronize after an oversized length prefix.
    pub(crate) fn reset(&mut self) {
        self.bytes.clear();
    }

    /// Pops a complete frame payload if one is buffered.
    pub(crate) fn take_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.bytes.len() < 4 {
            return Ok(None);
        }
        let len_bytes: [u8; 4] = self.bytes[0..4].try_into().unwrap();
        let len = u32::from_be_bytes(len_bytes);
        if len > MAX_FRAME_LEN {
            return Err(FrameError::Oversized(len));
        }
        let len = len as usize;
        if self.bytes.len() - 4 < len {
            return Ok(None);
        }
        self.bytes.drain(0..4);
        Ok(Some(self.bytes.drain(0..len).collect()))
    }

    /// Polls the stream once and reports progress.
    ///
    /// Puts the stream into non-blocking mode; callers are expected to sleep
    /// [`POLL_INTERVAL`] on [`ReadStatus::WouldBlock`] rather than spin.
    pub(crate) fn read_stream(&mut self, stream: &mut TcpStream) -> Result<ReadStatus, FrameError> {
        use std::io::Read;
        if let Some(frame) = self.take_frame()? {
            return Ok(ReadStatus::Completed(frame));
        }
        stream.set_nonblocking(true)?;
        let read = match stream.read(&mut self.scratch) {
            Ok(0) => return Ok(ReadStatus::Disconnected),
            Ok(n) => n,
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                return Ok(ReadStatus::WouldBlock);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {
                return Ok(ReadStatus::Progress);
            }
            Err(e) => return Err(e.into()),
        };
        self.bytes.extend_from_slice(&self.scratch[..read]);
        match self.take_frame()? {
            Some(frame) => Ok(ReadStatus::Completed(frame)),
            None => Ok(ReadStatus::Progress),
        }
    }
}
