//! Per-connection read loop and lifecycle tracking.
//!
//! Each accepted socket gets one reader thread. The thread reassembles
//! frames, parses them into request envelopes, and enqueues a pending
//! invocation per request on the shared dispatch queue. The host tick later
//! runs the invocation, which dispatches the request and writes the reply
//! back through this connection's transport.
//!
//! Lifecycle: a connection is open until its read loop exits, either because
//! the peer disconnected or because of an unrecoverable I/O error. The
//! `closed` flag is set before the socket is shut down, so an invocation
//! that was enqueued while the connection was still open observes the flag
//! and becomes a no-op instead of writing to a dead stream. A malformed
//! frame or unparseable JSON payload is logged and the loop moves on to the
//! next frame; one bad frame never terminates the connection.

use crate::jrpc::{Request, Response};
use crate::logging;
use crate::mcp::{self, ServerIdentity};
use crate::queue::DispatchQueue;
use crate::registry::ToolRegistry;
use crate::wire::{self, FrameBuffer, FrameError, ReadStatus};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One accepted client connection.
///
/// Owns the write half of the socket; the read half lives on the reader
/// thread. Shared by `Arc` between the reader thread and any pending
/// invocations that still reference it.
pub(crate) struct Connection {
    writer: Mutex<TcpStream>,
    closed: AtomicBool,
    peer: SocketAddr,
}

impl Connection {
    /// Wraps an accepted stream and spawns its reader thread.
    pub(crate) fn spawn(
        stream: TcpStream,
        registry: Arc<ToolRegistry>,
        queue: Arc<DispatchQueue>,
        identity: ServerIdentity,
    ) -> std::io::Result<Arc<Connection>> {
        let peer = stream.peer_addr()?;
        let reader = stream.try_clone()?;
        let connection = Arc::new(Connection {
            writer: Mutex::new(stream),
            closed: AtomicBool::new(false),
            peer,
        });
        let loop_connection = connection.clone();
        std::thread::Builder::new()
            .name(format!("gantry::conn-{}", peer))
            .spawn(move || {
                read_loop(loop_connection, reader, registry, queue, identity);
            })?;
        Ok(connection)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Marks the connection closed, then releases the transport.
    ///
    /// The flag must be observable before the socket goes away; pending
    /// invocations check it and skip their write.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let writer = self.writer.lock().unwrap();
        if let Err(e) = writer.shutdown(Shutdown::Both) {
            if e.kind() != std::io::ErrorKind::NotConnected {
                logging::log(&format!("gantry: error shutting down {}: {}", self.peer, e));
            }
        }
    }

    /// Writes a response frame, unless the connection has closed.
    ///
    /// A send against a closed connection is a silent no-op; the invocation
    /// already ran, its result is simply discarded.
    pub(crate) fn send(&self, response: &Response<serde_json::Value>) -> std::io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        let payload = serde_json::to_vec(response).map_err(std::io::Error::other)?;
        let mut writer = self.writer.lock().unwrap();
        // re-check under the lock: close() may have won the race
        if self.is_closed() {
            return Ok(());
        }
        wire::write_frame(&mut writer, &payload)
    }

    /// Runs on the host tick: dispatch the request, write the reply.
    fn respond(&self, registry: &ToolRegistry, identity: &ServerIdentity, request: Request) {
        if self.is_closed() {
            return;
        }
        let response = match mcp::dispatch(registry, identity, request) {
            Ok(response) => response,
            Err(e) => {
                logging::log(&format!("gantry: dropping request from {}: {}", self.peer, e));
                return;
            }
        };
        if let Err(e) = self.send(&response) {
            logging::log(&format!("gantry: error replying to {}: {}", self.peer, e));
        }
    }
}

fn read_loop(
    connection: Arc<Connection>,
    mut reader: TcpStream,
    registry: Arc<ToolRegistry>,
    queue: Arc<DispatchQueue>,
    identity: ServerIdentity,
) {
    let mut frames = FrameBuffer::new();
    loop {
        match frames.read_stream(&mut reader) {
            Ok(ReadStatus::Completed(payload)) => {
                enqueue_frame(&connection, &payload, &registry, &queue, &identity);
            }
            Ok(ReadStatus::Progress) => {}
            Ok(ReadStatus::WouldBlock) => std::thread::sleep(wire::POLL_INTERVAL),
            Ok(ReadStatus::Disconnected) => {
                logging::log(&format!("gantry: client disconnected: {}", connection.peer));
                break;
            }
            Err(e @ FrameError::Oversized(_)) => {
                logging::log(&format!(
                    "gantry: malformed frame from {}: {}",
                    connection.peer, e
                ));
                frames.reset();
            }
            Err(FrameError::Io(e)) => {
                logging::log(&format!("gantry: read error on {}: {}", connection.peer, e));
                break;
            }
        }
    }
    connection.close();
}

/// Parses one frame and hands it to the host tick.
///
/// Frames that are not valid JSON request envelopes are logged and skipped.
fn enqueue_frame(
    connection: &Arc<Connection>,
    payload: &[u8],
    registry: &Arc<ToolRegistry>,
    queue: &Arc<DispatchQueue>,
    identity: &ServerIdentity,
) {
    let request: Request = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            logging::log(&format!(
                "gantry: unparseable frame from {}: {}",
                connection.peer, e
            ));
            return;
        }
    };
    let connection = connection.clone();
    let registry = registry.clone();
    let identity = identity.clone();
    queue.enqueue(move || {
        connection.respond(&registry, &identity, request);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::TcpListener;
    use std::time::Duration;

    fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        (client, server_side)
    }

    #[test]
    fn queued_invocation_against_closed_connection_is_a_no_op() {
        let (mut client, server_side) = loopback_pair();
        let registry = Arc::new(ToolRegistry::new());
        let queue = Arc::new(DispatchQueue::new());
        let connection =
            Connection::spawn(server_side, registry.clone(), queue.clone(), ServerIdentity::default())
                .unwrap();

        // enqueue a request by hand, then close before the tick drains it
        let identity = ServerIdentity::default();
        let pending = connection.clone();
        queue.enqueue(move || {
            pending.respond(
                &registry,
                &identity,
                Request::new("tools/list".to_string(), None, Some(1)),
            );
        });
        connection.close();
        assert_eq!(queue.drain_once(), 1);

        // the peer must see end-of-stream without any response bytes
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut received = Vec::new();
        let read = client.read_to_end(&mut received);
        assert!(read.is_ok(), "peer socket raised instead of closing cleanly");
        assert!(received.is_empty(), "closed connection still wrote a response");
    }

    #[test]
    fn close_is_idempotent() {
        let (_client, server_side) = loopback_pair();
        let registry = Arc::new(ToolRegistry::new());
        let queue = Arc::new(DispatchQueue::new());
        let connection =
            Connection::spawn(server_side, registry, queue, ServerIdentity::default()).unwrap();
        connection.close();
        connection.close();
        assert!(connection.is_closed());
    }
}
