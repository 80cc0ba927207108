//! Server orchestrator: listener lifecycle, thread spawning, shutdown.
//!
//! The [`Server`] owns the tool registry and the dispatch queue and hands
//! `Arc` clones of both to every connection thread — there is no ambient
//! global state. The host embeds a server, registers tools (before or after
//! starting), calls [`Server::start`] once, and then calls
//! [`Server::update`] from its own periodic tick. The crate never schedules
//! that tick itself.
//!
//! # Examples
//!
//! ```
//! use gantry::registry::{ArgValue, DeclaredType, Parameter, ToolDescriptor};
//! use gantry::server::{Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig {
//!     port: 0, // ephemeral; production hosts default to 5000
//!     ..ServerConfig::default()
//! });
//! server.register_tool(ToolDescriptor::new(
//!     "Echo",
//!     "Echo",
//!     "Echoes the message back",
//!     vec![Parameter::new("msg", DeclaredType::Text, "Message to echo")],
//!     Box::new(|args: &[ArgValue]| args[0].as_str().map(str::to_string)),
//!     false,
//! ));
//! let addr = server.start().unwrap();
//! assert!(addr.ip().is_loopback());
//!
//! // the host tick drains pending invocations; here there are none
//! assert_eq!(server.update(), 0);
//! server.dispose();
//! ```

use crate::connection::Connection;
use crate::logging;
use crate::mcp::ServerIdentity;
use crate::queue::DispatchQueue;
use crate::registry::{ToolDescriptor, ToolRegistry};
use crate::wire::POLL_INTERVAL;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// The default listening port.
pub const DEFAULT_PORT: u16 = 5000;

/// Host-supplied server configuration.
///
/// The host persists these values itself (in editor preferences, say); this
/// struct is just how they are handed over.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on, loopback only. `0` binds an ephemeral port, which
    /// [`Server::start`] reports back.
    pub port: u16,
    /// Identity reported to clients during `initialize`.
    pub identity: ServerIdentity,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            identity: ServerIdentity::default(),
        }
    }
}

/// Errors from server lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `start` was called while the server was already running.
    #[error("server is already running")]
    AlreadyRunning,
    /// `start` was called after `dispose`.
    #[error("server has been disposed")]
    Disposed,
    /// The listener could not be bound.
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

enum State {
    Idle,
    Running(SocketAddr),
    Disposed,
}

/// An embeddable MCP bridge server.
pub struct Server {
    config: ServerConfig,
    registry: Arc<ToolRegistry>,
    queue: Arc<DispatchQueue>,
    state: Mutex<State>,
    disposed: Arc<AtomicBool>,
}

impl Server {
    /// Creates a server. Nothing is bound until [`Server::start`].
    pub fn new(config: ServerConfig) -> Self {
        Server {
            config,
            registry: Arc::new(ToolRegistry::new()),
            queue: Arc::new(DispatchQueue::new()),
            state: Mutex::new(State::Idle),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The shared tool registry.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Registers a tool; tools may be added before or after `start`.
    pub fn register_tool(&self, tool: ToolDescriptor) {
        self.registry.register(tool);
    }

    /// Binds the listener and spawns the accept thread.
    ///
    /// Returns the bound address. Calling `start` on a running server is a
    /// reported configuration error, not a restart; calling it after
    /// [`Server::dispose`] fails with [`ServerError::Disposed`].
    pub fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Running(_) => return Err(ServerError::AlreadyRunning),
            State::Disposed => return Err(ServerError::Disposed),
            State::Idle => {}
        }
        let listener = TcpListener::bind(("127.0.0.1", self.config.port))?;
        let addr = listener.local_addr()?;
        // non-blocking accept so dispose() can stop the loop
        listener.set_nonblocking(true)?;
        logging::log(&format!("gantry: listening on {}", addr));

        let registry = self.registry.clone();
        let queue = self.queue.clone();
        let identity = self.config.identity.clone();
        let disposed = self.disposed.clone();
        std::thread::Builder::new()
            .name("gantry::accept".to_string())
            .spawn(move || {
                accept_loop(listener, registry, queue, identity, disposed);
            })
            .map_err(ServerError::Bind)?;
        *state = State::Running(addr);
        Ok(addr)
    }

    /// The host tick: drains the dispatch queue once.
    ///
    /// Executes every invocation queued so far, in FIFO order, and returns
    /// the number executed without waiting for new work. Must be called on
    /// the host's single logical thread, on the host's own cadence.
    pub fn update(&self) -> usize {
        self.queue.drain_once()
    }

    /// Stops accepting new connections. Idempotent.
    ///
    /// Connections that are already open keep running until their peer
    /// disconnects; queued invocations still drain through
    /// [`Server::update`].
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        *state = State::Disposed;
    }

    /// The bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.state.lock().unwrap() {
            State::Running(addr) => Some(addr),
            _ => None,
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn accept_loop(
    listener: TcpListener,
    registry: Arc<ToolRegistry>,
    queue: Arc<DispatchQueue>,
    identity: ServerIdentity,
    disposed: Arc<AtomicBool>,
) {
    loop {
        if disposed.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, addr)) => {
                logging::log(&format!("gantry: client connected: {}", addr));
                let spawned = Connection::spawn(
                    stream,
                    registry.clone(),
                    queue.clone(),
                    identity.clone(),
                );
                if let Err(e) = spawned {
                    logging::log(&format!("gantry: error spawning handler for {}: {}", addr, e));
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                // accept failures are contained; keep listening
                logging::log(&format!("gantry: accept error: {}", e));
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}
