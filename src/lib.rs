/*!
An embeddable MCP bridge for single-threaded host applications.

gantry connects an external automation client (an agent, an IDE, a test
harness) to a host application whose API is only safe to touch from one
logical thread — the classic example being a game-engine editor with a main
update tick. The client discovers and invokes a dynamically registered set of
named tools over a local TCP socket, using a JSON-RPC-style protocol with
length-prefixed JSON frames.

# Overview

The crate is the transport, concurrency, and dispatch engine of that bridge:

- a length-framed wire protocol over a persistent loopback TCP connection,
- a thread-per-connection read loop that never touches host state,
- a mutex-protected FIFO that marshals parsed requests onto the host tick,
- a tool registry with JSON schemas derived at registration time,
- a dispatcher implementing `initialize`, `tools/list`, and `tools/call`.

What it deliberately is not: tool discovery (the host scans its own annotated
methods and hands over ready-made descriptors), configuration persistence,
authentication, or encryption. The peer is a trusted local process.

# Key Features

- **No async runtime required**: Uses threads instead of tokio, simplifying
  integration with hosts that have their own event loop
- **Single-threaded tool execution**: Tool bodies only ever run on the host
  tick, never concurrently with each other, so tools can call host APIs
  without synchronization
- **Resilient connections**: A malformed frame or bad JSON payload is logged
  and skipped; only peer disconnects and I/O faults end a connection
- **Deterministic tool listing**: `tools/list` reports tools in registration
  order, keeping client-side caches stable

# Quick Start

```no_run
use gantry::registry::{ArgValue, DeclaredType, Parameter, ToolDescriptor};
use gantry::server::{Server, ServerConfig};

// one server per host, usually created at editor startup
let server = Server::new(ServerConfig::default()); // port 5000

// the host's discovery layer supplies one descriptor per exposed method
server.register_tool(ToolDescriptor::new(
    "LaunchGame",
    "LaunchGame",
    "Enters play mode in the editor",
    vec![],
    Box::new(|_: &[ArgValue]| {
        // calls host APIs here; this closure only ever runs on the host tick
        None
    }),
    true, // void: clients receive the literal "success"
));

server.start().expect("bind MCP bridge");

// wire update() into the host's periodic tick
loop {
    server.update();
    std::thread::sleep(std::time::Duration::from_millis(16));
}
```

# Threading Model

One reader thread per accepted connection plus one accept thread, all owned
by the crate; and the host tick, owned by the host. Network reads block only
their own thread and poll with a short sleep rather than blocking
indefinitely, so `dispose` can always stop the listener. The dispatch queue
is the single point of contact between the two worlds: connection threads
produce, the tick consumes, and invocations from one connection execute in
the order their frames arrived.

Closing a connection sets a flag that is checked immediately before any
response write. An invocation that is already queued still runs, but its
result is discarded rather than written to a dead socket. Nothing is
cancelled mid-call.

# Module Organization

- [`server`] - Orchestrator: lifecycle, configuration, the host tick entry point
- [`registry`] - Tool descriptors, schema derivation, the shared registry
- [`mcp`] - Protocol dispatcher and response shapes
- [`jrpc`] - Request/response envelopes

*/
mod connection;
pub mod jrpc;
mod logging;
pub mod mcp;
mod queue;
pub mod registry;
pub mod server;
mod wire;
