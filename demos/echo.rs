//! Minimal host standing in for an editor: registers an Echo tool and pumps
//! the tick at ~60Hz. Point an MCP client at 127.0.0.1:5000 and call Echo.

use gantry::registry::{ArgValue, DeclaredType, Parameter, ToolDescriptor};
use gantry::server::{Server, ServerConfig};

fn main() {
    let server = Server::new(ServerConfig::default());
    server.register_tool(ToolDescriptor::new(
        "Echo",
        "Echo",
        "Echoes the message back",
        vec![Parameter::new("msg", DeclaredType::Text, "Message to echo")],
        Box::new(|args: &[ArgValue]| args[0].as_str().map(str::to_string)),
        false,
    ));
    let addr = server.start().expect("failed to start bridge");
    println!("echo host ready on {addr}");
    loop {
        server.update();
        std::thread::sleep(std::time::Duration::from_millis(16));
    }
}
