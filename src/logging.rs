//! Logging for the gantry library.
//!
//! gantry is designed to be embedded in a host application that usually has
//! its own logging sink (a game editor console, say). To avoid forcing a
//! framework on the host, everything in this crate funnels through [`log`],
//! which writes to stderr. Messages never go to stdout, which the host may
//! be using for its own inter-process communication.
//!
//! # Examples
//!
//! ```
//! # mod logging {
//! #     pub fn log(str: &str) {
//! #         eprintln!("{}", str);
//! #     }
//! # }
//! # use logging::log;
//! let port = 5000;
//! log(&format!("listening on port {}", port));
//! ```

/// Logs a message to stderr.
///
/// Contained failures (a rejected duplicate registration, a malformed frame,
/// a dropped request) are reported through this function and nowhere else.
pub fn log(str: &str) {
    eprintln!("{}", str);
}
