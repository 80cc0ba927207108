//! JSON-RPC-style message envelopes.
//!
//! gantry speaks a JSON-RPC 2.0 dialect: responses always carry
//! `jsonrpc: "2.0"`, but incoming requests are accepted without the version
//! marker, because real-world automation clients omit it. A request that
//! carries an `id` expects a correlated response; a request without one is a
//! notification. Matching the original wire behavior, notifications still
//! receive a reply — the reply simply omits the `id` field.
//!
//! # Examples
//!
//! ```
//! use gantry::jrpc::{Request, Response};
//! use serde_json::json;
//!
//! let request: Request = serde_json::from_str(
//!     r#"{"method":"tools/list","id":7}"#
//! ).unwrap();
//! assert_eq!(request.method, "tools/list");
//! assert_eq!(request.id, Some(7));
//! assert!(!request.is_notification());
//!
//! let response = Response::new(json!({"tools": []}), request.id);
//! let wire = serde_json::to_string(&response).unwrap();
//! assert!(wire.contains("\"jsonrpc\":\"2.0\""));
//! assert!(wire.contains("\"id\":7"));
//! ```

use serde::Serialize;

/// A parsed request envelope.
///
/// Only `method` is mandatory on the wire; `params` and `id` are optional,
/// and the `jsonrpc` version marker is ignored if present.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone)]
pub struct Request {
    /// The name of the method to invoke.
    pub method: String,
    /// Optional parameters for the method call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Correlation identifier. Absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl Request {
    /// Creates a new request envelope.
    pub fn new(method: String, params: Option<serde_json::Value>, id: Option<i64>) -> Self {
        Self { method, params, id }
    }

    /// Returns true if this request does not expect a correlated response.
    ///
    /// ```
    /// use gantry::jrpc::Request;
    ///
    /// let n = Request::new("tools/list".to_string(), None, None);
    /// assert!(n.is_notification());
    /// ```
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A response envelope.
///
/// The generic parameter `R` is the result type; [`Response::erase`] converts
/// a typed response into a `serde_json::Value` one so that handlers with
/// different result types can share a write path.
///
/// The `id` is echoed from the request when present and omitted from the
/// serialized form otherwise. `result` is always serialized, even when null —
/// an unrecognized method answers with a literal `"result": null`.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Response<R> {
    /// The JSON-RPC protocol version, always "2.0".
    pub jsonrpc: String,
    /// The request identifier this response correlates with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// The result of the method call.
    pub result: R,
}

impl<R> Response<R> {
    /// Creates a response carrying `result`, correlated with `id`.
    ///
    /// ```
    /// use gantry::jrpc::Response;
    ///
    /// let response = Response::new(19, Some(1));
    /// assert_eq!(
    ///     serde_json::to_string(&response).unwrap(),
    ///     r#"{"jsonrpc":"2.0","id":1,"result":19}"#
    /// );
    ///
    /// // a reply to a notification omits the id field entirely
    /// let reply = Response::new(19, None);
    /// assert_eq!(
    ///     serde_json::to_string(&reply).unwrap(),
    ///     r#"{"jsonrpc":"2.0","result":19}"#
    /// );
    /// ```
    pub fn new(result: R, id: Option<i64>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result,
        }
    }

    /// Converts a typed response into one carrying `serde_json::Value`.
    ///
    /// # Panics
    ///
    /// Panics if the result cannot be serialized to JSON, which only happens
    /// for types with non-serializable fields.
    pub fn erase(self) -> Response<serde_json::Value>
    where
        R: Serialize,
    {
        Response {
            jsonrpc: self.jsonrpc,
            id: self.id,
            result: serde_json::to_value(self.result).unwrap(),
        }
    }
}
