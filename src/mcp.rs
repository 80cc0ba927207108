//! Protocol dispatcher: request interpretation and response construction.
//!
//! Implements the three methods the bridge understands: `initialize`,
//! `tools/list`, and `tools/call`. Any other method name answers with a
//! literal `result: null` and no error member; that is the behavior the
//! original protocol shipped with, and clients depend on unrecognized
//! methods being harmless.
//!
//! Failures during `tools/call` (unknown tool, uncoercible argument,
//! malformed params) do not produce an error reply. They surface as a
//! [`DispatchError`], which the per-invocation guard in the connection layer
//! logs, and the response for that one request is dropped. The connection
//! and all other requests are unaffected. See `DESIGN.md` for the policy
//! discussion.

use crate::jrpc::{Request, Response};
use crate::registry::{ArgValue, DeclaredType, Parameter, PropertySchema, RegistryError, ToolRegistry};
use std::collections::HashMap;

/// Static identity reported by `initialize`.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    /// Server name shown to the client, typically the host application's.
    pub name: String,
    /// Server version string.
    pub version: String,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        ServerIdentity {
            name: "gantry".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Errors that drop the response for a single request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// An `initialize` request carried no `params.protocolVersion`.
    #[error("initialize request carried no protocolVersion")]
    MissingProtocolVersion,
    /// `tools/call` params were absent or not of the expected shape.
    #[error("tools/call params missing or malformed: {0}")]
    BadParams(String),
    /// `tools/call` named a tool that is not registered.
    #[error(transparent)]
    ToolNotFound(#[from] RegistryError),
    /// An argument could not be coerced to its declared parameter type.
    #[error("cannot coerce argument {argument:?} of tool {tool:?}: {reason}")]
    Coercion {
        /// The tool being invoked.
        tool: String,
        /// The declared parameter name.
        argument: String,
        /// Why the coercion failed.
        reason: String,
    },
}

/// Interprets one request against the registry and builds its response.
///
/// Returns `Err` for the failure modes whose responses are dropped; the
/// caller logs the error and writes nothing.
pub fn dispatch(
    registry: &ToolRegistry,
    identity: &ServerIdentity,
    request: Request,
) -> Result<Response<serde_json::Value>, DispatchError> {
    if request.method == "initialize" {
        Ok(initialize(identity, request)?.erase())
    } else if request.method == "tools/list" {
        Ok(list(registry, request).erase())
    } else if request.method == "tools/call" {
        Ok(call(registry, request)?.erase())
    } else {
        // unrecognized methods answer with a null result and no error member
        Ok(Response::new(serde_json::Value::Null, request.id))
    }
}

fn initialize(
    identity: &ServerIdentity,
    request: Request,
) -> Result<Response<InitializeResult>, DispatchError> {
    let protocol_version = request
        .params
        .as_ref()
        .and_then(|params| params.get("protocolVersion"))
        .cloned()
        .ok_or(DispatchError::MissingProtocolVersion)?;
    Ok(Response::new(
        InitializeResult::new(protocol_version, identity),
        request.id,
    ))
}

#[derive(Debug, serde::Serialize)]
struct InitializeResult {
    /// Echoed from the client's request.
    #[serde(rename = "protocolVersion")]
    protocol_version: serde_json::Value,
    capabilities: Capabilities,
    #[serde(rename = "serverInfo")]
    server_info: ServerInfo,
}

#[derive(Debug, serde::Serialize)]
struct Capabilities {
    logging: EmptyCapability,
    prompts: ListChangedCapability,
    resources: ResourcesCapability,
    tools: ListChangedCapability,
}

#[derive(Debug, serde::Serialize)]
struct EmptyCapability {}

#[derive(Debug, serde::Serialize)]
struct ListChangedCapability {
    #[serde(rename = "listChanged")]
    list_changed: bool,
}

#[derive(Debug, serde::Serialize)]
struct ResourcesCapability {
    subscribe: bool,
    #[serde(rename = "listChanged")]
    list_changed: bool,
}

#[derive(Debug, serde::Serialize)]
struct ServerInfo {
    name: String,
    version: String,
}

impl InitializeResult {
    fn new(protocol_version: serde_json::Value, identity: &ServerIdentity) -> Self {
        InitializeResult {
            protocol_version,
            capabilities: Capabilities {
                logging: EmptyCapability {},
                prompts: ListChangedCapability { list_changed: true },
                resources: ResourcesCapability {
                    subscribe: true,
                    list_changed: true,
                },
                tools: ListChangedCapability { list_changed: true },
            },
            server_info: ServerInfo {
                name: identity.name.clone(),
                version: identity.version.clone(),
            },
        }
    }
}

/// Result of `tools/list`.
#[derive(Debug, serde::Serialize)]
struct ToolList {
    tools: Vec<ToolInfo>,
}

/// One tool as advertised on the wire.
///
/// `required` is serialized as a sibling of `inputSchema`, not inside it;
/// clients of the original server expect this exact shape.
#[derive(Debug, serde::Serialize)]
struct ToolInfo {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: SchemaBody,
    required: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
struct SchemaBody {
    r#type: &'static str,
    properties: HashMap<String, PropertySchema>,
}

fn list(registry: &ToolRegistry, request: Request) -> Response<ToolList> {
    let tools = registry
        .list()
        .iter()
        .map(|tool| {
            let schema = tool.schema();
            ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: SchemaBody {
                    r#type: "object",
                    properties: schema.properties.clone(),
                },
                required: schema.required.clone(),
            }
        })
        .collect();
    Response::new(ToolList { tools }, request.id)
}

/// Parameters of a `tools/call` request.
#[derive(Debug, serde::Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: HashMap<String, serde_json::Value>,
}

/// Result of a `tools/call` request.
#[derive(Debug, serde::Serialize)]
struct ToolCallResult {
    content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

#[derive(Debug, serde::Serialize)]
struct ToolContent {
    r#type: &'static str,
    text: String,
}

impl ToolCallResult {
    fn text(text: String) -> Self {
        ToolCallResult {
            content: vec![ToolContent {
                r#type: "text",
                text,
            }],
            is_error: false,
        }
    }
}

fn call(registry: &ToolRegistry, request: Request) -> Result<Response<ToolCallResult>, DispatchError> {
    let params = request
        .params
        .clone()
        .ok_or_else(|| DispatchError::BadParams("no parameters provided".to_string()))?;
    let params: ToolCallParams =
        serde_json::from_value(params).map_err(|e| DispatchError::BadParams(e.to_string()))?;
    let tool = registry.lookup(&params.name)?;

    let mut args = Vec::with_capacity(tool.parameters().len());
    for parameter in tool.parameters() {
        args.push(coerce(&params.name, parameter, params.arguments.get(parameter.name()))?);
    }
    let output = tool.invoke(&args);
    let text = if tool.returns_void() {
        "success".to_string()
    } else {
        output.unwrap_or_default()
    };
    Ok(Response::new(ToolCallResult::text(text), request.id))
}

/// Coerces one JSON argument to its parameter's declared type.
///
/// Numeric arguments widen to the declared int/float/double kind, text
/// passes through, and anything declared `Object` is taken structurally.
fn coerce(
    tool: &str,
    parameter: &Parameter,
    value: Option<&serde_json::Value>,
) -> Result<ArgValue, DispatchError> {
    let fail = |reason: &str| DispatchError::Coercion {
        tool: tool.to_string(),
        argument: parameter.name().to_string(),
        reason: reason.to_string(),
    };
    let value = value.ok_or_else(|| fail("argument missing"))?;
    match parameter.declared_type() {
        DeclaredType::Int => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(ArgValue::Int)
            .ok_or_else(|| fail("expected a number")),
        DeclaredType::Float => value
            .as_f64()
            .map(|f| ArgValue::Float(f as f32))
            .ok_or_else(|| fail("expected a number")),
        DeclaredType::Double => value
            .as_f64()
            .map(ArgValue::Double)
            .ok_or_else(|| fail("expected a number")),
        DeclaredType::Text => value
            .as_str()
            .map(|s| ArgValue::Text(s.to_string()))
            .ok_or_else(|| fail("expected a string")),
        DeclaredType::Object => Ok(ArgValue::Object(value.clone())),
    }
}
