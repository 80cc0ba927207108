//! Tool registration and schema derivation.
//!
//! A *tool* is a named operation the host application exposes to the remote
//! client. The host's discovery layer (reflection over annotated editor
//! methods, or plain hand-written registration) supplies a
//! [`ToolDescriptor`] per callable: an alias to invoke it by, display
//! metadata, an ordered parameter list, and the bound invoker itself. The
//! registry validates and stores descriptors; it never performs discovery.
//!
//! The JSON input schema advertised to clients is derived once, at
//! registration time, from the declared parameter list. Descriptors are
//! immutable after that point.
//!
//! # Examples
//!
//! ```
//! use gantry::registry::{ArgValue, DeclaredType, Parameter, ToolDescriptor, ToolRegistry};
//!
//! let registry = ToolRegistry::new();
//! registry.register(ToolDescriptor::new(
//!     "Echo",
//!     "Echo",
//!     "Echoes the message back",
//!     vec![Parameter::new("msg", DeclaredType::Text, "Message to echo")],
//!     Box::new(|args: &[ArgValue]| args[0].as_str().map(str::to_string)),
//!     false,
//! ));
//!
//! let tool = registry.lookup("Echo").unwrap();
//! assert_eq!(tool.alias(), "Echo");
//! assert_eq!(tool.invoke(&[ArgValue::Text("hi".into())]), Some("hi".to_string()));
//! ```

use crate::logging;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The type a tool parameter was declared with in the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    /// A signed integer parameter.
    Int,
    /// A single-precision floating point parameter.
    Float,
    /// A double-precision floating point parameter.
    Double,
    /// A text parameter.
    Text,
    /// Anything else; passed through as structural JSON.
    Object,
}

impl DeclaredType {
    /// The JSON schema type name this declared type is advertised as.
    ///
    /// All numeric kinds collapse to `"number"`; text maps to `"string"`;
    /// everything else is `"object"`.
    pub fn schema_type(&self) -> &'static str {
        match self {
            DeclaredType::Int | DeclaredType::Float | DeclaredType::Double => "number",
            DeclaredType::Text => "string",
            DeclaredType::Object => "object",
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub(crate) name: String,
    pub(crate) declared_type: DeclaredType,
    pub(crate) description: String,
}

impl Parameter {
    /// Creates a parameter declaration.
    pub fn new(
        name: impl Into<String>,
        declared_type: DeclaredType,
        description: impl Into<String>,
    ) -> Self {
        Parameter {
            name: name.into(),
            declared_type,
            description: description.into(),
        }
    }

    /// The parameter name, as it appears in `arguments` on the wire.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type arguments are coerced to before invocation.
    pub fn declared_type(&self) -> DeclaredType {
        self.declared_type
    }
}

/// An argument value after coercion to a parameter's declared type.
///
/// Invokers receive these positionally, in declared-parameter order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A coerced integer argument.
    Int(i64),
    /// A coerced single-precision argument.
    Float(f32),
    /// A coerced double-precision argument.
    Double(f64),
    /// A text argument, passed through unchanged.
    Text(String),
    /// A structural JSON argument.
    Object(serde_json::Value),
}

impl ArgValue {
    /// Returns the text content, if this is a text argument.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer argument.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the numeric content widened to f64, for any numeric argument.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Int(v) => Some(*v as f64),
            ArgValue::Float(v) => Some(*v as f64),
            ArgValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

/// The callable bound to a tool at registration time.
///
/// Returns the tool's output as a string, or `None` for callables without a
/// meaningful return value. Invokers run on the host tick, never
/// concurrently with each other, but the descriptor itself is shared across
/// connection threads, hence `Send + Sync`.
pub type BoundInvoker = Box<dyn Fn(&[ArgValue]) -> Option<String> + Send + Sync>;

/// Schema of a single property in a tool's input schema.
#[derive(Debug, Clone, serde::Serialize)]
pub(crate) struct PropertySchema {
    pub(crate) r#type: &'static str,
    pub(crate) description: String,
}

/// A tool's derived JSON input schema.
///
/// Computed once when the descriptor is constructed. `required` is the
/// ordered list of declared parameter names; `properties` maps each name to
/// its advertised type and description.
#[derive(Debug, Clone)]
pub(crate) struct InputSchema {
    pub(crate) properties: HashMap<String, PropertySchema>,
    pub(crate) required: Vec<String>,
}

impl InputSchema {
    fn from_parameters(parameters: &[Parameter]) -> Self {
        let mut properties = HashMap::new();
        let mut required = Vec::new();
        for parameter in parameters {
            properties.insert(
                parameter.name.clone(),
                PropertySchema {
                    r#type: parameter.declared_type.schema_type(),
                    description: parameter.description.clone(),
                },
            );
            required.push(parameter.name.clone());
        }
        InputSchema {
            properties,
            required,
        }
    }
}

/// A registered tool: metadata, derived schema, and the bound invoker.
pub struct ToolDescriptor {
    alias: String,
    name: String,
    description: String,
    parameters: Vec<Parameter>,
    invoke: BoundInvoker,
    returns_void: bool,
    schema: InputSchema,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("alias", &self.alias)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("returns_void", &self.returns_void)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Creates a descriptor and derives its input schema.
    ///
    /// # Arguments
    ///
    /// * `alias` - The registry key the tool is invoked by
    /// * `name` - The display name shown to clients
    /// * `description` - What the tool does
    /// * `parameters` - Declared parameters, in invocation order
    /// * `invoke` - The bound callable
    /// * `returns_void` - Whether the callable has no return value; void
    ///   tools answer with the literal `"success"`
    pub fn new(
        alias: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<Parameter>,
        invoke: BoundInvoker,
        returns_void: bool,
    ) -> Self {
        let schema = InputSchema::from_parameters(&parameters);
        ToolDescriptor {
            alias: alias.into(),
            name: name.into(),
            description: description.into(),
            parameters,
            invoke,
            returns_void,
            schema,
        }
    }

    /// The registry key this tool is invoked by.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The display name shown to clients.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description of the tool's purpose.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared parameters in invocation order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Whether the bound callable has no return value.
    pub fn returns_void(&self) -> bool {
        self.returns_void
    }

    pub(crate) fn schema(&self) -> &InputSchema {
        &self.schema
    }

    /// Runs the bound callable with already-coerced positional arguments.
    pub fn invoke(&self, args: &[ArgValue]) -> Option<String> {
        (self.invoke)(args)
    }
}

/// Errors produced by registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No tool is registered under the requested name.
    #[error("no tool registered under name {0:?}")]
    NotFound(String),
}

/// The shared tool registry.
///
/// Owned by the server orchestrator and shared with connection threads; all
/// access goes through a reader/writer lock. Registration order is
/// preserved so that `tools/list` is deterministic for client-side caching.
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

struct Inner {
    order: Vec<Arc<ToolDescriptor>>,
    index: HashMap<String, usize>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ToolRegistry {
            inner: RwLock::new(Inner {
                order: Vec::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Registers a tool under its alias.
    ///
    /// The first registration for an alias wins; a duplicate is logged and
    /// ignored rather than replacing the existing tool. Eligibility of the
    /// callable (the original restricts registration to free functions) is
    /// enforced by the discovering collaborator before a descriptor is
    /// built.
    pub fn register(&self, tool: ToolDescriptor) {
        let mut inner = self.inner.write().unwrap();
        if inner.index.contains_key(tool.alias()) {
            logging::log(&format!(
                "gantry: tool with alias {:?} already exists; ignoring duplicate registration",
                tool.alias()
            ));
            return;
        }
        let slot = inner.order.len();
        inner.index.insert(tool.alias().to_string(), slot);
        inner.order.push(Arc::new(tool));
    }

    /// Looks up a tool by alias.
    pub fn lookup(&self, name: &str) -> Result<Arc<ToolDescriptor>, RegistryError> {
        let inner = self.inner.read().unwrap();
        inner
            .index
            .get(name)
            .map(|slot| inner.order[*slot].clone())
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Snapshot of all registered tools, in registration order.
    pub fn list(&self) -> Vec<Arc<ToolDescriptor>> {
        self.inner.read().unwrap().order.clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().order.len()
    }

    /// Returns true when no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
