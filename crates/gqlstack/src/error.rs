//! Error types for the GraphQL stack.
//!
//! Startup failures (registry and schema problems) are fatal and surface as
//! [`StackError`]. Request-time failures never escape the transport bridge:
//! [`TransportError`] maps to a 4xx response, while document and field
//! failures are reported inside the GraphQL `errors` array.

use thiserror::Error;

/// Configuration errors raised by the service registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The same capability name was registered twice.
    #[error("Capability '{0}' is already registered")]
    DuplicateCapability(String),

    /// A capability was requested that nothing registered.
    #[error("Capability '{0}' is not registered")]
    UnregisteredCapability(String),

    /// The capability exists but was registered with a different type.
    #[error("Capability '{name}' is not of type {expected}")]
    TypeMismatch {
        /// Capability name.
        name: String,
        /// Requested Rust type.
        expected: &'static str,
    },
}

/// Errors raised while assembling a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Schema has no query type")]
    MissingQueryType,

    #[error("Type '{0}' is defined more than once")]
    DuplicateType(String),

    #[error("Field '{type_name}.{field}' is defined more than once")]
    DuplicateField { type_name: String, field: String },

    #[error("Type '{0}' must define at least one field")]
    EmptyType(String),

    #[error("Field '{type_name}.{field}' refers to unknown type '{referenced}'")]
    UnknownType {
        type_name: String,
        field: String,
        referenced: String,
    },

    #[error("Argument '{argument}' of '{type_name}.{field}' must be a scalar, found '{referenced}'")]
    InvalidArgumentType {
        type_name: String,
        field: String,
        argument: String,
        referenced: String,
    },

    #[error("Field '{type_name}.{field}' requires capability '{capability}' which is not registered")]
    MissingCapability {
        type_name: String,
        field: String,
        capability: String,
    },

    #[error("Root field '{type_name}.{field}' has no resolver")]
    MissingResolver { type_name: String, field: String },
}

/// Failures decoding an inbound transport request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Request is missing the 'query' string")]
    MissingQuery,

    #[error("'variables' must be a JSON object")]
    InvalidVariables,

    #[error("'operationName' must be a string")]
    InvalidOperationName,

    #[error("Request body of {actual} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { actual: usize, max: usize },

    #[error("Method {0} is not allowed, use GET or POST")]
    MethodNotAllowed(String),
}

impl TransportError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::PayloadTooLarge { .. } => 413,
            Self::MethodNotAllowed(_) => 405,
            _ => 400,
        }
    }

    /// Returns the error code placed in the error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) | Self::NotAnObject => "INVALID_JSON",
            Self::MissingQuery => "MISSING_QUERY",
            Self::InvalidVariables => "INVALID_VARIABLES",
            Self::InvalidOperationName => "INVALID_OPERATION_NAME",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
        }
    }
}

/// Errors surfaced by the typed in-process client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The bridge rejected the request before execution.
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to encode variables: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Fatal errors that prevent the stack from starting.
#[derive(Debug, Error)]
pub enum StackError {
    #[error("Configuration error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for StackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
