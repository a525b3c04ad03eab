//! # gqlstack
//!
//! A small in-process GraphQL stack with lifetime-aware service injection.
//!
//! Resolvers declare the capabilities they need; the [`registry`] builds
//! them with either a singleton or a per-request (scoped) lifetime. Requests
//! enter through the [`bridge`], which behaves like an HTTP endpoint
//! (status plus JSON body) without opening a socket, so the whole stack can
//! be exercised from tests.
//!
//! ## Overview
//!
//! ```text
//! bridge ──► engine ──► resolver ──► registry scope
//!   ▲                                      │
//!   └──────────── data / errors ◄──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`registry`] - Capability registration and per-request scopes
//! - [`schema`] - Code-first type declarations and schema validation
//! - [`engine`] - Parsing, validation and execution
//! - [`bridge`] - Transport-shaped entry point and typed client
//! - [`services`] - Example person and counter services
//! - [`stack`] - Wiring from configuration
//! - [`config`] - Configuration options
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```ignore
//! let stack = GqlStack::with_defaults(StackConfig::default())?;
//! let response = stack
//!     .bridge()
//!     .handle(br#"{"query": "mutation { add(count: 3) }"}"#)
//!     .await;
//! assert_eq!(response.status, 200);
//! ```

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod schema;
pub mod services;
pub mod stack;

// Re-export main types
pub use bridge::{BridgeClient, BridgeResponse, GraphQLRequest, GraphQLResponse, TransportBridge};
pub use config::{StackConfig, load_config};
pub use engine::{ExecutionResponse, ServerError};
pub use error::{ClientError, RegistryError, SchemaError, StackError, TransportError};
pub use registry::{Capability, Lifetime, ServiceRegistry, ServiceScope};
pub use schema::{Schema, SchemaBuilder};
pub use stack::GqlStack;

/// Result type for stack startup.
pub type Result<T> = std::result::Result<T, StackError>;
