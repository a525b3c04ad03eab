//! Execution engine.
//!
//! Parsing is delegated to `async-graphql-parser`; everything after the
//! parse (operation selection, validation, argument coercion, capability
//! injection, resolver invocation, value completion) happens here.
//!
//! Failure isolation follows GraphQL semantics:
//! - malformed documents and validation failures abort the request and the
//!   response has no `data`,
//! - resolver errors, panics, timeouts and argument coercion failures are
//!   recorded per field and only null the affected position (propagating to
//!   the nearest nullable parent).

mod coerce;
mod executor;
mod response;
mod validate;

use std::collections::HashMap;

use async_graphql_parser::Positioned;
use async_graphql_parser::types::{
    DocumentOperations, ExecutableDocument, OperationDefinition, OperationType,
};
use async_graphql_value::ConstValue;
use tracing::debug;

pub use response::{ErrorExtensions, ExecutionResponse, Location, PathSegment, ServerError};

use crate::registry::ServiceScope;
use crate::schema::Schema;

/// A parsed query document.
#[derive(Debug, Clone)]
pub struct Document {
    inner: ExecutableDocument,
}

impl Document {
    /// Operation names defined in the document, if any are named.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        match &self.inner.operations {
            DocumentOperations::Single(_) => Vec::new(),
            DocumentOperations::Multiple(ops) => ops.keys().map(|n| n.as_str()).collect(),
        }
    }
}

/// Parses a query string.
///
/// # Errors
///
/// Returns a document-level error with the offending locations.
pub fn parse(query: &str) -> Result<Document, ServerError> {
    async_graphql_parser::parse_query(query)
        .map(|inner| Document { inner })
        .map_err(|err| {
            let mut error = ServerError::new(err.to_string()).with_code("GRAPHQL_PARSE_FAILED");
            error.locations = err.positions().map(Into::into).collect();
            error
        })
}

/// Variable values supplied with a request.
pub type Variables = serde_json::Map<String, serde_json::Value>;

/// Executes `document` against `schema`, resolving capabilities from
/// `scope`.
pub async fn execute(
    schema: &Schema,
    document: &Document,
    variables: &Variables,
    operation_name: Option<&str>,
    scope: &ServiceScope,
) -> ExecutionResponse {
    let operation = match select_operation(&document.inner, operation_name) {
        Ok(op) => op,
        Err(err) => return ExecutionResponse::from_errors(vec![err]),
    };

    let root = match operation.node.ty {
        OperationType::Query => schema.query_type(),
        OperationType::Mutation => match schema.mutation_type() {
            Some(mutation) => mutation,
            None => {
                return ExecutionResponse::from_errors(vec![
                    ServerError::new("Schema is not configured for mutations")
                        .at(operation.pos)
                        .with_code("OPERATION_NOT_SUPPORTED"),
                ]);
            }
        },
        OperationType::Subscription => {
            return ExecutionResponse::from_errors(vec![
                ServerError::new("Subscriptions are not supported")
                    .at(operation.pos)
                    .with_code("OPERATION_NOT_SUPPORTED"),
            ]);
        }
    };

    if let Err(errors) =
        validate::validate(schema, &document.inner, root, &operation.node.selection_set)
    {
        debug!(errors = errors.len(), "Document failed validation");
        return ExecutionResponse::from_errors(errors);
    }

    let variables = collect_variables(&operation.node, variables);
    let ctx = executor::ExecutionContext::new(schema, &document.inner, variables, scope);
    let serial = operation.node.ty == OperationType::Mutation;
    let data = ctx
        .execute_root(root, &operation.node.selection_set, serial)
        .await;

    ExecutionResponse {
        data: Some(data),
        errors: ctx.into_errors(),
    }
}

fn select_operation<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<&'a Positioned<OperationDefinition>, ServerError> {
    match (&document.operations, operation_name) {
        (DocumentOperations::Single(op), None) => Ok(op),
        (DocumentOperations::Multiple(ops), None) if ops.len() == 1 => ops
            .values()
            .next()
            .ok_or_else(|| ServerError::new("Document contains no operations")),
        (DocumentOperations::Multiple(_), None) => Err(ServerError::new(
            "Operation name required in request",
        )
        .with_code("OPERATION_RESOLUTION_FAILURE")),
        (DocumentOperations::Multiple(ops), Some(name)) => ops.get(name).ok_or_else(|| {
            ServerError::new(format!("Unknown operation named \"{name}\""))
                .with_code("OPERATION_RESOLUTION_FAILURE")
        }),
        (DocumentOperations::Single(_), Some(name)) => Err(ServerError::new(format!(
            "Unknown operation named \"{name}\""
        ))
        .with_code("OPERATION_RESOLUTION_FAILURE")),
    }
}

/// Merges supplied variables with the operation's declared defaults.
///
/// Variables that are neither supplied nor defaulted stay absent, so
/// arguments bound to them fall back to the argument default.
fn collect_variables(
    operation: &OperationDefinition,
    supplied: &Variables,
) -> HashMap<String, ConstValue> {
    let mut values = HashMap::new();
    for definition in &operation.variable_definitions {
        let name = definition.node.name.node.as_str();
        let value = match supplied.get(name) {
            Some(json) => ConstValue::from_json(json.clone()).ok(),
            None => definition
                .node
                .default_value
                .as_ref()
                .map(|default| default.node.clone()),
        };
        if let Some(value) = value {
            values.insert(name.to_string(), value);
        }
    }
    values
}
