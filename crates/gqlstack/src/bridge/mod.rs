//! In-process transport bridge.
//!
//! Accepts transport-shaped requests (a JSON body, or an `http::Request`)
//! and returns a status plus a JSON body, exactly as an HTTP endpoint would,
//! without a network listener. Every call opens its own service scope and
//! drops it when the response has been serialized.

mod client;
mod request;

use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub use client::{BridgeClient, GraphQLResponse};
pub use request::GraphQLRequest;

use crate::config::TransportConfig;
use crate::engine::{self, ExecutionResponse, ServerError};
use crate::error::TransportError;
use crate::schema::Schema;

const APPLICATION_JSON: &str = "application/json";

/// Status and JSON body produced by one bridge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl BridgeResponse {
    /// Decodes the body as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    /// Converts into an `http::Response` with a JSON content type.
    #[must_use]
    pub fn into_http(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_JSON),
        );
        if self.status == StatusCode::METHOD_NOT_ALLOWED {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, POST"));
        }
        response
    }

    fn from_transport_error(err: &TransportError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        let response = ExecutionResponse::from_errors(vec![
            ServerError::new(err.to_string()).with_code(err.error_code()),
        ]);
        Self::serialize(status, &response)
    }

    fn serialize(status: StatusCode, response: &ExecutionResponse) -> Self {
        match serde_json::to_vec(response) {
            Ok(body) => Self {
                status,
                body: Bytes::from(body),
            },
            Err(err) => {
                error!(error = %err, "Failed to serialize GraphQL response");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: Bytes::from_static(
                        br#"{"errors":[{"message":"Failed to serialize response","extensions":{"code":"INTERNAL_SERVER_ERROR"}}]}"#,
                    ),
                }
            }
        }
    }
}

/// Entry point accepting transport-shaped requests.
///
/// Cheap to clone; clones share the schema and its registry.
#[derive(Debug, Clone)]
pub struct TransportBridge {
    schema: Schema,
    config: Arc<TransportConfig>,
}

impl TransportBridge {
    #[must_use]
    pub fn new(schema: Schema, config: TransportConfig) -> Self {
        Self {
            schema,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Handles one request body of the form
    /// `{"query": ..., "variables"?: ..., "operationName"?: ...}`.
    ///
    /// Transport-level failures yield a 4xx status with an `errors` body;
    /// everything else yields 200, including documents that fail to parse.
    pub async fn handle(&self, body: &[u8]) -> BridgeResponse {
        if body.len() > self.config.max_body_bytes {
            let err = TransportError::PayloadTooLarge {
                actual: body.len(),
                max: self.config.max_body_bytes,
            };
            warn!(error = %err, "Rejecting GraphQL request");
            return BridgeResponse::from_transport_error(&err);
        }

        match GraphQLRequest::from_slice(body) {
            Ok(request) => self.execute(request).await,
            Err(err) => {
                debug!(error = %err, "Malformed GraphQL request");
                BridgeResponse::from_transport_error(&err)
            }
        }
    }

    /// Handles an HTTP-shaped request: POST with a JSON body, or GET with
    /// URL parameters. Other methods yield 405.
    pub async fn handle_http(&self, request: http::Request<Bytes>) -> http::Response<Bytes> {
        let response = match *request.method() {
            Method::POST => self.handle(request.body()).await,
            Method::GET => {
                match GraphQLRequest::from_query_string(request.uri().query().unwrap_or_default())
                {
                    Ok(graphql) => self.execute(graphql).await,
                    Err(err) => {
                        debug!(error = %err, "Malformed GraphQL GET request");
                        BridgeResponse::from_transport_error(&err)
                    }
                }
            }
            ref other => {
                BridgeResponse::from_transport_error(&TransportError::MethodNotAllowed(
                    other.to_string(),
                ))
            }
        };
        response.into_http()
    }

    /// Runs one call on its own task.
    pub fn spawn(&self, body: impl Into<Bytes>) -> JoinHandle<BridgeResponse> {
        let bridge = self.clone();
        let body = body.into();
        tokio::spawn(async move { bridge.handle(&body).await })
    }

    /// Executes an already decoded request inside a fresh service scope.
    pub async fn execute(&self, request: GraphQLRequest) -> BridgeResponse {
        let scope = self.schema.registry().create_scope();
        debug!(
            request_id = %scope.request_id(),
            operation = ?request.operation_name,
            "Processing GraphQL request"
        );

        let response = match engine::parse(&request.query) {
            Ok(document) => {
                engine::execute(
                    &self.schema,
                    &document,
                    &request.variables,
                    request.operation_name.as_deref(),
                    &scope,
                )
                .await
            }
            Err(err) => {
                debug!(request_id = %scope.request_id(), error = %err.message, "Query failed to parse");
                ExecutionResponse::from_errors(vec![err])
            }
        };

        debug!(
            request_id = %scope.request_id(),
            errors = response.errors.len(),
            scoped_instances = scope.resolved_count(),
            "GraphQL request complete"
        );
        drop(scope);

        BridgeResponse::serialize(StatusCode::OK, &response)
    }
}
