//! Typed in-process client.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{GraphQLRequest, TransportBridge};
use crate::engine::{ServerError, Variables};
use crate::error::ClientError;

/// A decoded response whose `data` is deserialized into `T`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,

    #[serde(default)]
    pub errors: Vec<ServerError>,
}

impl<T> GraphQLResponse<T> {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `data` when the response carries no errors.
    ///
    /// # Errors
    ///
    /// Returns the error list when any error was reported.
    pub fn into_result(self) -> Result<Option<T>, Vec<ServerError>> {
        if self.errors.is_empty() {
            Ok(self.data)
        } else {
            Err(self.errors)
        }
    }
}

/// Client issuing JSON requests through [`TransportBridge::handle`] and
/// decoding the `data` payload into caller-defined types.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    bridge: TransportBridge,
}

impl BridgeClient {
    #[must_use]
    pub fn new(bridge: TransportBridge) -> Self {
        Self { bridge }
    }

    /// Executes `query` with `variables` (any value serializing to a JSON
    /// object, or `()` / `None` for none).
    ///
    /// # Errors
    ///
    /// Fails when the variables cannot be encoded, the bridge rejects the
    /// request body, or `data` does not match `T`.
    pub async fn execute<T, V>(
        &self,
        query: &str,
        variables: V,
    ) -> Result<GraphQLResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        self.execute_operation(query, None, variables).await
    }

    /// Like [`execute`](Self::execute), selecting an operation by name.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_operation<T, V>(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: V,
    ) -> Result<GraphQLResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        V: Serialize,
    {
        let variables = match serde_json::to_value(variables).map_err(ClientError::Encode)? {
            serde_json::Value::Object(map) => map,
            _ => Variables::new(),
        };
        let mut request = GraphQLRequest::new(query).variables(variables);
        if let Some(name) = operation_name {
            request = request.operation_name(name);
        }

        let body = request.to_vec().map_err(ClientError::Encode)?;
        let response = self.bridge.handle(&body).await;
        if !response.status.is_success() {
            let message = response
                .json()
                .ok()
                .and_then(|body| body["errors"][0]["message"].as_str().map(str::to_owned))
                .unwrap_or_default();
            return Err(ClientError::Rejected {
                status: response.status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&response.body).map_err(ClientError::Decode)
    }
}
