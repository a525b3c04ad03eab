//! Transport request decoding.

use serde::Serialize;
use serde_json::Value;

use crate::engine::Variables;
use crate::error::TransportError;

/// A decoded GraphQL request. Serializes to the JSON body shape that
/// [`from_slice`](Self::from_slice) accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    /// The GraphQL query string.
    pub query: String,

    /// Operation to run when the document defines several.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    /// Variable values. Absent and `null` both decode to an empty map.
    pub variables: Variables,
}

impl GraphQLRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: Variables::new(),
        }
    }

    #[must_use]
    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Encodes the request as a JSON body.
    ///
    /// # Errors
    ///
    /// Fails only if a variable value cannot be serialized.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a JSON request body.
    ///
    /// # Errors
    ///
    /// Fails when the body is not a JSON object, `query` is missing or not a
    /// string, or `variables` / `operationName` have the wrong shape.
    pub fn from_slice(body: &[u8]) -> Result<Self, TransportError> {
        let value: Value = serde_json::from_slice(body).map_err(TransportError::InvalidJson)?;
        let Value::Object(mut object) = value else {
            return Err(TransportError::NotAnObject);
        };

        let query = match object.remove("query") {
            Some(Value::String(query)) => query,
            _ => return Err(TransportError::MissingQuery),
        };
        let variables = match object.remove("variables") {
            None | Some(Value::Null) => Variables::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(TransportError::InvalidVariables),
        };
        let operation_name = match object.remove("operationName") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name),
            Some(_) => return Err(TransportError::InvalidOperationName),
        };

        Ok(Self {
            query,
            operation_name,
            variables,
        })
    }

    /// Decodes the URL query string of a GET request. `variables` is a JSON
    /// encoded object.
    ///
    /// # Errors
    ///
    /// Fails when `query` is missing or `variables` is not a JSON object.
    pub fn from_query_string(query_string: &str) -> Result<Self, TransportError> {
        let params = GraphQLQueryParams::parse(query_string);

        let query = params.query.ok_or(TransportError::MissingQuery)?;
        let variables = match params.variables.as_deref() {
            None | Some("") | Some("null") => Variables::new(),
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                _ => return Err(TransportError::InvalidVariables),
            },
        };

        Ok(Self {
            query,
            operation_name: params.operation_name.filter(|name| !name.is_empty()),
            variables,
        })
    }
}

/// Query parameters for GET requests.
#[derive(Debug, Default)]
struct GraphQLQueryParams {
    query: Option<String>,
    operation_name: Option<String>,

    /// JSON-encoded variables object.
    variables: Option<String>,
}

impl GraphQLQueryParams {
    fn parse(query_string: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
            match key.as_ref() {
                "query" => params.query = Some(value.into_owned()),
                "operationName" => params.operation_name = Some(value.into_owned()),
                "variables" => params.variables = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}
