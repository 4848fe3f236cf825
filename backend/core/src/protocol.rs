//! GraphQL-over-HTTP request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::QueryError;

/// A query document plus its execution parameters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// One step of a response path: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
}

impl ResponseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
        }
    }
}

/// The value tree and every error raised while producing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResponseError>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<QueryError> for Response {
    fn from(err: QueryError) -> Self {
        Self {
            data: None,
            errors: vec![ResponseError::new(err.to_string())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_graphql_http_body() {
        let req: QueryRequest = serde_json::from_value(json!({
            "query": "{ page(url: $u) { title } }",
            "operationName": null,
            "variables": { "u": "http://example.com" }
        }))
        .unwrap();
        assert!(req.operation_name.is_none());
        assert_eq!(req.variables.unwrap()["u"], "http://example.com");
    }

    #[test]
    fn test_response_serialization_skips_empty_parts() {
        let ok = Response {
            data: Some(json!({ "page": null })),
            errors: vec![],
        };
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "data": { "page": null } }));

        let failed = Response::from(QueryError::NoOperation);
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({ "errors": [{ "message": "Must provide an operation." }] })
        );
    }

    #[test]
    fn test_path_segments_serialize_untagged() {
        let err = ResponseError {
            message: "boom".into(),
            locations: vec![Location { line: 1, column: 3 }],
            path: vec![PathSegment::Key("page".into()), PathSegment::Index(2)],
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "message": "boom", "locations": [{ "line": 1, "column": 3 }], "path": ["page", 2] })
        );
    }
}
