//! GraphQL over HTTP.
//!
//! `POST /graphql` takes a JSON body; `GET /graphql` takes `query`,
//! `operationName` and JSON-encoded `variables` as URL parameters. A GET
//! without `query` falls through to GraphiQL.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use logging::{QueryEvent, QueryEventLogger};
use pagegraph_core::{Executor, QueryRequest, Response as GraphQLResponse, ResponseError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::playground;
use crate::server::GatewayState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLGetParams {
    pub query: Option<String>,
    pub operation_name: Option<String>,
    pub variables: Option<String>,
}

/// Handler for `GET /graphql`
pub async fn graphql_get(
    State(state): State<GatewayState>,
    Query(params): Query<GraphQLGetParams>,
) -> Response {
    let Some(query) = params.query.filter(|q| !q.trim().is_empty()) else {
        return playground::graphiql().await.into_response();
    };

    let variables = match params.variables.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(map) => Some(map),
            Err(e) => {
                let body = error_body(format!("Variables are invalid JSON: {e}"));
                return json_response(&state, StatusCode::BAD_REQUEST, &body);
            }
        },
    };

    let request = QueryRequest {
        query,
        operation_name: params.operation_name,
        variables,
    };
    execute(state, request).await
}

/// Handler for `POST /graphql`
pub async fn graphql_post(
    State(state): State<GatewayState>,
    Json(request): Json<QueryRequest>,
) -> Response {
    execute(state, request).await
}

/// Handler for `GET /schema`
pub async fn schema_sdl(State(state): State<GatewayState>) -> String {
    state.schema.sdl()
}

async fn execute(state: GatewayState, request: QueryRequest) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("graphql", request_id = %request_id);

    async move {
        let started = Instant::now();
        let executor = Executor::new(&state.schema, state.source.as_ref());
        let outcome = tokio::time::timeout(state.request_timeout, executor.execute(&request)).await;

        match outcome {
            Ok(response) => {
                QueryEventLogger::log_event(QueryEvent::Executed {
                    request_id,
                    operation: request.operation_name.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    errors: response.errors.iter().map(|e| e.message.clone()).collect(),
                });
                // Request-level failures carry no data.
                let status = if response.data.is_some() {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                };
                json_response(&state, status, &response)
            }
            Err(_) => {
                let timeout_ms = state.request_timeout.as_millis() as u64;
                warn!(timeout_ms, "Query timed out");
                QueryEventLogger::log_event(QueryEvent::TimedOut {
                    request_id,
                    timeout_ms,
                });
                let body = error_body(format!("Query timed out after {timeout_ms} ms"));
                json_response(&state, StatusCode::GATEWAY_TIMEOUT, &body)
            }
        }
    }
    .instrument(span)
    .await
}

fn error_body(message: String) -> GraphQLResponse {
    GraphQLResponse {
        data: None,
        errors: vec![ResponseError::new(message)],
    }
}

fn json_response<T: Serialize>(state: &GatewayState, status: StatusCode, body: &T) -> Response {
    let text = if state.pretty {
        serde_json::to_string_pretty(body)
    } else {
        serde_json::to_string(body)
    };
    match text {
        Ok(text) => (status, [(header::CONTENT_TYPE, "application/json")], text).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::*;
    use crate::server::GatewayState;
    use async_trait::async_trait;
    use pagegraph_core::{DocumentSource, FetchError};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    struct SlowSource;

    #[async_trait]
    impl DocumentSource for SlowSource {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("<p>late</p>".into())
        }
    }

    async fn post(base: &str, body: Value) -> (reqwest::StatusCode, Value) {
        let resp = reqwest::Client::new()
            .post(format!("{base}/graphql"))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_post_query() {
        let base = spawn(fixture_state()).await;
        let (status, json) = post(
            &base,
            json!({ "query": format!(r#"{{ page(url: "{HOME}") {{ title items: query(selector: "li") {{ text }} }} }}"#) }),
        )
        .await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(
            json,
            json!({ "data": { "page": {
                "title": "Fixture",
                "items": [{ "text": "One" }, { "text": "Two" }]
            } } })
        );
    }

    #[tokio::test]
    async fn test_post_with_variables_and_operation_name() {
        let base = spawn(fixture_state()).await;
        let (status, json) = post(
            &base,
            json!({
                "query": "query A { __typename } query B($u: String!) { page(url: $u) { tag } }",
                "operationName": "B",
                "variables": { "u": HOME },
            }),
        )
        .await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(json, json!({ "data": { "page": { "tag": "#document" } } }));
    }

    #[tokio::test]
    async fn test_get_query_with_variables() {
        let base = spawn(fixture_state()).await;
        let variables = format!(r#"{{"u":"{HOME}"}}"#);
        let resp = reqwest::Client::new()
            .get(format!("{base}/graphql"))
            .query(&[
                ("query", "query($u: String!) { page(url: $u) { text(selector: \"li.b\") } }"),
                ("variables", variables.as_str()),
            ])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json, json!({ "data": { "page": { "text": "Two" } } }));
    }

    #[tokio::test]
    async fn test_get_with_bad_variables_is_rejected() {
        let base = spawn(fixture_state()).await;
        let resp = reqwest::Client::new()
            .get(format!("{base}/graphql"))
            .query(&[("query", "{ __typename }"), ("variables", "{nope")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_without_query_serves_graphiql() {
        let base = spawn(fixture_state()).await;
        let body = reqwest::get(format!("{base}/graphql"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("graphiql"));
    }

    #[tokio::test]
    async fn test_syntax_error_is_bad_request() {
        let base = spawn(fixture_state()).await;
        let (status, json) = post(&base, json!({ "query": "{ page(url: " })).await;
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
        assert!(json.get("data").is_none());
        assert!(!json["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_partial_data() {
        let base = spawn(fixture_state()).await;
        let (status, json) = post(
            &base,
            json!({ "query": format!(r#"{{ ok: page(url: "{HOME}") {{ title }} bad: page(url: "http://missing.test/") {{ title }} }}"#) }),
        )
        .await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(json["data"], json!({ "ok": { "title": "Fixture" }, "bad": null }));
        assert_eq!(json["errors"][0]["path"], json!(["bad"]));
    }

    #[tokio::test]
    async fn test_timeout_is_gateway_timeout() {
        let state = GatewayState::new(Arc::new(SlowSource))
            .with_request_timeout(Duration::from_millis(50))
            .with_pretty(false);
        let base = spawn(state).await;
        let (status, json) = post(
            &base,
            json!({ "query": r#"{ page(url: "http://slow.test/") { title } }"# }),
        )
        .await;
        assert_eq!(status, reqwest::StatusCode::GATEWAY_TIMEOUT);
        assert!(json["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("timed out"));
    }
}
