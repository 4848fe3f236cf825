//! pagegraph Gateway HTTP API Server
//!
//! Serves GraphQL over HTTP, the schema SDL, a GraphiQL explorer and a
//! health endpoint.

pub mod graphql_api;
pub mod health_api;
pub mod playground;
pub mod server;

pub use server::{build_router, start_server, GatewayState, DEFAULT_REQUEST_TIMEOUT};
