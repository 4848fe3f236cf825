//! `pagegraph-core` — document node model, schema registry and the
//! resolution engine that answers GraphQL queries over fetched pages.

pub mod engine;
pub mod error;
pub mod node;
pub mod protocol;
pub mod query;
pub mod schema;
pub mod selection;
pub mod source;

pub use engine::{Executor, NodeValue, TYPENAME_FIELD};
pub use error::{FetchError, FieldError, QueryError, SelectorError};
pub use node::Node;
pub use protocol::{Location, PathSegment, QueryRequest, Response, ResponseError};
pub use query::PreparedQuery;
pub use schema::{ArgDef, ArgType, Capability, FieldDef, ReturnShape, Schema, ShapeKind, TypeDef};
pub use selection::Selection;
pub use source::{DocumentSource, StaticSource};
