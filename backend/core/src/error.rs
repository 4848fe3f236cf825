use thiserror::Error;

/// Failure to retrieve or decode a document for a `page` field.
///
/// Every variant is surfaced to callers the same way: as a single fetch
/// failure on the field that requested the document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unsupported url scheme \"{0}\"")]
    UnsupportedScheme(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("no document registered for this url")]
    NotFound,
}

/// A CSS selector string that could not be compiled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid selector \"{selector}\": {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

impl SelectorError {
    pub fn new(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            reason: reason.into(),
        }
    }
}

/// Request-level failures. When one of these occurs no field is resolved and
/// the response carries no `data`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Syntax error: {0}")]
    Parse(String),

    #[error("Must provide an operation.")]
    NoOperation,

    #[error("Must provide operation name if query contains multiple operations.")]
    AmbiguousOperation,

    #[error("Unknown operation named \"{0}\".")]
    UnknownOperation(String),

    #[error("{0} operations are not supported; the schema is read-only.")]
    UnsupportedOperation(&'static str),

    #[error("Variable \"${name}\" of required type \"{ty}\" was not provided.")]
    MissingVariable { name: String, ty: String },

    #[error("Variable \"${name}\" got invalid value: {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("Cannot spread fragment \"{0}\" within itself.")]
    FragmentCycle(String),
}

/// Errors attached to a single field position. The field resolves to null and
/// sibling fields keep resolving.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("Cannot query field \"{field}\" on type \"{type_name}\".")]
    UnknownField { field: String, type_name: String },

    #[error("Unknown argument \"{argument}\" on field \"{type_name}.{field}\".")]
    UnknownArgument {
        argument: String,
        field: String,
        type_name: String,
    },

    #[error("Field \"{type_name}.{field}\" argument \"{argument}\" of type \"String!\" is required but not provided.")]
    MissingArgument {
        argument: String,
        field: String,
        type_name: String,
    },

    #[error("Argument \"{argument}\" on field \"{field}\" has an invalid value: {reason}")]
    InvalidArgument {
        argument: String,
        field: String,
        reason: String,
    },

    #[error(transparent)]
    InvalidSelector(#[from] SelectorError),

    #[error("Unknown fragment \"{0}\".")]
    UnknownFragment(String),

    #[error("Unknown type \"{0}\".")]
    UnknownType(String),

    #[error("Unknown directive \"@{0}\".")]
    UnknownDirective(String),

    #[error("Fields \"{key}\" conflict because {reason}. Use different aliases on the fields to fetch both if this was intentional.")]
    FieldConflict { key: String, reason: String },

    #[error("Variable \"${0}\" is not defined.")]
    UndefinedVariable(String),

    #[error("failed to fetch {url}: {source}")]
    Fetch { url: String, source: FetchError },
}
