use std::io;

use thiserror::Error;

/// Errors raised while registering routes, dispatching requests or running
/// the transport.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Request body of {length} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { length: u64, limit: usize },

    #[error("Request head exceeds the {0} byte limit")]
    HeadersTooLarge(usize),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Route validation failed with {} issue(s)", .0.len())]
    InvalidRoutes(Vec<RouteIssue>),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Panic: {0}")]
    PanicError(String),
}

impl ServerError {
    /// Status sent to the client when the transport rejects a request.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::ParseError(_) => 400,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::HeadersTooLarge(_) => 431,
            _ => 500,
        }
    }
}

/// A structural problem found while inserting a route into the trie.
///
/// Issues never abort registration: the trie keeps whatever was inserted
/// before the problem was found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteIssue {
    #[error("handler already registered for route {route}")]
    DuplicateHandler { route: String },

    #[error("path variable mismatch on route {route}: branch binds `{existing}`, tried to register `{requested}`")]
    VariableMismatch {
        route: String,
        existing: String,
        requested: String,
    },

    #[error("splat segment on route {route} is followed by {remaining} more segment(s)")]
    NonTerminalSplat { route: String, remaining: usize },

    #[error("path variable on route {route} added beside {siblings} sibling(s)")]
    AmbiguousSiblings { route: String, siblings: usize },
}

pub type ServerResult<T> = Result<T, ServerError>;
