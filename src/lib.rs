//! # Trellis
//!
//! An embeddable HTTP router built around a prefix trie.
//!
//! ## Features
//!
//! - Literal, `:param` and `*` splat path segments
//! - Request and response inspectors attached to any node of the trie
//! - Handlers that complete synchronously or asynchronously
//! - Static directory mounting, optionally memoized with entity tags
//! - Graceful shutdown with ordered cleanup callbacks
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use trellis::{Application, Completion, Context, Request, Response, Router, ServerConfig};
//!
//! fn main() -> trellis::ServerResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     let mut router = Router::default();
//!     router.run_mode(config.run_mode);
//!
//!     router.get("/users/:id", |_req: Arc<Request>, ctx: Arc<Context>| {
//!         let id = ctx.path_variable("id").unwrap_or_default().to_string();
//!         Completion::ready(Response::text(format!("user {id}")))
//!     });
//!     router.mount_memoized_files("/static/", "public")?;
//!
//!     Application::new(router, config).listen()
//! }
//! ```
//!
//! ## Inspectors
//!
//! ```rust
//! use trellis::inspector::{SecurityConfig, SecurityHeaders};
//! use trellis::Router;
//!
//! let mut router = Router::default();
//! router.add_all_inspector("", SecurityHeaders::inspector(SecurityConfig::default()));
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod files;
pub mod handler;
pub mod http;
pub mod inspector;
pub mod router;
pub extern crate serde_json;

pub use app::Application;
pub use config::{RunMode, ServerConfig};
pub use context::Context;
pub use dispatch::dispatch;
pub use error::{RouteIssue, ServerError, ServerResult};
pub use handler::{Completion, Handler, IntoCompletion, SharedHandler};
pub use http::{Body, Method, Request, Response};
pub use inspector::{Inspector, RequestInspectorResponse};
pub use router::{RouteNode, Router};

// Reexport serde_json
pub use serde_json::{json, Value};
