//! Method-keyed route tries plus the shared fallback handlers.
//!
//! Registration splits a path on `/` and walks the trie for the method,
//! creating nodes as it goes. Registration never fails outright: structural
//! problems are logged, recorded, and the route is left in whatever state the
//! walk reached. Call [`Router::validate`] to turn recorded issues into a
//! startup error.

mod node;

pub use node::{RouteNode, SPLAT};
pub(crate) use node::Attachment;

use crate::config::RunMode;
use crate::context::{path_segments, Context};
use crate::error::{RouteIssue, ServerError, ServerResult};
use crate::handler::{Completion, IntoCompletion, SharedHandler};
use crate::http::{Method, Request, Response};
use crate::inspector::Inspector;
use log::{debug, error};
use serde::Serialize;
use std::sync::Arc;

pub struct Router {
    get_routes: RouteNode,
    head_routes: RouteNode,
    post_routes: RouteNode,
    not_found_handler: SharedHandler,
    server_error_handler: SharedHandler,
    issues: Vec<RouteIssue>,
    pub(crate) run_mode: RunMode,
}

impl Router {
    pub fn new(not_found_handler: SharedHandler, server_error_handler: SharedHandler) -> Self {
        Self {
            get_routes: RouteNode::new(),
            head_routes: RouteNode::new(),
            post_routes: RouteNode::new(),
            not_found_handler,
            server_error_handler,
            issues: Vec::new(),
            run_mode: RunMode::default(),
        }
    }

    /// Selects how [`Router::mount_memoized_files`] serves files.
    pub fn run_mode(&mut self, run_mode: RunMode) -> &mut Self {
        self.run_mode = run_mode;
        self
    }

    /// 200 response with a JSON body and a `text/json` content type.
    pub fn json_response<T: Serialize>(data: &T) -> ServerResult<Response> {
        let body = serde_json::to_vec(data)?;
        let mut response = Response::new(200);
        response
            .header("Content-Type", "text/json; charset=utf-8")
            .body(body);
        Ok(response)
    }

    pub fn get<F, R>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Arc<Request>, Arc<Context>) -> R + Send + Sync + 'static,
        R: IntoCompletion<Response>,
    {
        self.route(&Method::GET, path, Arc::new(handler));
        self
    }

    pub fn head<F, R>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Arc<Request>, Arc<Context>) -> R + Send + Sync + 'static,
        R: IntoCompletion<Response>,
    {
        self.route(&Method::HEAD, path, Arc::new(handler));
        self
    }

    pub fn post<F, R>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(Arc<Request>, Arc<Context>) -> R + Send + Sync + 'static,
        R: IntoCompletion<Response>,
    {
        self.route(&Method::POST, path, Arc::new(handler));
        self
    }

    /// Registers an already shared handler and returns the issues this
    /// registration produced.
    pub fn route(&mut self, method: &Method, path: &str, handler: SharedHandler) -> &[RouteIssue] {
        self.insert(method, path, Attachment::Handler(handler))
    }

    /// Attaches an inspector to the node `path` ends on and returns the
    /// issues this registration produced.
    pub fn inspect(
        &mut self,
        method: &Method,
        path: &str,
        inspector: impl Into<Arc<Inspector>>,
    ) -> &[RouteIssue] {
        self.insert(method, path, Attachment::Inspector(inspector.into()))
    }

    pub fn add_get_inspector(&mut self, path: &str, inspector: impl Into<Arc<Inspector>>) -> &mut Self {
        self.inspect(&Method::GET, path, inspector);
        self
    }

    pub fn add_head_inspector(&mut self, path: &str, inspector: impl Into<Arc<Inspector>>) -> &mut Self {
        self.inspect(&Method::HEAD, path, inspector);
        self
    }

    pub fn add_post_inspector(&mut self, path: &str, inspector: impl Into<Arc<Inspector>>) -> &mut Self {
        self.inspect(&Method::POST, path, inspector);
        self
    }

    /// Registers one inspector instance on all three tries; the instance is
    /// shared, not copied.
    pub fn add_all_inspector(&mut self, path: &str, inspector: impl Into<Arc<Inspector>>) -> &mut Self {
        let inspector = inspector.into();
        self.inspect(&Method::GET, path, Arc::clone(&inspector));
        self.inspect(&Method::HEAD, path, Arc::clone(&inspector));
        self.inspect(&Method::POST, path, inspector);
        self
    }

    fn insert(&mut self, method: &Method, path: &str, attachment: Attachment) -> &[RouteIssue] {
        let start = self.issues.len();
        let root = match method {
            Method::GET => &mut self.get_routes,
            Method::HEAD => &mut self.head_routes,
            Method::POST => &mut self.post_routes,
            other => {
                error!("Cannot register {path}: unsupported method {other}");
                return &[];
            }
        };

        let segments = path_segments(path);
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let mut found = Vec::new();
        root.insert(&segments, attachment, path, &mut found);

        for issue in &found {
            error!("Route validation error: {method} {issue}");
        }
        if found.is_empty() {
            debug!("Registered {method} {path}");
        }
        self.issues.extend(found);
        &self.issues[start..]
    }

    pub fn root(&self, method: &Method) -> Option<&RouteNode> {
        match method {
            Method::GET => Some(&self.get_routes),
            Method::HEAD => Some(&self.head_routes),
            Method::POST => Some(&self.post_routes),
            _ => None,
        }
    }

    pub fn not_found_handler(&self) -> &SharedHandler {
        &self.not_found_handler
    }

    pub fn server_error_handler(&self) -> &SharedHandler {
        &self.server_error_handler
    }

    /// Every structural issue recorded since the router was created.
    pub fn issues(&self) -> &[RouteIssue] {
        &self.issues
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ServerError::InvalidRoutes(self.issues.clone()))
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(Arc::new(not_found), Arc::new(server_error))
    }
}

/// Default not-found handler.
pub fn not_found(_req: Arc<Request>, _ctx: Arc<Context>) -> Completion<Response> {
    let mut response = Response::html("<!DOCTYPE html><html><body>Not Found</body></html>");
    response.status(404);
    Completion::ready(response)
}

/// Default server-error handler.
pub fn server_error(_req: Arc<Request>, _ctx: Arc<Context>) -> Completion<Response> {
    Completion::ready(Response::internal_error())
}
