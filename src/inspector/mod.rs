//! Inspectors are the middleware of the trie: a pair of optional callbacks
//! attached to a route node and run for every request whose path passes
//! through that node.
//!
//! The request phase runs on the way down, in registration order, and may
//! answer the request itself. The response phase is collected on the way
//! down and applied, in the same order, to whatever response ends the
//! request.

mod logger;
mod security;

pub use logger::RequestLogger;
pub use security::{SecurityConfig, SecurityHeaders};

use crate::context::Context;
use crate::handler::{Completion, IntoCompletion};
use crate::http::{Request, Response};
use std::sync::Arc;

/// Verdict of a request-phase inspector.
///
/// Valid states are "continue, no response" and "stop with this response".
/// "Stop without a response" is representable but is a contract violation
/// that the dispatcher answers with the server-error handler.
#[derive(Debug)]
pub struct RequestInspectorResponse {
    pub should_continue: bool,
    pub response: Option<Response>,
}

impl RequestInspectorResponse {
    pub fn proceed() -> Self {
        Self {
            should_continue: true,
            response: None,
        }
    }

    pub fn respond(response: Response) -> Self {
        Self {
            should_continue: false,
            response: Some(response),
        }
    }

    pub fn halt() -> Self {
        Self {
            should_continue: false,
            response: None,
        }
    }
}

pub trait RequestInspector: Send + Sync + 'static {
    fn inspect(&self, req: Arc<Request>, ctx: Arc<Context>) -> Completion<RequestInspectorResponse>;
}

impl<F, R> RequestInspector for F
where
    F: Fn(Arc<Request>, Arc<Context>) -> R + Send + Sync + 'static,
    R: IntoCompletion<RequestInspectorResponse>,
{
    fn inspect(&self, req: Arc<Request>, ctx: Arc<Context>) -> Completion<RequestInspectorResponse> {
        (self)(req, ctx).into_completion()
    }
}

/// Response-phase callback. It receives the response by value and hands back
/// the response that continues down the chain.
pub trait ResponseInspector: Send + Sync + 'static {
    fn inspect(&self, req: Arc<Request>, res: Response, ctx: Arc<Context>) -> Completion<Response>;
}

impl<F, R> ResponseInspector for F
where
    F: Fn(Arc<Request>, Response, Arc<Context>) -> R + Send + Sync + 'static,
    R: IntoCompletion<Response>,
{
    fn inspect(&self, req: Arc<Request>, res: Response, ctx: Arc<Context>) -> Completion<Response> {
        (self)(req, res, ctx).into_completion()
    }
}

#[derive(Clone, Default)]
pub struct Inspector {
    request: Option<Arc<dyn RequestInspector>>,
    response: Option<Arc<dyn ResponseInspector>>,
}

impl Inspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request<F, R>(mut self, inspector: F) -> Self
    where
        F: Fn(Arc<Request>, Arc<Context>) -> R + Send + Sync + 'static,
        R: IntoCompletion<RequestInspectorResponse>,
    {
        self.request = Some(Arc::new(inspector));
        self
    }

    pub fn on_response<F, R>(mut self, inspector: F) -> Self
    where
        F: Fn(Arc<Request>, Response, Arc<Context>) -> R + Send + Sync + 'static,
        R: IntoCompletion<Response>,
    {
        self.response = Some(Arc::new(inspector));
        self
    }

    pub fn with_request_inspector(mut self, inspector: impl RequestInspector) -> Self {
        self.request = Some(Arc::new(inspector));
        self
    }

    pub fn with_response_inspector(mut self, inspector: impl ResponseInspector) -> Self {
        self.response = Some(Arc::new(inspector));
        self
    }

    pub fn request_inspector(&self) -> Option<&Arc<dyn RequestInspector>> {
        self.request.as_ref()
    }

    pub fn response_inspector(&self) -> Option<&Arc<dyn ResponseInspector>> {
        self.response.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    #[tokio::test]
    async fn builder_sets_both_phases() {
        let inspector = Inspector::new()
            .on_request(|_req: Arc<Request>, _ctx: Arc<Context>| {
                Completion::ready(RequestInspectorResponse::proceed())
            })
            .on_response(|_req: Arc<Request>, mut res: Response, _ctx: Arc<Context>| {
                res.header("x-seen", "1");
                Completion::ready(res)
            });

        let req = Arc::new(Request::new(Method::GET, "/"));
        let ctx = Arc::new(Context::new(&req));

        let verdict = inspector
            .request_inspector()
            .unwrap()
            .inspect(req.clone(), ctx.clone())
            .resolve()
            .await
            .unwrap();
        assert!(verdict.should_continue);
        assert!(verdict.response.is_none());

        let res = inspector
            .response_inspector()
            .unwrap()
            .inspect(req, Response::new(200), ctx)
            .resolve()
            .await
            .unwrap();
        assert_eq!(res.get_header("x-seen"), Some("1"));
    }

    #[test]
    fn verdict_constructors() {
        let stop = RequestInspectorResponse::respond(Response::new(401));
        assert!(!stop.should_continue);
        assert_eq!(stop.response.unwrap().status, 401);

        let halt = RequestInspectorResponse::halt();
        assert!(!halt.should_continue && halt.response.is_none());
        assert!(Inspector::new().request_inspector().is_none());
    }
}
