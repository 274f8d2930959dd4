//! Per-request trie walk.
//!
//! [`dispatch`] selects the trie for the request method and descends it one
//! segment at a time. At every node the request-phase inspectors run in
//! registration order and their response phases are queued. The walk ends at
//! the node the path runs out on, at the closest splat wildcard passed on the
//! way down, or at the not-found handler. Whatever response ends the walk is
//! passed through the queued response inspectors.
//!
//! Any error or panic raised along the way is logged and answered by the
//! server-error handler alone; the queued response inspectors are skipped.

use crate::context::Context;
use crate::error::{ServerError, ServerResult};
use crate::handler::{Completion, SharedHandler};
use crate::http::{Request, Response};
use crate::inspector::ResponseInspector;
use crate::router::{RouteNode, Router};
use futures::FutureExt;
use log::{error, warn};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

pub async fn dispatch(router: &Router, request: Request) -> Response {
    let request = Arc::new(request);
    let mut context = Arc::new(Context::new(&request));

    let outcome = AssertUnwindSafe(walk(router, &request, &mut context))
        .catch_unwind()
        .await;
    let failure = match outcome {
        Ok(Ok(response)) => return response,
        Ok(Err(err)) => err,
        Err(panic) => ServerError::PanicError(panic_message(panic)),
    };

    error!("{} {} failed: {failure}", request.method, context.path());
    let fallback = AssertUnwindSafe(
        router
            .server_error_handler()
            .handle(Arc::clone(&request), context)
            .resolve(),
    )
    .catch_unwind()
    .await;
    match fallback {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!("Server error handler failed: {err}");
            Response::internal_error()
        }
        Err(_) => {
            error!("Server error handler panicked");
            Response::internal_error()
        }
    }
}

async fn walk(
    router: &Router,
    request: &Arc<Request>,
    context: &mut Arc<Context>,
) -> ServerResult<Response> {
    let Some(root) = router.root(&request.method) else {
        warn!("Called with unsupported method: {}", request.method);
        return invoke(router.not_found_handler(), request, context).resolve().await;
    };

    let segments = context.segments().to_vec();
    let mut depth = 0;
    let mut response_inspectors: Vec<Arc<dyn ResponseInspector>> = Vec::new();
    let mut closest_splat: Option<&RouteNode> = None;
    let mut node = Some(root);

    while let Some(current) = node {
        for inspector in current.inspectors() {
            if let Some(request_inspector) = inspector.request_inspector() {
                let verdict = request_inspector
                    .inspect(Arc::clone(request), Arc::clone(context))
                    .resolve()
                    .await?;
                if let Some(response) = verdict.response {
                    let early = Completion::ready(response);
                    return finish(early, &response_inspectors, request, context).await;
                }
                if !verdict.should_continue {
                    error!(
                        "Inspector stopped {} without a response",
                        context.path()
                    );
                    let completion = invoke(router.server_error_handler(), request, context);
                    return finish(completion, &response_inspectors, request, context).await;
                }
            }
            if let Some(response_inspector) = inspector.response_inspector() {
                response_inspectors.push(Arc::clone(response_inspector));
            }
        }

        let Some(segment) = segments.get(depth) else {
            let handler = current.handler().unwrap_or(router.not_found_handler());
            let completion = invoke(handler, request, context);
            return finish(completion, &response_inspectors, request, context).await;
        };
        depth += 1;

        if let Some(splat) = current.splat_child().filter(|splat| splat.handler().is_some()) {
            closest_splat = Some(splat);
        }

        node = current.child(segment);
        if let Some(next) = node.filter(|next| next.is_wildcard() && !next.is_splat()) {
            Arc::make_mut(context).bind(next.variable(), segment);
        }
    }

    let handler = closest_splat
        .and_then(RouteNode::handler)
        .unwrap_or(router.not_found_handler());
    let completion = invoke(handler, request, context);
    finish(completion, &response_inspectors, request, context).await
}

fn invoke(handler: &SharedHandler, request: &Arc<Request>, context: &Arc<Context>) -> Completion<Response> {
    handler.handle(Arc::clone(request), Arc::clone(context))
}

/// Resolves the terminal response and threads it through the queued
/// response inspectors, each awaited before the next runs.
async fn finish(
    completion: Completion<Response>,
    response_inspectors: &[Arc<dyn ResponseInspector>],
    request: &Arc<Request>,
    context: &Arc<Context>,
) -> ServerResult<Response> {
    let mut response = completion.resolve().await?;
    for inspector in response_inspectors {
        response = inspector
            .inspect(Arc::clone(request), response, Arc::clone(context))
            .resolve()
            .await?;
    }
    Ok(response)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use crate::inspector::{Inspector, RequestInspectorResponse};

    fn respond(body: &'static str) -> impl Fn(Arc<Request>, Arc<Context>) -> Completion<Response> {
        move |_req, _ctx| Completion::ready(Response::text(body))
    }

    #[tokio::test]
    async fn literal_route_reaches_its_handler() {
        let mut router = Router::default();
        router.get("/hello", respond("hello")).get("/bye", respond("bye"));

        let response = dispatch(&router, Request::new(Method::GET, "/hello")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body_string(), "hello");
    }

    #[tokio::test]
    async fn missing_route_is_not_found() {
        let router = Router::default();
        let response = dispatch(&router, Request::new(Method::GET, "/nowhere")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn intermediate_node_without_handler_is_not_found() {
        let mut router = Router::default();
        router.get("/a/b", respond("deep"));
        let response = dispatch(&router, Request::new(Method::GET, "/a")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn root_path_matches_root_route() {
        let mut router = Router::default();
        router.get("/", respond("index"));
        let response = dispatch(&router, Request::new(Method::GET, "/?utm=1")).await;
        assert_eq!(response.body_string(), "index");
    }

    #[tokio::test]
    async fn binds_variables_along_the_path() {
        let mut router = Router::default();
        router.get("/orgs/:org/repos/:repo", |_req: Arc<Request>, ctx: Arc<Context>| {
            let body = format!(
                "{}/{}",
                ctx.path_variable("org").unwrap_or_default(),
                ctx.path_variable("repo").unwrap_or_default()
            );
            Completion::ready(Response::text(body))
        });

        let response = dispatch(&router, Request::new(Method::GET, "/orgs/acme/repos/anvil")).await;
        assert_eq!(response.body_string(), "acme/anvil");
    }

    #[tokio::test]
    async fn splat_does_not_bind_a_variable() {
        let mut router = Router::default();
        router.get("/files/*", |_req: Arc<Request>, ctx: Arc<Context>| {
            Completion::ready(Response::text(ctx.path_variables().len().to_string()))
        });
        let response = dispatch(&router, Request::new(Method::GET, "/files/a/b/c")).await;
        assert_eq!(response.body_string(), "0");
    }

    #[tokio::test]
    async fn deepest_splat_wins() {
        let mut router = Router::default();
        router
            .get("/*", respond("top"))
            .get("/docs/*", respond("docs"))
            .get("/docs/api/index", respond("index"));

        let deep = dispatch(&router, Request::new(Method::GET, "/docs/api/missing")).await;
        assert_eq!(deep.body_string(), "docs");

        let top = dispatch(&router, Request::new(Method::GET, "/blog/post")).await;
        assert_eq!(top.body_string(), "top");
    }

    #[tokio::test]
    async fn splat_without_handler_is_not_a_fallback() {
        let mut router = Router::default();
        router.add_get_inspector("/static/*", Inspector::new());
        router.get("/static/app.js", respond("app"));
        let response = dispatch(&router, Request::new(Method::GET, "/static/css/site.css")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn unsupported_method_is_not_found() {
        let mut router = Router::default();
        router.add_all_inspector(
            "",
            Inspector::new().on_request(|_req: Arc<Request>, _ctx: Arc<Context>| {
                Completion::ready(RequestInspectorResponse::respond(Response::new(418)))
            }),
        );
        router.get("/thing", respond("thing"));

        for verb in ["PUT", "DELETE", "OPTIONS", "BREW"] {
            let method: Method = verb.parse().unwrap();
            let response = dispatch(&router, Request::new(method, "/thing")).await;
            assert_eq!(response.status, 404, "{verb}");
        }
    }

    #[tokio::test]
    async fn handler_error_maps_to_server_error_without_response_inspectors() {
        let mut router = Router::default();
        router.add_get_inspector(
            "/fail",
            Inspector::new().on_response(|_req: Arc<Request>, mut res: Response, _ctx: Arc<Context>| {
                res.header("x-inspected", "yes");
                Completion::ready(res)
            }),
        );
        router.get("/fail", |_req: Arc<Request>, _ctx: Arc<Context>| {
            Completion::<Response>::Ready(Err(ServerError::InternalError("db down".into())))
        });

        let response = dispatch(&router, Request::new(Method::GET, "/fail")).await;
        assert_eq!(response.status, 500);
        assert!(response.get_header("x-inspected").is_none());
        assert!(!response.body_string().contains("db down"));
    }

    #[tokio::test]
    async fn panicking_handler_maps_to_server_error() {
        let mut router = Router::default();
        router.get("/panic", |_req: Arc<Request>, _ctx: Arc<Context>| -> Completion<Response> {
            panic!("handler exploded")
        });
        let response = dispatch(&router, Request::new(Method::GET, "/panic")).await;
        assert_eq!(response.status, 500);
    }

    #[tokio::test]
    async fn failing_server_error_handler_still_yields_500() {
        let failing: SharedHandler = Arc::new(|_req: Arc<Request>, _ctx: Arc<Context>| {
            Completion::<Response>::Ready(Err(ServerError::InternalError("also broken".into())))
        });
        let mut router = Router::new(Arc::new(crate::router::not_found), failing);
        router.get("/x", |_req: Arc<Request>, _ctx: Arc<Context>| {
            Completion::<Response>::Ready(Err(ServerError::InternalError("broken".into())))
        });
        let response = dispatch(&router, Request::new(Method::GET, "/x")).await;
        assert_eq!(response, Response::internal_error());
    }
}
