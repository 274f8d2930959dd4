use crate::context::Context;
use crate::handler::Completion;
use crate::http::{Request, Response};
use crate::inspector::{Inspector, ResponseInspector};
use log::info;
use std::sync::Arc;

/// Logs `status method path` for every response that passes through.
pub struct RequestLogger;

impl RequestLogger {
    pub fn inspector() -> Inspector {
        Inspector::new().with_response_inspector(RequestLogger)
    }
}

impl ResponseInspector for RequestLogger {
    fn inspect(&self, req: Arc<Request>, res: Response, ctx: Arc<Context>) -> Completion<Response> {
        info!("[{}] {} {}", res.status, req.method, ctx.path());
        Completion::ready(res)
    }
}
