use crate::context::Context;
use crate::handler::Completion;
use crate::http::{Request, Response};
use crate::inspector::{Inspector, ResponseInspector};
use std::sync::Arc;

#[derive(Clone)]
pub struct SecurityConfig {
    pub hsts: bool,
    pub xss_protection: bool,
    pub content_type_options: bool,
    pub frame_options: Option<String>,
    pub content_security_policy: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hsts: true,
            xss_protection: true,
            content_type_options: true,
            frame_options: Some("DENY".to_string()),
            content_security_policy: None,
        }
    }
}

/// Response-phase inspector that stamps security headers on every response
/// passing through the node it is attached to, short-circuit responses
/// included.
pub struct SecurityHeaders {
    config: SecurityConfig,
}

impl SecurityHeaders {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    pub fn inspector(config: SecurityConfig) -> Inspector {
        Inspector::new().with_response_inspector(Self::new(config))
    }

    fn apply(&self, response: &mut Response) {
        let config = &self.config;
        if config.hsts {
            response.header("Strict-Transport-Security", "max-age=31536000");
        }
        if config.xss_protection {
            response.header("X-XSS-Protection", "1; mode=block");
        }
        if config.content_type_options {
            response.header("X-Content-Type-Options", "nosniff");
        }
        if let Some(ref frame_options) = config.frame_options {
            response.header("X-Frame-Options", frame_options);
        }
        if let Some(ref content_security_policy) = config.content_security_policy {
            response.header("Content-Security-Policy", content_security_policy);
        }
    }
}

impl ResponseInspector for SecurityHeaders {
    fn inspect(&self, _req: Arc<Request>, mut res: Response, _ctx: Arc<Context>) -> Completion<Response> {
        self.apply(&mut res);
        Completion::ready(res)
    }
}
