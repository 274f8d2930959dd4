use std::sync::Arc;
use trellis::inspector::{RequestLogger, SecurityConfig, SecurityHeaders};
use trellis::{Application, Completion, Context, Request, Response, Router, ServerConfig, ServerResult};

fn main() -> ServerResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env()?;
    let mut router = Router::default();
    router.run_mode(config.run_mode);

    router
        .add_all_inspector("", RequestLogger::inspector())
        .add_all_inspector("", SecurityHeaders::inspector(SecurityConfig::default()));

    router.get("/hello", |_req: Arc<Request>, _ctx: Arc<Context>| {
        Completion::ready(Response::html("Hello webserver"))
    });
    router.get("/hello/:name", |_req: Arc<Request>, ctx: Arc<Context>| {
        let name = ctx.path_variable("name").unwrap_or("stranger").to_string();
        Completion::ready(Response::html(format!("Hello {name}")))
    });
    router.mount_memoized_files("/static/", concat!(env!("CARGO_MANIFEST_DIR"), "/demos/static"))?;

    let mut app = Application::new(router, config);
    app.on_shutdown(|| async {
        log::info!("Cleaned up");
        Ok::<_, trellis::ServerError>(())
    });
    app.listen()
}
