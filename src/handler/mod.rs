use crate::context::Context;
use crate::error::ServerResult;
use crate::http::{Request, Response};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// The result of invoking a handler or inspector, tagged with whether it is
/// already available or still has to be awaited.
pub enum Completion<T> {
    Ready(ServerResult<T>),
    Pending(BoxFuture<'static, ServerResult<T>>),
}

impl<T> Completion<T> {
    pub fn ready(value: T) -> Self {
        Completion::Ready(Ok(value))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = ServerResult<T>> + Send + 'static,
    {
        Completion::Pending(Box::pin(future))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Completion::Ready(_))
    }

    pub async fn resolve(self) -> ServerResult<T> {
        match self {
            Completion::Ready(result) => result,
            Completion::Pending(future) => future.await,
        }
    }
}

impl<T> From<ServerResult<T>> for Completion<T> {
    fn from(result: ServerResult<T>) -> Self {
        Completion::Ready(result)
    }
}

pub trait IntoCompletion<T> {
    fn into_completion(self) -> Completion<T>;
}

impl<T> IntoCompletion<T> for Completion<T> {
    fn into_completion(self) -> Completion<T> {
        self
    }
}

impl<T, F> IntoCompletion<T> for F
where
    F: Future<Output = ServerResult<T>> + Send + 'static,
{
    fn into_completion(self) -> Completion<T> {
        Completion::Pending(Box::pin(self))
    }
}

pub trait Handler: Send + Sync + 'static {
    fn handle(&self, req: Arc<Request>, ctx: Arc<Context>) -> Completion<Response>;
}

impl<F, R> Handler for F
where
    F: Fn(Arc<Request>, Arc<Context>) -> R + Send + Sync + 'static,
    R: IntoCompletion<Response>,
{
    fn handle(&self, req: Arc<Request>, ctx: Arc<Context>) -> Completion<Response> {
        (self)(req, ctx).into_completion()
    }
}

pub type SharedHandler = Arc<dyn Handler>;
