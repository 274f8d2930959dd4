mod request;
mod response;

pub use request::{Body, Method, Request};
pub use response::Response;
