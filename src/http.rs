//! Request-handling pipeline: context, router, middleware, body reader and the
//! listener adapter that ties them to the TCP transport.

pub mod body;
pub mod context;
pub mod handler;
pub mod listener;
pub mod method;
pub mod middleware;
mod parse;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod status;

#[cfg(test)]
mod test_support;

pub use body::{BodyError, ReadOptions, read};
pub use context::Context;
pub use handler::{BoxFuture, BoxHandler, Handler, HandlerResult, handler_fn};
pub use listener::{Listener, make_listener};
pub use method::Method;
pub use middleware::{Middleware, TraceRequests, compose};
pub use request::{Body, Request};
pub use response::Response;
pub use router::{Handlers, RouterError, make_router};
pub use server::HttpServer;
pub use status::Status;

/// Upper bound on a single body chunk pulled from the transport.
pub(crate) const BUFFER_SIZE: usize = 1024;
