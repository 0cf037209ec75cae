//! Minimal HTTP server scaffold.
//!
//! A request flows from the transport into a [`Listener`], which builds a fresh
//! [`Context`] and runs it through the composed handler chain: middleware
//! around a [`make_router`] table of exact paths. Whatever the chain leaves in
//! the context (status, cookies, reply) is committed onto the response
//! afterwards. [`concurrency::listen_http`] picks the process topology.
//!
//! [`Listener`]: http::Listener
//! [`Context`]: http::Context
//! [`make_router`]: http::make_router

pub mod concurrency;
pub mod http;

pub use concurrency::{LaunchOptions, listen_http};
