use crate::http::context::Context;
use crate::http::handler::{BoxFuture, BoxHandler, Handler, HandlerResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Key of the mandatory fallback entry in a handlers table.
pub const FALLBACK_KEY: &str = "404";

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("handlers table has no \"404\" fallback entry")]
    MissingFallback,
}

/// Exact-path handlers table with a mandatory fallback.
#[derive(Clone)]
pub struct Handlers {
    routes: HashMap<String, BoxHandler>,
    fallback: BoxHandler,
}

impl Handlers {
    pub fn new(fallback: BoxHandler) -> Handlers {
        Handlers {
            routes: HashMap::new(),
            fallback,
        }
    }

    pub fn route(mut self, path: impl Into<String>, handler: BoxHandler) -> Handlers {
        self.add_handler(path, handler);
        self
    }

    /// Registers `handler` for `path`. Registering under `"404"` replaces the fallback.
    pub fn add_handler(&mut self, path: impl Into<String>, handler: BoxHandler) {
        let path = path.into();
        if path == FALLBACK_KEY {
            self.fallback = handler;
        } else {
            self.routes.insert(path, handler);
        }
    }

    /// The handler for `url`, compared byte for byte, or the fallback.
    pub fn lookup(&self, url: Option<&str>) -> &BoxHandler {
        match url.and_then(|u| self.routes.get(u)) {
            Some(handler) => handler,
            None => &self.fallback,
        }
    }
}

impl TryFrom<HashMap<String, BoxHandler>> for Handlers {
    type Error = RouterError;

    fn try_from(mut table: HashMap<String, BoxHandler>) -> Result<Self, Self::Error> {
        let fallback = table
            .remove(FALLBACK_KEY)
            .ok_or(RouterError::MissingFallback)?;

        Ok(Handlers {
            routes: table,
            fallback,
        })
    }
}

struct Router {
    handlers: Handlers,
}

impl Handler for Router {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        let handler = self.handlers.lookup(ctx.request().url());
        handler.call(ctx)
    }
}

/// Builds the dispatching handler. The router adds no failure of its own; a
/// failing leaf handler's error comes back unchanged.
pub fn make_router(handlers: Handlers) -> BoxHandler {
    Arc::new(Router { handlers })
}
