use crate::http::context::Context;
use crate::http::handler::{BoxFuture, BoxHandler, Handler, HandlerResult};
use std::sync::Arc;
use std::time::Instant;

/// Wraps a downstream handler into a new one.
///
/// Code before the inner `next.call(ctx).await` runs on the way in, code after
/// it on the way out, so stacked middleware unwinds in LIFO order.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: BoxHandler) -> BoxHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync,
{
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        self(next)
    }
}

/// `compose(h, [m1, m2])` is `m1.wrap(m2.wrap(h))`: the first middleware is outermost.
pub fn compose(handler: BoxHandler, middlewares: Vec<Box<dyn Middleware>>) -> BoxHandler {
    middlewares
        .into_iter()
        .rev()
        .fold(handler, |next, m| m.wrap(next))
}

/// Logs every request with its final status and elapsed time.
pub struct TraceRequests;

impl Middleware for TraceRequests {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(Traced { next })
    }
}

struct Traced {
    next: BoxHandler,
}

impl Handler for Traced {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let started = Instant::now();
            let result = self.next.call(ctx).await;

            let status = if ctx.response().headers_sent() {
                ctx.response().status_code()
            } else {
                ctx.committed_status()
            };
            tracing::debug!(
                method = %ctx.request().method(),
                url = ctx.request().url().unwrap_or_default(),
                status,
                failed = result.is_err(),
                elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
                "request handled"
            );

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::handler_fn;
    use crate::http::method::Method;
    use crate::http::request::Request;
    use crate::http::test_support::capture;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn marker(log: Log, name: &'static str) -> impl Fn(BoxHandler) -> BoxHandler {
        move |next: BoxHandler| {
            let log = Arc::clone(&log);
            handler_fn(move |ctx| {
                let log = Arc::clone(&log);
                let next = Arc::clone(&next);
                Box::pin(async move {
                    log.lock().unwrap().push(format!("{}-pre", name));
                    next.call(ctx).await?;
                    log.lock().unwrap().push(format!("{}-post", name));
                    Ok(())
                })
            })
        }
    }

    fn base(log: Log) -> BoxHandler {
        handler_fn(move |_ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push("H".to_string());
                Ok(())
            })
        })
    }

    fn ctx() -> Context {
        let (w, _) = capture();
        Context::new(Request::new(Method::GET, "/"), w)
    }

    #[tokio::test]
    async fn nested_middleware_runs_as_a_stack() {
        let log: Log = Arc::default();
        let m1 = marker(log.clone(), "M1");
        let m2 = marker(log.clone(), "M2");

        let composed = m1.wrap(m2.wrap(base(log.clone())));
        composed.call(&mut ctx()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["M1-pre", "M2-pre", "H", "M2-post", "M1-post"]
        );
    }

    #[tokio::test]
    async fn compose_puts_first_middleware_outermost() {
        let log: Log = Arc::default();
        let composed = compose(
            base(log.clone()),
            vec![
                Box::new(marker(log.clone(), "M1")) as Box<dyn Middleware>,
                Box::new(marker(log.clone(), "M2")) as Box<dyn Middleware>,
            ],
        );
        composed.call(&mut ctx()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["M1-pre", "M2-pre", "H", "M2-post", "M1-post"]
        );
    }

    #[tokio::test]
    async fn inner_failure_skips_outer_post_logic() {
        let log: Log = Arc::default();
        let failing = handler_fn(|_ctx| Box::pin(async { Err::<(), _>(anyhow::anyhow!("boom")) }));
        let composed = marker(log.clone(), "M1").wrap(failing);

        let err = composed.call(&mut ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(*log.lock().unwrap(), ["M1-pre"]);
    }

    #[tokio::test]
    async fn trace_requests_passes_results_through() {
        let inner = handler_fn(|ctx| {
            Box::pin(async move {
                ctx.status = Some(418);
                Ok(())
            })
        });
        let traced = TraceRequests.wrap(inner);

        let mut ctx = ctx();
        traced.call(&mut ctx).await.unwrap();
        assert_eq!(ctx.status, Some(418));
    }
}
