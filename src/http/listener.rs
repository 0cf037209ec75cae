use crate::http::context::Context;
use crate::http::handler::BoxHandler;
use crate::http::request::Request;
use crate::http::response::Response;
use anyhow::Context as _;
use std::mem;

/// Bridges a transport's request/response pair into the [`Context`] pipeline.
#[derive(Clone)]
pub struct Listener {
    handler: BoxHandler,
}

/// Accepts a router, a router wrapped in middleware, or any other handler.
pub fn make_listener(handler: BoxHandler) -> Listener {
    Listener { handler }
}

impl Listener {
    /// Runs the handler chain on a fresh context, then commits status, cookies
    /// and reply, unless the chain already wrote to the response itself.
    ///
    /// A failing handler's error is returned as is and nothing is committed;
    /// what happens to the connection is up to the transport.
    pub async fn handle(&self, request: Request, response: Response) -> anyhow::Result<()> {
        let mut ctx = Context::new(request, response);

        self.handler.call(&mut ctx).await?;

        commit(ctx).await
    }
}

async fn commit(mut ctx: Context) -> anyhow::Result<()> {
    if ctx.response().headers_sent() {
        return Ok(());
    }

    let cookies = mem::take(&mut ctx.cookies);
    let status = ctx.committed_status();
    let reply = ctx.reply.take();

    let response = ctx.response_mut();
    if !cookies.is_empty() {
        response
            .set_header_values("Set-Cookie", cookies)
            .context("refusing to send cookies")?;
    }
    response.set_status(status);
    response
        .end(reply.as_deref())
        .await
        .context("failed to write response")
}
