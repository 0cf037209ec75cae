use clap::Parser;
use scaffold_http::concurrency::{
    self, LaunchOptions, ProcessSupervisor, TcpTransport, log_worker_exits, quiet_listening,
};
use scaffold_http::http::{
    BodyError, BoxHandler, Handlers, Middleware, ReadOptions, TraceRequests, compose, handler_fn,
    make_listener, make_router, read,
};
use std::net::IpAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "scaffold-http")]
#[command(about = "Echo server built on the scaffold-http pipeline", long_about = None)]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(short, long, default_value_t = concurrency::DEFAULT_PORT)]
    port: u16,

    /// Worker processes to fork; 1 serves in this process. Defaults to the CPU count.
    #[arg(short, long)]
    threads: Option<usize>,

    #[arg(long, default_value_t = ReadOptions::default().max_bytes)]
    max_body_bytes: usize,
}

/// Set by the outer middleware, read by the inner one.
struct Greeting(String);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scaffold_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let options = LaunchOptions {
        port: args.port,
        thread_count: args.threads.unwrap_or_else(concurrency::cpu_count),
    };

    let handlers = Handlers::new(handler_fn(|ctx| {
        Box::pin(async move {
            ctx.status = Some(404);
            Ok(())
        })
    }))
    .route(
        "/echo",
        echo(ReadOptions {
            max_bytes: args.max_body_bytes,
        }),
    );

    let router = compose(
        make_router(handlers),
        vec![
            Box::new(TraceRequests) as Box<dyn Middleware>,
            Box::new(greeting_middleware) as Box<dyn Middleware>,
            Box::new(logging_middleware) as Box<dyn Middleware>,
        ],
    );
    let listener = make_listener(router);

    if concurrency::worker_id().is_none() {
        tracing::info!(
            host = %args.host,
            port = options.port,
            thread_count = options.thread_count,
            "scaffold-http starting"
        );
    }

    concurrency::listen_with(
        listener,
        options,
        &TcpTransport { host: args.host },
        ProcessSupervisor::from_env()?,
        log_worker_exits,
        Box::new(quiet_listening),
    )
}

/// Replies with the JSON body it was sent, re-serialized.
fn echo(options: ReadOptions) -> BoxHandler {
    handler_fn(move |ctx| {
        Box::pin(async move {
            let buf = match read(ctx, options).await {
                Ok(buf) => buf,
                Err(BodyError::PayloadTooLarge { .. }) => return Ok(()),
                Err(e) => {
                    tracing::debug!(error = %e, "echo: unreadable body");
                    ctx.status = Some(400);
                    return Ok(());
                }
            };

            match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&buf) {
                Ok(body) => ctx.set_reply(serde_json::to_string(&body)?),
                Err(e) => {
                    tracing::debug!(error = %e, "echo: body is not a JSON object");
                    ctx.status = Some(400);
                }
            }
            Ok(())
        })
    })
}

fn greeting_middleware(next: BoxHandler) -> BoxHandler {
    handler_fn(move |ctx| {
        let next = Arc::clone(&next);
        Box::pin(async move {
            ctx.insert(Greeting("hello world".to_string()));
            ctx.add_cookie("name=value");
            tracing::info!("runs first");
            next.call(ctx).await?;
            tracing::info!("runs fourth");
            Ok(())
        })
    })
}

fn logging_middleware(next: BoxHandler) -> BoxHandler {
    handler_fn(move |ctx| {
        let next = Arc::clone(&next);
        Box::pin(async move {
            tracing::info!("runs second");
            next.call(ctx).await?;
            tracing::info!("runs third");
            if let Some(Greeting(msg)) = ctx.get::<Greeting>() {
                tracing::info!("{}", msg);
            }
            Ok(())
        })
    })
}
