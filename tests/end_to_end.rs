//! Full pipeline over a real socket: transport, listener, middleware, router.

use scaffold_http::http::{
    BodyError, BoxHandler, Handlers, HttpServer, Listener, Middleware, ReadOptions, compose,
    handler_fn, make_listener, make_router, read,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn header(&self, k: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(k))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

async fn start(listener: Listener) -> SocketAddr {
    let server = HttpServer::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

async fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
        method,
        path,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let split = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
    let head = String::from_utf8(raw[..split].to_vec()).unwrap();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|l| l.split(' ').nth(1))
        .and_then(|c| c.parse().ok())
        .unwrap();
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Reply {
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

fn echo() -> BoxHandler {
    handler_fn(|ctx| {
        Box::pin(async move {
            match read(ctx, ReadOptions::default()).await {
                Ok(buf) => {
                    let value: serde_json::Value = serde_json::from_slice(&buf)?;
                    ctx.set_reply(serde_json::to_string(&value)?);
                }
                Err(BodyError::PayloadTooLarge { .. }) => {}
                Err(_) => ctx.status = Some(400),
            }
            Ok(())
        })
    })
}

fn not_found() -> BoxHandler {
    handler_fn(|ctx| {
        Box::pin(async move {
            ctx.status = Some(404);
            Ok(())
        })
    })
}

#[tokio::test]
async fn echo_and_missing() {
    let addr = start(make_listener(make_router(
        Handlers::new(not_found()).route("/echo", echo()),
    )))
    .await;

    let reply = send(addr, "POST", "/echo", r#"{"a":1}"#).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, br#"{"a":1}"#);

    let reply = send(addr, "GET", "/missing", "").await;
    assert_eq!(reply.status, 404);
    assert!(reply.body.is_empty());
}

#[tokio::test]
async fn middleware_order_and_cookies() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();

    let tagging = |name: &'static str, cookie: &'static str| {
        let log = Arc::clone(&log);
        move |next: BoxHandler| {
            let log = Arc::clone(&log);
            handler_fn(move |ctx| {
                let log = Arc::clone(&log);
                let next = Arc::clone(&next);
                Box::pin(async move {
                    log.lock().unwrap().push(name);
                    ctx.add_cookie(cookie);
                    next.call(ctx).await?;
                    log.lock().unwrap().push(name);
                    Ok(())
                })
            })
        }
    };

    let router = compose(
        make_router(Handlers::new(not_found()).route("/echo", echo())),
        vec![
            Box::new(tagging("outer", "outer=1")) as Box<dyn Middleware>,
            Box::new(tagging("inner", "inner=2")) as Box<dyn Middleware>,
        ],
    );
    let addr = start(make_listener(router)).await;

    let reply = send(addr, "POST", "/echo", r#"{"b":[1,2]}"#).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, br#"{"b":[1,2]}"#);
    assert_eq!(reply.header("set-cookie"), vec!["outer=1", "inner=2"]);
    assert_eq!(*log.lock().unwrap(), ["outer", "inner", "inner", "outer"]);
}

#[tokio::test]
async fn concurrent_requests_get_their_own_context() {
    let addr = start(make_listener(make_router(
        Handlers::new(not_found()).route("/echo", echo()),
    )))
    .await;

    let requests = (0..16).map(|i| {
        tokio::spawn(async move {
            let body = format!(r#"{{"n":{}}}"#, i);
            let reply = send(addr, "POST", "/echo", &body).await;
            (body, reply)
        })
    });

    for handle in requests.collect::<Vec<_>>() {
        let (body, reply) = handle.await.unwrap();
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, body.as_bytes());
    }
}
