use crate::http::listener::Listener;
use crate::http::parse::{RequestHead, parse_header_line, parse_request_line};
use crate::http::request::{Body, Request};
use crate::http::response::Response;
use crate::http::status::Status;
use anyhow::Context;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// Time allowed for a client to deliver the request line and headers.
pub const HEAD_READ_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_HEADERS: usize = 100;
const MAX_LINE_BYTES: u64 = 8192;
const BACKLOG: u32 = 1024;

/// HTTP/1.1 transport: one request per connection, body bounded by `Content-Length`.
pub struct HttpServer {
    listener: TcpListener,
}

impl HttpServer {
    /// Binds with `SO_REUSEPORT` (on unix) so sibling worker processes can
    /// share the port and let the kernel spread connections across them.
    pub async fn bind(addr: SocketAddr) -> io::Result<HttpServer> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        #[cfg(unix)]
        socket.set_reuseport(true)?;
        socket.bind(addr)?;

        let listener = socket.listen(BACKLOG)?;
        tracing::info!(address = %listener.local_addr()?, pid = std::process::id(), "listening");

        Ok(HttpServer { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, each on its own task.
    pub async fn serve(self, listener: Listener) -> io::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let listener = listener.clone();
            tokio::spawn(async move { process_incoming(stream, peer, listener).await });
        }
    }
}

async fn process_incoming(stream: TcpStream, peer: SocketAddr, listener: Listener) {
    tracing::debug!(%peer, "accepted new connection");

    let (read_half, write_half) = stream.into_split();
    let mut rdr = BufReader::new(read_half);

    let head = match tokio::time::timeout(HEAD_READ_TIMEOUT, read_head(&mut rdr)).await {
        Ok(Ok(head)) => head,
        Ok(Err(e)) => return bad_request(write_half, peer, e).await,
        Err(_) => {
            tracing::debug!(%peer, "timed out waiting for request head");
            return;
        }
    };

    let content_length = match head.content_length() {
        Ok(len) => len,
        Err(e) => return bad_request(write_half, peer, e).await,
    };

    let RequestHead {
        method,
        url,
        headers,
    } = head;
    let body = Body::with_length(rdr, content_length);
    let request = Request::from_parts(method, url, headers, body);

    let mut response = Response::new(write_half);
    response.close_connection();

    // No response is sent for a failed chain; dropping the halves closes the connection.
    if let Err(e) = listener.handle(request, response).await {
        tracing::error!(%peer, error = ?e, "handler chain failed, closing connection without a response");
    }
}

async fn bad_request(write_half: OwnedWriteHalf, peer: SocketAddr, e: anyhow::Error) {
    tracing::debug!(%peer, error = %e, "bad request");

    let mut response = Response::new(write_half);
    response.set_status(Status::BAD_REQUEST.code());
    response.close_connection();
    if let Err(e) = response.end(None).await {
        tracing::debug!(%peer, error = %e, "could not send 400 response");
    }
}

pub(crate) async fn read_head(rdr: &mut (impl AsyncBufRead + Unpin)) -> anyhow::Result<RequestHead> {
    let mut line = String::new();
    read_line(rdr, &mut line)
        .await
        .context("Error while reading line")?;
    let (method, url) = parse_request_line(&line)?;

    let mut headers: HashMap<String, String> = HashMap::new();
    loop {
        line.clear();
        let n = read_line(rdr, &mut line).await.context("Can't read line")?;

        if n == 0 || line.trim_ascii().is_empty() {
            break;
        }
        if headers.len() == MAX_HEADERS {
            anyhow::bail!("Too many headers");
        }

        let (k, v) = parse_header_line(&line)?;
        headers.insert(k, v);
    }

    Ok(RequestHead {
        method,
        url,
        headers,
    })
}

/// `read_line` that gives up on lines longer than `MAX_LINE_BYTES`.
async fn read_line(
    rdr: &mut (impl AsyncBufRead + Unpin),
    line: &mut String,
) -> anyhow::Result<usize> {
    let n = (&mut *rdr).take(MAX_LINE_BYTES).read_line(line).await?;
    if n as u64 == MAX_LINE_BYTES && !line.ends_with('\n') {
        anyhow::bail!("Line exceeds {} bytes", MAX_LINE_BYTES);
    }
    Ok(n)
}
