use crate::http::status::Status;
use std::fmt;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Outbound response handle, the single writable sink of one request cycle.
///
/// Status and headers are buffered until the first byte goes out, after which
/// [`Response::headers_sent`] reports `true` and they can no longer change.
pub struct Response {
    sink: Box<dyn AsyncWrite + Send + Unpin>,
    status_code: u16,
    headers: Vec<(String, String)>,
    headers_sent: bool,
    finished: bool,
}

impl Response {
    pub fn new(sink: impl AsyncWrite + Send + Unpin + 'static) -> Response {
        Response {
            sink: Box::new(sink),
            status_code: Status::OK.code(),
            headers: Vec::new(),
            headers_sent: false,
            finished: false,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn set_status(&mut self, code: u16) {
        self.status_code = code;
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn get_header(&self, k: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(k))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces every value previously set under `k`.
    pub fn set_header(&mut self, k: &str, v: impl Into<String>) -> io::Result<()> {
        let v: String = v.into();
        self.set_header_values(k, [v])
    }

    /// Sets a multi-value header: one header line per value, in order.
    ///
    /// Fails without touching the headers if `k` is not a token or a value
    /// carries CR, LF or NUL.
    pub fn set_header_values(
        &mut self,
        k: &str,
        values: impl IntoIterator<Item = String>,
    ) -> io::Result<()> {
        check_header_name(k)?;
        let values: Vec<String> = values.into_iter().collect();
        for v in &values {
            check_header_value(k, v)?;
        }

        self.replace_header(k, values);
        Ok(())
    }

    /// Marks the connection as closing once this response is done.
    pub(crate) fn close_connection(&mut self) {
        self.replace_header("Connection", vec!["close".to_string()]);
    }

    fn replace_header(&mut self, k: &str, values: Vec<String>) {
        self.headers.retain(|(name, _)| !name.eq_ignore_ascii_case(k));
        self.headers
            .extend(values.into_iter().map(|v| (k.to_string(), v)));
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Streams `chunk` to the peer, sending the head first if needed. A head sent
    /// this way carries no `Content-Length`; the body ends when the connection closes.
    pub async fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        if !self.headers_sent {
            let head = serialize_head(self.status_code, &self.headers, None);
            self.send(&head).await?;
        }
        self.sink.write_all(chunk).await?;
        self.sink.flush().await
    }

    /// Finishes the response, writing `body` if given. Ending twice is an error.
    pub async fn end(&mut self, body: Option<&[u8]>) -> io::Result<()> {
        self.ensure_open()?;
        self.finished = true;

        let content = body.unwrap_or_default();
        if !self.headers_sent {
            let mut bytes = serialize_head(self.status_code, &self.headers, Some(content.len()));
            bytes.extend_from_slice(content);
            self.send(&bytes).await?;
        } else {
            self.sink.write_all(content).await?;
        }

        self.sink.flush().await?;
        self.sink.shutdown().await
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::other("response already ended"));
        }
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.headers_sent = true;
        self.sink.write_all(bytes).await
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status_code", &self.status_code)
            .field("headers", &self.headers)
            .field("headers_sent", &self.headers_sent)
            .field("finished", &self.finished)
            .finish()
    }
}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn check_header_name(k: &str) -> io::Result<()> {
    if k.is_empty() || !k.bytes().all(is_token_char) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid header name {:?}", k),
        ));
    }
    Ok(())
}

fn check_header_value(k: &str, v: &str) -> io::Result<()> {
    if v.bytes().any(|b| matches!(b, b'\r' | b'\n' | b'\0')) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid character in {} header value", k),
        ));
    }
    Ok(())
}

fn serialize_head(
    status_code: u16,
    headers: &[(String, String)],
    content_length: Option<usize>,
) -> Vec<u8> {
    let mut head = Vec::with_capacity(64 + headers.len() * 32);

    head.extend(
        format!(
            "HTTP/1.1 {} {}\r\n",
            status_code,
            Status::reason_phrase(status_code)
        )
        .as_bytes(),
    );

    for (key, value) in headers {
        head.extend(format!("{}: {}\r\n", key, value).as_bytes());
    }

    if let Some(len) = content_length {
        head.extend(format!("Content-Length: {}\r\n", len).as_bytes());
    }
    head.extend(b"\r\n");

    head
}
