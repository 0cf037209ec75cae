use crate::http::BUFFER_SIZE;
use crate::http::method::Method;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Inbound request handle: metadata plus the body stream.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Option<String>,
    headers: HashMap<String, String>,
    body: Body,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Request {
        Request {
            method,
            url: Some(url.into()),
            headers: HashMap::new(),
            body: Body::empty(),
        }
    }

    /// A request whose target could not be recovered by the transport.
    pub fn without_url(method: Method) -> Request {
        Request {
            method,
            url: None,
            headers: HashMap::new(),
            body: Body::empty(),
        }
    }

    pub(crate) fn from_parts(
        method: Method,
        url: String,
        headers: HashMap<String, String>,
        body: Body,
    ) -> Request {
        Request {
            method,
            url: Some(url),
            headers,
            body,
        }
    }

    pub fn with_header(mut self, k: &str, v: impl Into<String>) -> Request {
        self.headers.insert(k.to_lowercase(), v.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Request {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Request target exactly as received, query string included.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn get_header(&self, k: &str) -> Option<&str> {
        self.headers.get(&k.to_lowercase()).map(|v| v.as_str())
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }
}

/// Request body as a stream of chunks.
///
/// Each call to [`Body::next_chunk`] yields one of three events: a data chunk,
/// a transport error, or `None` once the stream has ended. After an error or
/// [`Body::destroy`] the stream is gone and only `None` is observed.
pub struct Body {
    reader: Option<Box<dyn AsyncRead + Send + Unpin>>,
    /// Bytes still owed when the sender declared a length.
    remaining: Option<u64>,
}

impl Body {
    pub fn empty() -> Body {
        Body {
            reader: None,
            remaining: None,
        }
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Body {
        Body {
            reader: Some(Box::new(reader)),
            remaining: None,
        }
    }

    /// A body of exactly `len` bytes. The reader is capped at `len`, and running
    /// dry before that fails with [`io::ErrorKind::UnexpectedEof`].
    pub fn with_length(reader: impl AsyncRead + Send + Unpin + 'static, len: u64) -> Body {
        Body {
            reader: Some(Box::new(reader.take(len))),
            remaining: Some(len),
        }
    }

    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        let reader = self.reader.as_mut()?;

        let mut buf = BytesMut::with_capacity(BUFFER_SIZE);
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                self.reader = None;
                match self.remaining {
                    Some(missing) if missing > 0 => Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("body ended {} bytes short", missing),
                    ))),
                    _ => None,
                }
            }
            Ok(n) => {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining = remaining.saturating_sub(n as u64);
                }
                Some(Ok(buf.freeze()))
            }
            Err(e) => {
                self.reader = None;
                Some(Err(e))
            }
        }
    }

    /// Tears the stream down; the unread remainder is discarded.
    pub fn destroy(&mut self) {
        self.reader = None;
    }

    pub fn is_destroyed(&self) -> bool {
        self.reader.is_none()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("open", &self.reader.is_some())
            .finish()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Body {
        Body::from_reader(Cursor::new(bytes))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Body {
        Body::from(Bytes::from(bytes))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Body {
        Body::from(Bytes::from_static(s.as_bytes()))
    }
}
