use crate::http::response::Response;
use tokio::io::{AsyncReadExt, DuplexStream};

pub(crate) struct RawResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn status(&self) -> u16 {
        self.status_line
            .split(' ')
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap()
    }

    pub fn header(&self, k: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(k))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// A response whose bytes can be read back from the returned peer.
pub(crate) fn capture() -> (Response, DuplexStream) {
    let (sink, peer) = tokio::io::duplex(1 << 20);
    (Response::new(sink), peer)
}

/// Reads until the response side shuts down or is dropped.
pub(crate) async fn read_raw(mut peer: DuplexStream) -> RawResponse {
    let mut bytes = Vec::new();
    peer.read_to_end(&mut bytes).await.unwrap();
    parse_raw(&bytes)
}

pub(crate) fn parse_raw(bytes: &[u8]) -> RawResponse {
    let split = bytes
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no end of head");
    let head = std::str::from_utf8(&bytes[..split]).unwrap();
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap().to_string();
    let headers = lines
        .map(|line| {
            let (k, v) = line.split_once(':').unwrap();
            (k.trim().to_string(), v.trim().to_string())
        })
        .collect();

    RawResponse {
        status_line,
        headers,
        body: bytes[split + 4..].to_vec(),
    }
}
