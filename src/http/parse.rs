use crate::http::method::Method;
use anyhow::{Context, anyhow, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::str::FromStr;

static REQUEST_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<method>[A-Z]+) (?P<target>\S+) HTTP/(?P<version>1\.[01])$").unwrap()
});

#[derive(Debug)]
pub(crate) struct RequestHead {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl RequestHead {
    /// Declared body length. A missing header means an empty body.
    pub fn content_length(&self) -> anyhow::Result<u64> {
        if self.headers.contains_key("transfer-encoding") {
            bail!("Transfer-Encoding request bodies are not supported");
        }

        match self.headers.get("content-length") {
            Some(raw) => raw.parse().context("Invalid Content-Length header value"),
            None => Ok(0),
        }
    }
}

pub(crate) fn parse_request_line(line: &str) -> anyhow::Result<(Method, String)> {
    let capt = REQUEST_LINE_RE
        .captures(line.trim_ascii())
        .ok_or(anyhow!("Bad start-line: {:?}", line))?;

    let method = Method::from_str(&capt["method"]).context("Unknown HTTP method")?;
    Ok((method, capt["target"].to_string()))
}

/// Splits a header line into a lowercased name and a trimmed value.
pub(crate) fn parse_header_line(line: &str) -> anyhow::Result<(String, String)> {
    let (k, v) = line
        .trim_ascii()
        .split_once(':')
        .ok_or(anyhow!("Invalid header"))?;

    let name = k.trim_ascii();
    if name.is_empty() {
        bail!("Empty header name");
    }

    Ok((name.to_lowercase(), v.trim_ascii().to_string()))
}
