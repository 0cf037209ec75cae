use crate::http::context::Context;
use crate::http::status::Status;
use bytes::{Bytes, BytesMut};
use std::io;

pub const DEFAULT_MAX_BYTES: usize = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub max_bytes: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    /// The response has already been finalized as `413` with an empty body.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    /// The request stream failed. The response is left untouched.
    #[error("failed to read request body")]
    Transport(#[source] io::Error),
}

/// Reads the whole request body into memory.
///
/// Exceeding `options.max_bytes` finalizes the response as `413 Payload Too Large`,
/// tears the body stream down and fails with [`BodyError::PayloadTooLarge`].
pub async fn read(ctx: &mut Context, options: ReadOptions) -> Result<Bytes, BodyError> {
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut byte_count = 0;

    loop {
        let chunk = match ctx.request_mut().body_mut().next_chunk().await {
            Some(chunk) => chunk.map_err(BodyError::Transport)?,
            None => break,
        };

        byte_count += chunk.len();
        if byte_count > options.max_bytes {
            ctx.request_mut().body_mut().destroy();
            reject_oversized(ctx, options.max_bytes).await;
            return Err(BodyError::PayloadTooLarge {
                limit: options.max_bytes,
            });
        }

        chunks.push(chunk);
    }

    let mut buf = BytesMut::with_capacity(byte_count);
    for chunk in &chunks {
        buf.extend_from_slice(chunk);
    }
    Ok(buf.freeze())
}

async fn reject_oversized(ctx: &mut Context, limit: usize) {
    let response = ctx.response_mut();
    response.set_status(Status::PAYLOAD_TOO_LARGE.code());

    if let Err(e) = response.end(None).await {
        tracing::warn!(limit, error = %e, "could not send 413 response");
    }
}
