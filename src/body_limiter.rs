// Request bodies are buffered whole before signing; `Limited` stops the read
// once the configured ceiling is crossed.

use std::error::Error as StdError;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use thiserror::Error;
use tracing::warn;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum BodyLimitError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(BoxError),
}

impl BodyLimitError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Read(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing text; read errors are not echoed back
    pub fn to_response_message(&self) -> String {
        match self {
            Self::TooLarge { limit } => format!("Request body too large (limit: {} bytes)", limit),
            Self::Read(_) => "Failed to read request body".to_string(),
        }
    }
}

/// Collect `body` into memory, failing once more than `limit` bytes arrive.
/// Trailers are discarded.
pub async fn read_body_with_limit<B>(body: B, limit: usize) -> Result<Bytes, BodyLimitError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            warn!(limit, "Request body over limit");
            Err(BodyLimitError::TooLarge { limit })
        }
        Err(e) => Err(BodyLimitError::Read(e)),
    }
}
