pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The event claimed a base64 body that does not decode.
    #[error("decoding base64 body: {0}")]
    BodyDecode(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Alias kept for callers that match on the request construction failure.
pub type BodyDecodeError = base64::DecodeError;

impl Error {
    pub fn is_body_decode(&self) -> bool {
        matches!(self, Error::BodyDecode(_))
    }
}
