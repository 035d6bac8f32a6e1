use thiserror::Error;

/// Rejections raised while decoding relay traffic.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed relay message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("relay message `{op}` is missing `{field}`")]
    MissingField { op: &'static str, field: &'static str },

    #[error("relay message `{op}` references the local participant")]
    SelfAddressed { op: &'static str },
}
