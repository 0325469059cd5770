use thiserror::Error;

pub type Result<T> = std::result::Result<T, BtuneError>;

#[derive(Debug, Error)]
pub enum BtuneError {
    #[error("config error: {0}")]
    Config(String),

    #[error("model artifact error: {0}")]
    ModelFormat(String),

    #[error("model missing: {0}")]
    ModelMissing(String),

    #[error("codec {0} is not registered")]
    CodecUnavailable(u8),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}
