use thiserror::Error;

#[derive(Error, Debug)]
pub enum HyprtaskError {
    #[error("configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing environment variable: {0}")]
    MissingEnvironment(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, HyprtaskError>;
