use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DispatchError {
    fn from(e: sqlx::Error) -> Self {
        DispatchError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
