use thiserror::Error;

#[derive(Error, Debug)]
pub enum TesselError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Notify error: {0}")]
    Notify(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TesselError {
    /// Infrastructure failures where the outcome is unknown and a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Timeout(_) | Self::Redis(_) | Self::Etcd(_) | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TesselError>;
