use thiserror::Error;

/// Error taxonomy shared by every component boundary. REST handlers map
/// kinds to HTTP statuses; the gateway serializes them into `Error` events
/// on the sending connection.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("internal error")]
    Server(#[from] anyhow::Error),
}

impl MarketError {
    pub fn invalid(detail: impl Into<String>) -> Self {
        MarketError::InvalidInput(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        MarketError::Forbidden(detail.into())
    }

    /// Stable kind tag used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::InvalidInput(_) => "invalid_input",
            MarketError::NotFound(_) => "not_found",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::Server(_) => "server_error",
        }
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
