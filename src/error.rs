//! Error types for the pricewise host.

/// Top-level error type for the pricewise host.
#[derive(Debug, thiserror::Error)]
pub enum PricewiseError {
    /// Configuration file could not be parsed or written.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The search core rejected the setup.
    #[error(transparent)]
    Search(#[from] pricewise_search::SearchError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PricewiseError>;
