//! Error types for mailhoney

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("read deadline exceeded")]
    Timeout,

    #[error("connection closed by peer")]
    Disconnected,

    #[error("line exceeds maximum length")]
    LineTooLong,

    #[error("server is not listening")]
    NotListening,
}

pub type Result<T> = std::result::Result<T, Error>;
