use std::error::Error as StdError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Why a single probe failed. Collapsed to a boolean at the public boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("request timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("unexpected status {0}")]
    BadStatus(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ProbeError {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeError::Timeout => "timeout",
            ProbeError::ConnectionRefused => "connection-refused",
            ProbeError::BadStatus(_) => "bad-status",
            ProbeError::Transport(_) => "transport-error",
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ProbeError::Timeout;
        }

        if let Some(status) = err.status() {
            return ProbeError::BadStatus(status.as_u16());
        }

        // hyper buries the io error a few levels down
        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                match io_err.kind() {
                    io::ErrorKind::ConnectionRefused => return ProbeError::ConnectionRefused,
                    io::ErrorKind::TimedOut => return ProbeError::Timeout,
                    _ => {}
                }
            }
            source = cause.source();
        }

        ProbeError::Transport(err.to_string())
    }
}
