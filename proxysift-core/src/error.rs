use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("No proxies fetched from {0} source(s)")]
    NoCandidates(usize),

    #[error("Failed to write results: {0}")]
    Sink(#[from] std::io::Error),

    #[error("Invalid source list: {0}")]
    Sources(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
