pub mod candidate;
pub mod error;
pub mod fetch;
pub mod headers;
pub mod probe;
pub mod result;
pub mod scheduler;
pub mod session;

pub use candidate::{Candidate, parse_candidates, unique};
pub use error::{ProbeError, ScanError};
pub use fetch::{HttpFetcher, SourceFetcher};
pub use probe::{Probe, ProbeClient, ProbeConfig, probe};
pub use result::{ProbeResult, Verdict};
pub use scheduler::{CancelToken, ProgressCallback, Verification, Verifier, default_worker_limit};
pub use session::{Jitter, RetryPolicy};
