use crate::candidate::Candidate;
use crate::error::ProbeError;
use serde::Serialize;
use std::time::Duration;

/// Terminal state of one candidate's probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Working,
    Failed(ProbeError),
    /// The batch deadline passed before the probe finished
    Cancelled,
    /// The probe task panicked
    Crashed(String),
}

impl Verdict {
    pub fn is_working(&self) -> bool {
        matches!(self, Verdict::Working)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Working => "success",
            Verdict::Failed(e) => e.label(),
            Verdict::Cancelled => "cancelled",
            Verdict::Crashed(_) => "crashed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub candidate: Candidate,
    pub working: bool,
    pub cause: &'static str,
    #[serde(skip)]
    pub verdict: Verdict,
    pub elapsed: Duration,
}

impl ProbeResult {
    pub fn new(candidate: Candidate, verdict: Verdict, elapsed: Duration) -> Self {
        Self {
            candidate,
            working: verdict.is_working(),
            cause: verdict.label(),
            verdict,
            elapsed,
        }
    }
}
