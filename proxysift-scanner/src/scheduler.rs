// Concurrent verification of a candidate batch
//
// One task per unique candidate, a semaphore bounding how many probe at once,
// and a batch deadline that cancels whatever is still running when it expires.

use crate::candidate::{Candidate, unique};
use crate::probe::Probe;
use crate::result::{ProbeResult, Verdict};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, error, info, warn};

pub const MAX_WORKERS: usize = 4000;
const WORKERS_PER_CORE: usize = 512;

pub type ProgressCallback = Arc<dyn Fn(&ProbeResult) + Send + Sync>;

/// Pick a worker pool size from core count and the open-file soft limit.
pub fn default_worker_limit() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut limit = MAX_WORKERS.min(cores.saturating_mul(WORKERS_PER_CORE));

    // every in-flight probe holds at least one socket
    if let Some(files) = open_file_limit() {
        limit = limit.min((files / 2) as usize);
    }

    limit.max(1)
}

fn open_file_limit() -> Option<u64> {
    let limits = std::fs::read_to_string("/proc/self/limits").ok()?;
    let line = limits.lines().find(|l| l.starts_with("Max open files"))?;
    line.split_whitespace().nth(3)?.parse().ok()
}

/// Shared cancellation flag handed to every probe task.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        let closed = receiver.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one verification batch.
#[derive(Debug, Clone, Default)]
pub struct Verification {
    /// In completion order
    pub results: Vec<ProbeResult>,
    pub working: HashSet<Candidate>,
}

impl Verification {
    pub fn working_sorted(&self) -> Vec<Candidate> {
        let mut working: Vec<Candidate> = self.working.iter().copied().collect();
        working.sort();
        working
    }

    pub fn counts_by_cause(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.cause).or_insert(0) += 1;
        }
        counts
    }
}

pub struct Verifier<P: Probe + 'static> {
    prober: Arc<P>,
    workers: usize,
    deadline: Option<Duration>,
    seed: Option<u64>,
    progress_callback: Option<ProgressCallback>,
}

impl<P: Probe + 'static> Verifier<P> {
    pub fn new(prober: P) -> Self {
        Self::from_arc(Arc::new(prober))
    }

    pub fn from_arc(prober: Arc<P>) -> Self {
        Self {
            prober,
            workers: default_worker_limit(),
            deadline: None,
            seed: None,
            progress_callback: None,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Fix the randomness handed to probes (header rotation, pacing).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Probe every unique candidate once and collect the working ones.
    ///
    /// Returns only after every task has reported, including those cut
    /// short by the deadline.
    pub async fn verify<I>(&self, candidates: I) -> Verification
    where
        I: IntoIterator<Item = Candidate>,
    {
        // sorted so a fixed seed maps to the same per-candidate rng every run
        let mut candidates: Vec<Candidate> = unique(candidates).into_iter().collect();
        candidates.sort();
        let total = candidates.len();

        info!("Testing {} unique proxies with {} workers", total, self.workers);

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let cancel = CancelToken::new();
        let mut master = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut pending = FuturesUnordered::new();
        for candidate in candidates {
            let prober = self.prober.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let mut rng = StdRng::seed_from_u64(master.random());

            let handle = tokio::spawn(async move {
                let start = Instant::now();
                let verdict = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Verdict::Cancelled,
                    verdict = run_probe(prober.as_ref(), &candidate, &semaphore, &mut rng) => verdict,
                };
                ProbeResult::new(candidate, verdict, start.elapsed())
            });

            pending.push(async move { (candidate, handle.await) });
        }

        let deadline = self.deadline;
        let expiry = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let mut verification = Verification {
            results: Vec::with_capacity(total),
            working: HashSet::new(),
        };

        loop {
            tokio::select! {
                next = pending.next() => {
                    let Some((candidate, joined)) = next else {
                        break;
                    };

                    let result = match joined {
                        Ok(result) => result,
                        Err(e) => {
                            error!("Error checking {}: {}", candidate, e);
                            ProbeResult::new(candidate, Verdict::Crashed(e.to_string()), Duration::ZERO)
                        }
                    };

                    if result.working {
                        info!("Working proxy found: {}", candidate);
                        verification.working.insert(candidate);
                    }

                    if let Some(ref callback) = self.progress_callback {
                        callback(&result);
                    }

                    verification.results.push(result);
                }
                _ = &mut expiry, if !cancel.is_cancelled() => {
                    warn!(
                        "Verification deadline reached, cancelling {} unfinished probes",
                        total - verification.results.len()
                    );
                    cancel.cancel();
                }
            }
        }

        info!(
            "Verification complete: {}/{} working",
            verification.working.len(),
            total
        );
        verification
    }
}

async fn run_probe<P: Probe + ?Sized>(
    prober: &P,
    candidate: &Candidate,
    semaphore: &Semaphore,
    rng: &mut StdRng,
) -> Verdict {
    let Ok(_permit) = semaphore.acquire().await else {
        return Verdict::Cancelled;
    };

    match prober.probe(candidate, rng).await {
        Ok(()) => Verdict::Working,
        Err(e) => {
            debug!("Proxy {} failed: {}", candidate, e);
            Verdict::Failed(e)
        }
    }
}
