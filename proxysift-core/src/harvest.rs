use crate::error::{HarvestError, Result};
use crate::report::RunSummary;
use crate::sink::ResultSink;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use proxysift_scanner::{Candidate, Probe, ProbeResult, SourceFetcher, Verifier, parse_candidates, unique};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use url::Url;

/// Options for configuring a harvest run
pub struct HarvestOptions {
    pub sources: Vec<Url>,
    pub show_progress_bars: bool,
}

/// Working set of a single run. Nothing carries over between runs.
#[derive(Debug, Clone)]
pub struct RunBatch {
    pub sources: Vec<Url>,
    pub candidates: HashSet<Candidate>,
    pub working: HashSet<Candidate>,
    pub results: Vec<ProbeResult>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RunBatch {
    pub fn new(sources: Vec<Url>) -> Self {
        Self {
            sources,
            candidates: HashSet::new(),
            working: HashSet::new(),
            results: Vec::new(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn candidates_sorted(&self) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self.candidates.iter().copied().collect();
        candidates.sort();
        candidates
    }

    pub fn working_sorted(&self) -> Vec<Candidate> {
        let mut working: Vec<Candidate> = self.working.iter().copied().collect();
        working.sort();
        working
    }

    pub fn summary(&self) -> RunSummary {
        let mut failures = BTreeMap::new();
        for result in self.results.iter().filter(|r| !r.working) {
            *failures.entry(result.cause.to_string()).or_insert(0) += 1;
        }

        RunSummary {
            started_at: self.started_at,
            elapsed_ms: self.elapsed.as_millis() as u64,
            sources: self.sources.len(),
            candidates: self.candidates.len(),
            working: self.working.len(),
            failures,
        }
    }
}

/// Fetch every source in order, parse it, and fold the matches into the batch.
pub async fn collect_candidates<F>(fetcher: &F, batch: &mut RunBatch)
where
    F: SourceFetcher + ?Sized,
{
    let total = batch.sources.len();
    let mut all = Vec::new();

    for (idx, source) in batch.sources.iter().enumerate() {
        let body = fetcher.fetch(source).await;
        let found: Vec<Candidate> = parse_candidates(&body).collect();
        info!("Found {} proxies from {}", found.len(), source);
        all.extend(found);
        info!("Progress: {}/{} sources processed", idx + 1, total);
    }

    batch.candidates.extend(unique(all));
}

/// Execute a full run: collect, persist the unique list, verify, persist the working subset.
///
/// Aborts with [`HarvestError::NoCandidates`] before probing when no source
/// produced a single candidate. An empty working set is only a warning.
pub async fn execute_harvest<F, P, S>(
    options: HarvestOptions,
    fetcher: &F,
    verifier: Verifier<P>,
    sink: &S,
) -> Result<RunBatch>
where
    F: SourceFetcher + ?Sized,
    P: Probe + 'static,
    S: ResultSink + ?Sized,
{
    let HarvestOptions {
        sources,
        show_progress_bars,
    } = options;

    let clock = Instant::now();
    let mut batch = RunBatch::new(sources);

    collect_candidates(fetcher, &mut batch).await;

    if batch.candidates.is_empty() {
        error!("No proxies fetched. Exiting.");
        return Err(HarvestError::NoCandidates(batch.sources.len()));
    }

    sink.write_candidates(&batch.candidates_sorted())?;
    info!("Saved {} unique proxies", batch.candidates.len());

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(batch.candidates.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(Arc::new(pb))
    } else {
        None
    };

    let verifier = match progress_bar {
        Some(ref pb) => {
            let pb_clone = pb.clone();
            let working_count = Arc::new(AtomicUsize::new(0));
            verifier.with_progress_callback(Arc::new(move |result: &ProbeResult| {
                if result.working {
                    let found = working_count.fetch_add(1, Ordering::Relaxed) + 1;
                    pb_clone.set_message(format!("{} working", found));
                }
                pb_clone.inc(1);
            }))
        }
        None => verifier,
    };

    let verification = verifier.verify(batch.candidates.iter().copied()).await;

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!("{} working", verification.working.len()));
    }

    batch.working = verification.working;
    batch.results = verification.results;

    if batch.working.is_empty() {
        warn!("No working proxies found");
        sink.clear_working()?;
    } else {
        sink.write_working(&batch.working_sorted())?;
        info!("Saved {} working proxies", batch.working.len());
    }

    batch.elapsed = clock.elapsed();
    Ok(batch)
}
