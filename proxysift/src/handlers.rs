use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use proxysift_core::report::{generate_summary_report, save_report};
use proxysift_core::sources::{default_sources, load_sources};
use proxysift_core::{FileSink, HarvestError, HarvestOptions, RunBatch, execute_harvest};
use proxysift_scanner::probe::default_targets;
use proxysift_scanner::{HttpFetcher, ProbeClient, ProbeConfig, Verifier, default_worker_limit};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;
use url::Url;

/// Everything a run needs, pulled out of the parsed arguments
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub sources_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub targets: Vec<Url>,
    pub threads: usize,
    pub timeout: Duration,
    pub deadline: Option<Duration>,
    pub seed: Option<u64>,
    pub strict_tls: bool,
    pub summary_path: Option<PathBuf>,
    pub verbose: bool,
    pub quiet: bool,
}

impl RunSettings {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let targets: Vec<Url> = matches
            .get_many::<Url>("target")
            .map(|t| t.cloned().collect())
            .unwrap_or_default();

        Self {
            sources_file: matches.get_one::<PathBuf>("sources").cloned(),
            output_dir: expand_output_dir(
                matches
                    .get_one::<String>("output")
                    .map(String::as_str)
                    .unwrap_or("."),
            ),
            targets: if targets.is_empty() { default_targets() } else { targets },
            threads: matches
                .get_one::<usize>("threads")
                .copied()
                .unwrap_or_else(default_worker_limit),
            timeout: Duration::from_secs(*matches.get_one::<u64>("timeout").unwrap_or(&10)),
            deadline: deadline_from_secs(*matches.get_one::<u64>("deadline").unwrap_or(&0)),
            seed: matches.get_one::<u64>("seed").copied(),
            strict_tls: matches.get_flag("strict-tls"),
            summary_path: matches.get_one::<PathBuf>("summary").cloned(),
            verbose: matches.get_flag("verbose"),
            quiet: matches.get_flag("quiet"),
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig::default()
            .with_targets(self.targets.clone())
            .with_timeout(self.timeout)
            .with_accept_invalid_certs(!self.strict_tls)
    }
}

/// Zero means no batch deadline
pub fn deadline_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn expand_output_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Sources from a file if one was given, otherwise the built-in list
pub fn resolve_sources(sources_file: Option<&Path>) -> Result<Vec<Url>> {
    match sources_file {
        Some(path) => Ok(load_sources(path)?),
        None => Ok(default_sources()),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    // a second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

pub async fn handle_run(matches: &ArgMatches) -> Result<()> {
    let settings = RunSettings::from_matches(matches);
    init_tracing(settings.verbose);

    let sources = resolve_sources(settings.sources_file.as_deref())?;

    if !settings.quiet {
        println!("Sources: {}", sources.len());
        println!("Workers: {}", settings.threads);
        println!(
            "Targets: {}",
            settings
                .targets
                .iter()
                .map(Url::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        match settings.deadline {
            Some(deadline) => println!("Deadline: {}s\n", deadline.as_secs()),
            None => println!("Deadline: none\n"),
        }
    }

    let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;
    let mut verifier = Verifier::new(ProbeClient::new(settings.probe_config()))
        .with_workers(settings.threads)
        .with_deadline(settings.deadline);
    if let Some(seed) = settings.seed {
        verifier = verifier.with_seed(seed);
    }
    let sink = FileSink::new(&settings.output_dir);

    let options = HarvestOptions {
        sources,
        show_progress_bars: !settings.quiet,
    };

    // Nothing fetched is logged by the harvest and is not a failed run
    let batch = match execute_harvest(options, &fetcher, verifier, &sink).await {
        Ok(batch) => batch,
        Err(HarvestError::NoCandidates(_)) => {
            if !settings.quiet {
                println!("{} No proxies fetched, nothing to verify", "⚠".yellow().bold());
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    print_outcome(&batch, &sink, settings.quiet);

    if let Some(ref path) = settings.summary_path {
        let json = batch
            .summary()
            .to_json()
            .context("Failed to serialize run summary")?;
        save_report(&json, path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        if !settings.quiet {
            println!("{} Summary written to {}", "✓".green().bold(), path.display());
        }
    }

    Ok(())
}

fn print_outcome(batch: &RunBatch, sink: &FileSink, quiet: bool) {
    if quiet {
        return;
    }

    println!();
    print!("{}", generate_summary_report(&batch.summary()));
    println!(
        "{} {} unique proxies saved to {}",
        "✓".green().bold(),
        batch.candidates.len(),
        sink.candidates_path().display().to_string().bright_white()
    );
    if batch.working.is_empty() {
        println!("{} No working proxies found", "⚠".yellow().bold());
    } else {
        println!(
            "{} {} working proxies saved to {}",
            "✓".green().bold(),
            batch.working.len().to_string().cyan(),
            sink.working_path().display().to_string().bright_white()
        );
    }
}
