// Run summary: terminal text and JSON

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub sources: usize,
    pub candidates: usize,
    pub working: usize,
    /// Failed probes keyed by cause label
    pub failures: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let json_report = serde_json::json!({
            "metadata": {
                "generator": "Proxysift",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": Utc::now().to_rfc3339(),
            },
            "run": self,
        });
        serde_json::to_string_pretty(&json_report)
    }
}

pub fn generate_summary_report(summary: &RunSummary) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Started:           {}\n", summary.started_at.to_rfc3339()));
    report.push_str(&format!("  Duration:          {:.1}s\n", summary.elapsed_ms as f64 / 1000.0));
    report.push_str(&format!("  Sources processed: {}\n", summary.sources));
    report.push_str(&format!("  Unique proxies:    {}\n", summary.candidates));
    report.push_str(&format!("  Working proxies:   {}\n", summary.working));

    if !summary.failures.is_empty() {
        report.push_str("\n# Failures:\n");
        for (cause, count) in &summary.failures {
            report.push_str(&format!("  {:<20} {}\n", cause, count));
        }
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
