// Result artifacts: the unique candidate list and the working subset

use proxysift_scanner::Candidate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CANDIDATES_FILE: &str = "proxy.txt";
pub const WORKING_FILE: &str = "working_proxies.txt";

pub trait ResultSink {
    fn write_candidates(&self, candidates: &[Candidate]) -> io::Result<()>;
    fn write_working(&self, working: &[Candidate]) -> io::Result<()>;
    /// Drop a working list left behind by an earlier run.
    fn clear_working(&self) -> io::Result<()>;
}

/// One `host:port` per line, newline-joined, no trailing newline.
pub fn render_candidates(candidates: &[Candidate]) -> String {
    candidates
        .iter()
        .map(Candidate::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes both artifacts into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn candidates_path(&self) -> PathBuf {
        self.dir.join(CANDIDATES_FILE)
    }

    pub fn working_path(&self) -> PathBuf {
        self.dir.join(WORKING_FILE)
    }

    fn write(&self, path: &Path, candidates: &[Candidate]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, render_candidates(candidates))
    }
}

impl ResultSink for FileSink {
    fn write_candidates(&self, candidates: &[Candidate]) -> io::Result<()> {
        self.write(&self.candidates_path(), candidates)
    }

    fn write_working(&self, working: &[Candidate]) -> io::Result<()> {
        self.write(&self.working_path(), working)
    }

    fn clear_working(&self) -> io::Result<()> {
        match fs::remove_file(self.working_path()) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
