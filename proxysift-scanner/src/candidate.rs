// Candidate proxy endpoints: extraction from raw source text and deduplication

use crate::error::{Result, ScanError};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::LazyLock;

static CANDIDATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"((?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)):(\d{2,5})",
    )
    .expect("candidate pattern is a valid regex")
});

/// A parsed, not yet verified `host:port` proxy endpoint.
///
/// Equality and hashing follow the normalized `host:port` form, so
/// `010.0.0.1:0080` and `10.0.0.1:80` are the same candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    host: Ipv4Addr,
    port: u16,
}

impl Candidate {
    /// Returns `None` for port 0.
    pub fn new(host: Ipv4Addr, port: u16) -> Option<Self> {
        (port != 0).then_some(Self { host, port })
    }

    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL used to route requests through this candidate as a forward proxy
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    fn from_parts(host: &str, port: &str) -> Option<Self> {
        let mut octets = [0u8; 4];
        let mut parts = host.split('.');
        for octet in octets.iter_mut() {
            *octet = parts.next()?.parse().ok()?;
        }
        if parts.next().is_some() {
            return None;
        }

        // parse wide so 70000 is rejected instead of overflowing
        let port: u32 = port.parse().ok()?;
        if !(1..=u16::MAX as u32).contains(&port) {
            return None;
        }

        Self::new(Ipv4Addr::from(octets), port as u16)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Candidate {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (host, port) = trimmed
            .split_once(':')
            .ok_or_else(|| ScanError::InvalidCandidate(trimmed.to_string()))?;

        let well_formed = !host.is_empty()
            && host.split('.').all(|o| (1..=3).contains(&o.len()))
            && (1..=5).contains(&port.len())
            && host.chars().all(|c| c.is_ascii_digit() || c == '.')
            && port.chars().all(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(ScanError::InvalidCandidate(trimmed.to_string()));
        }

        Self::from_parts(host, port).ok_or_else(|| ScanError::InvalidCandidate(trimmed.to_string()))
    }
}

impl Serialize for Candidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Candidate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Lazily extract every plausible candidate from raw text (plain lists or HTML).
///
/// A match glued to a neighbouring digit is dropped rather than trimmed:
/// `999.1.1.1:80` must not yield `99.1.1.1:80`, and `1.1.1.1:123456`
/// must not yield port `12345`.
pub fn parse_candidates(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    let bytes = text.as_bytes();
    CANDIDATE_PATTERN.captures_iter(text).filter_map(move |caps| {
        let whole = caps.get(0)?;
        let glued_before = whole.start() > 0 && bytes[whole.start() - 1].is_ascii_digit();
        let glued_after = bytes.get(whole.end()).is_some_and(|b| b.is_ascii_digit());
        if glued_before || glued_after {
            return None;
        }
        Candidate::from_parts(caps.get(1)?.as_str(), caps.get(2)?.as_str())
    })
}

/// Reduce a multiset of candidates to its unique members.
pub fn unique<I>(candidates: I) -> HashSet<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    candidates.into_iter().collect()
}
