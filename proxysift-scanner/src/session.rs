// Retrying GET with per-attempt browser headers and jittered pacing

use crate::headers::browser_headers;
use rand::Rng;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Statuses worth another attempt; everything else is final.
pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }

    /// Wait before the `retry`-th retry (1-based): backoff * 2^(retry-1)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(1),
            statuses: TRANSIENT_STATUSES.to_vec(),
        }
    }
}

/// Inclusive range a randomized pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub min: Duration,
    pub max: Duration,
}

impl Jitter {
    pub const ZERO: Jitter = Jitter {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn new(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rng.random_range(min..=max))
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(2))
    }
}

/// Spaces out consecutive requests made by one probe or one fetcher.
#[derive(Debug, Clone)]
pub struct Pacer {
    jitter: Jitter,
    sent: u32,
}

impl Pacer {
    pub fn new(jitter: Jitter) -> Self {
        Self { jitter, sent: 0 }
    }

    /// Sleeps before every request except the first one.
    pub async fn pace<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.sent > 0 {
            let pause = self.jitter.sample(rng);
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        self.sent += 1;
    }

    pub fn requests_sent(&self) -> u32 {
        self.sent
    }
}

/// GET `url`, retrying transient statuses with exponential backoff.
///
/// Transport errors are returned immediately. Once retries are exhausted the
/// last response is handed back and the caller decides what its status means.
pub async fn get_with_retry<R: Rng + ?Sized>(
    client: &Client,
    url: &Url,
    policy: &RetryPolicy,
    pacer: &mut Pacer,
    rng: &mut R,
) -> Result<Response, reqwest::Error> {
    let mut retries = 0;
    loop {
        pacer.pace(rng).await;
        let response = client
            .get(url.clone())
            .headers(browser_headers(rng))
            .send()
            .await?;

        let status = response.status().as_u16();
        if retries >= policy.max_retries || !policy.should_retry(status) {
            return Ok(response);
        }

        retries += 1;
        let backoff = policy.backoff_for(retries);
        debug!("{} answered {}, retry {}/{} in {:?}", url, status, retries, policy.max_retries, backoff);
        tokio::time::sleep(backoff).await;
    }
}
