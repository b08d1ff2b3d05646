// Proxy-source fetching: one outer GET per source list, never fatal

use crate::error::{Result, ScanError};
use crate::session::{Jitter, Pacer, RetryPolicy, get_with_retry};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reqwest::Client;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};
use url::Url;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Raw body of `url`, or an empty string if it could not be fetched.
    async fn fetch(&self, url: &Url) -> String;
}

struct FetchState {
    rng: StdRng,
    pacer: Pacer,
}

pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    state: Mutex<FetchState>,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            retry: RetryPolicy::default(),
            state: Mutex::new(FetchState {
                rng: StdRng::from_os_rng(),
                pacer: Pacer::new(Jitter::default()),
            }),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.state.get_mut().pacer = Pacer::new(jitter);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.state.get_mut().rng = StdRng::seed_from_u64(seed);
        self
    }

    async fn try_fetch(&self, url: &Url) -> Result<String> {
        let mut state = self.state.lock().await;
        let FetchState { rng, pacer } = &mut *state;

        let response = get_with_retry(&self.client, url, &self.retry, pacer, rng).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> String {
        info!("Fetching proxies from {}...", url);
        match self.try_fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                error!("Error fetching proxies from {}: {}", url, e);
                String::new()
            }
        }
    }
}
