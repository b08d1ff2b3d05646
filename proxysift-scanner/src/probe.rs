// Liveness probe: route test requests through a candidate acting as forward proxy

use crate::candidate::Candidate;
use crate::error::{ProbeError, Result, ScanError};
use crate::session::{Jitter, Pacer, RetryPolicy, get_with_retry};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_TARGETS: [&str; 2] = ["https://market.yandex.ru/", "https://www.yandex.com"];
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can decide whether a candidate relays traffic.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, candidate: &Candidate, rng: &mut StdRng) -> std::result::Result<(), ProbeError>;
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub targets: Vec<Url>,
    pub per_request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    pub jitter: Jitter,
    /// Skip certificate checks on the proxied leg. Only ever applied to probe clients.
    pub accept_invalid_certs: bool,
}

impl ProbeConfig {
    pub fn with_targets(mut self, targets: Vec<Url>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_request_timeout = timeout;
        self.connect_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            per_request_timeout: DEFAULT_PROBE_TIMEOUT,
            connect_timeout: DEFAULT_PROBE_TIMEOUT,
            retry: RetryPolicy::default(),
            jitter: Jitter::default(),
            accept_invalid_certs: true,
        }
    }
}

pub fn default_targets() -> Vec<Url> {
    DEFAULT_TARGETS
        .iter()
        .filter_map(|t| Url::parse(t).ok())
        .collect()
}

/// Probes candidates over HTTP. Each probe gets a private client and
/// connection pool, since the proxy is fixed per client.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    config: Arc<ProbeConfig>,
}

impl ProbeClient {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    fn client_for(&self, candidate: &Candidate) -> Result<Client> {
        let proxy = Proxy::all(candidate.proxy_url())
            .map_err(|e| ScanError::InvalidCandidate(format!("{}: {}", candidate, e)))?;

        let client = Client::builder()
            .proxy(proxy)
            .timeout(self.config.per_request_timeout)
            .connect_timeout(self.config.connect_timeout)
            .danger_accept_invalid_certs(self.config.accept_invalid_certs)
            .pool_max_idle_per_host(1)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(client)
    }

    /// Walk every target through `candidate`, stopping at the first failure.
    pub async fn check(&self, candidate: &Candidate, rng: &mut StdRng) -> std::result::Result<(), ProbeError> {
        let client = self
            .client_for(candidate)
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        let mut pacer = Pacer::new(self.config.jitter);

        for target in &self.config.targets {
            let response = get_with_retry(&client, target, &self.config.retry, &mut pacer, rng).await?;
            let status = response.status().as_u16();
            if status != 200 {
                debug!("{} via {} answered {}", target, candidate, status);
                return Err(ProbeError::BadStatus(status));
            }
        }

        Ok(())
    }
}

impl Default for ProbeClient {
    fn default() -> Self {
        Self::new(ProbeConfig::default())
    }
}

#[async_trait]
impl Probe for ProbeClient {
    async fn probe(&self, candidate: &Candidate, rng: &mut StdRng) -> std::result::Result<(), ProbeError> {
        self.check(candidate, rng).await
    }
}

/// One-shot boolean check of `candidate` against `targets`.
pub async fn probe(candidate: &Candidate, targets: &[Url], per_request_timeout: Duration) -> bool {
    let client = ProbeClient::new(
        ProbeConfig::default()
            .with_targets(targets.to_vec())
            .with_timeout(per_request_timeout),
    );
    let mut rng = StdRng::from_os_rng();
    match client.check(candidate, &mut rng).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Probe of {} failed: {}", candidate, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    // The mock server plays the candidate: reqwest sends absolute-form
    // requests to it, and it answers per target path.
    fn candidate_for(server: &MockServer) -> Candidate {
        let port = server.address().port();
        Candidate::new(Ipv4Addr::LOCALHOST, port).unwrap()
    }

    fn targets(paths: &[&str]) -> Vec<Url> {
        paths
            .iter()
            .map(|p| Url::parse(&format!("http://probe-target.test{}", p)).unwrap())
            .collect()
    }

    fn test_config(paths: &[&str]) -> ProbeConfig {
        ProbeConfig::default()
            .with_targets(targets(paths))
            .with_timeout(Duration::from_secs(2))
            .with_jitter(Jitter::ZERO)
            .with_retry(RetryPolicy {
                backoff: Duration::ZERO,
                ..RetryPolicy::default()
            })
    }

    #[test]
    fn test_default_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.targets.len(), 2);
        assert!(config.targets.iter().all(|t| t.scheme() == "https"));
        assert_eq!(config.per_request_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.accept_invalid_certs);
    }

    #[tokio::test]
    async fn test_all_targets_pass() {
        let proxy = MockServer::start().await;

        for p in ["/one", "/two"] {
            Mock::given(method("GET"))
                .and(path(p))
                .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
                .expect(1)
                .mount(&proxy)
                .await;
        }

        let client = ProbeClient::new(test_config(&["/one", "/two"]));
        let mut rng = StdRng::seed_from_u64(9);
        let result = client.check(&candidate_for(&proxy), &mut rng).await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_first_target_failure_short_circuits() {
        let proxy = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/one"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&proxy)
            .await;

        Mock::given(method("GET"))
            .and(path("/two"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&proxy)
            .await;

        let client = ProbeClient::new(test_config(&["/one", "/two"]));
        let mut rng = StdRng::seed_from_u64(9);
        let result = client.check(&candidate_for(&proxy), &mut rng).await;

        assert_eq!(result, Err(ProbeError::BadStatus(403)));
        let received = proxy.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_non_200_success_status_fails() {
        let proxy = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&proxy)
            .await;

        let client = ProbeClient::new(test_config(&["/one"]));
        let mut rng = StdRng::seed_from_u64(9);
        let result = client.check(&candidate_for(&proxy), &mut rng).await;

        assert_eq!(result, Err(ProbeError::BadStatus(204)));
    }

    #[tokio::test]
    async fn test_transient_status_is_retried() {
        let proxy = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/one"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&proxy)
            .await;

        Mock::given(method("GET"))
            .and(path("/one"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&proxy)
            .await;

        let client = ProbeClient::new(test_config(&["/one"]));
        let mut rng = StdRng::seed_from_u64(9);
        let result = client.check(&candidate_for(&proxy), &mut rng).await;

        assert_eq!(result, Ok(()));
        assert_eq!(proxy.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail() {
        let proxy = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&proxy)
            .await;

        let client = ProbeClient::new(test_config(&["/one", "/two"]));
        let mut rng = StdRng::seed_from_u64(9);
        let result = client.check(&candidate_for(&proxy), &mut rng).await;

        assert_eq!(result, Err(ProbeError::BadStatus(503)));
    }

    #[tokio::test]
    async fn test_slow_candidate_times_out() {
        let proxy = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&proxy)
            .await;

        let client = ProbeClient::new(
            test_config(&["/one"]).with_timeout(Duration::from_millis(200)),
        );
        let mut rng = StdRng::seed_from_u64(9);
        let result = client.check(&candidate_for(&proxy), &mut rng).await;

        assert_eq!(result, Err(ProbeError::Timeout));
    }

    #[tokio::test]
    async fn test_refused_connection_fails() {
        // Bind then drop to find a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let candidate = Candidate::new(Ipv4Addr::LOCALHOST, port).unwrap();

        let client = ProbeClient::new(test_config(&["/one"]));
        let mut rng = StdRng::seed_from_u64(9);
        let result = client.check(&candidate, &mut rng).await;

        assert_eq!(result, Err(ProbeError::ConnectionRefused));
    }

    #[tokio::test]
    async fn test_boolean_probe_boundary() {
        let proxy = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&proxy)
            .await;

        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&proxy)
            .await;

        let candidate = candidate_for(&proxy);
        assert!(probe(&candidate, &targets(&["/ok"]), Duration::from_secs(2)).await);
        assert!(!probe(&candidate, &targets(&["/down"]), Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_boolean_probe_timeout_is_false() {
        let proxy = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&proxy)
            .await;

        let verdict = probe(&candidate_for(&proxy), &targets(&["/one"]), Duration::from_millis(200)).await;
        assert!(!verdict);
    }
}
