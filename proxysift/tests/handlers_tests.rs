use proxysift::{command_argument_builder, handle_run};
use proxysift::handlers::*;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn settings(args: &[&str]) -> RunSettings {
    let mut argv = vec!["proxysift"];
    argv.extend_from_slice(args);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    RunSettings::from_matches(&matches)
}

#[test]
fn test_no_flags_uses_defaults() {
    let s = settings(&[]);

    assert_eq!(s.sources_file, None);
    assert_eq!(s.output_dir, PathBuf::from("."));
    assert_eq!(s.targets.len(), 2);
    assert_eq!(s.timeout, Duration::from_secs(10));
    assert_eq!(s.deadline, None);
    assert!(s.threads >= 1);
    assert!(!s.strict_tls);
    assert!(!s.quiet);
    assert_eq!(s.seed, None);
}

#[test]
fn test_probe_config_from_settings() {
    let s = settings(&["--timeout", "3", "--strict-tls"]);
    let config = s.probe_config();

    assert_eq!(config.per_request_timeout, Duration::from_secs(3));
    assert!(!config.accept_invalid_certs);
    assert_eq!(config.retry.max_retries, 3);
}

#[test]
fn test_invalid_certs_accepted_by_default() {
    assert!(settings(&[]).probe_config().accept_invalid_certs);
}

#[test]
fn test_repeated_targets() {
    let s = settings(&["-T", "https://one.example.com/", "--target", "http://two.example.com/ping"]);

    let targets: Vec<&str> = s.targets.iter().map(|t| t.as_str()).collect();
    assert_eq!(targets, vec!["https://one.example.com/", "http://two.example.com/ping"]);
}

#[test]
fn test_invalid_target_rejected() {
    let result = command_argument_builder().try_get_matches_from(["proxysift", "--target", "not a url"]);
    assert!(result.is_err());
}

#[test]
fn test_threads_and_seed() {
    let s = settings(&["-t", "250", "--seed", "42"]);
    assert_eq!(s.threads, 250);
    assert_eq!(s.seed, Some(42));
}

#[test]
fn test_deadline_is_opt_in() {
    assert_eq!(settings(&[]).deadline, None);
    assert_eq!(settings(&["--deadline", "0"]).deadline, None);
    assert_eq!(settings(&["--deadline", "900"]).deadline, Some(Duration::from_secs(900)));
    assert_eq!(deadline_from_secs(0), None);
    assert_eq!(deadline_from_secs(5), Some(Duration::from_secs(5)));
}

#[test]
fn test_expand_output_dir_plain() {
    assert_eq!(expand_output_dir("results"), PathBuf::from("results"));
}

#[test]
fn test_expand_output_dir_tilde() {
    let expanded = expand_output_dir("~/proxies");
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with("proxies"));
}

#[test]
fn test_resolve_sources_default() {
    let sources = resolve_sources(None).unwrap();
    assert_eq!(sources.len(), 17);
}

#[test]
fn test_resolve_sources_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com/http.txt")?;
    writeln!(temp_file, "# skipped")?;
    writeln!(temp_file)?;
    writeln!(temp_file, "lists.example.org/socks5.txt")?;

    let sources = resolve_sources(Some(temp_file.path()))?;

    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].as_str(), "https://example.com/http.txt");
    assert_eq!(sources[1].as_str(), "http://lists.example.org/socks5.txt");
    Ok(())
}

#[test]
fn test_resolve_sources_empty_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "   ").unwrap();

    let result = resolve_sources(Some(temp_file.path()));

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("No valid sources"));
}

async fn serve_list(body: &str) -> wiremock::MockServer {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn sources_file(server: &wiremock::MockServer) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}/list.txt", server.uri()).unwrap();
    file
}

#[tokio::test]
async fn test_run_without_candidates_succeeds() {
    let server = serve_list("<html>nothing here</html>").await;
    let sources = sources_file(&server);
    let out = tempfile::TempDir::new().unwrap();

    let matches = command_argument_builder()
        .try_get_matches_from([
            "proxysift",
            "-q",
            "-s",
            sources.path().to_str().unwrap(),
            "-o",
            out.path().to_str().unwrap(),
        ])
        .unwrap();

    let result = handle_run(&matches).await;

    assert!(result.is_ok(), "unexpected error: {:?}", result);
    assert!(!out.path().join("proxy.txt").exists());
    assert!(!out.path().join("working_proxies.txt").exists());
}

#[tokio::test]
async fn test_run_fails_when_output_is_not_writable() {
    let server = serve_list("1.2.3.4:8080").await;
    let sources = sources_file(&server);
    // a regular file where the output directory should be
    let blocker = NamedTempFile::new().unwrap();

    let matches = command_argument_builder()
        .try_get_matches_from([
            "proxysift",
            "-q",
            "-s",
            sources.path().to_str().unwrap(),
            "-o",
            blocker.path().to_str().unwrap(),
        ])
        .unwrap();

    assert!(handle_run(&matches).await.is_err());
}

#[tokio::test]
async fn test_run_fails_on_missing_sources_file() {
    let matches = command_argument_builder()
        .try_get_matches_from(["proxysift", "-q", "-s", "/nonexistent/sources.txt"])
        .unwrap();

    assert!(handle_run(&matches).await.is_err());
}
