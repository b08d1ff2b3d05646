// Proxy list sources: the built-in set, or a user supplied file

use crate::error::{HarvestError, Result};
use std::fs;
use std::path::Path;
use tracing::warn;
use url::Url;

pub const DEFAULT_SOURCES: &[&str] = &[
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt",
    "https://raw.githubusercontent.com/ShiftyTR/Proxy-List/master/http.txt",
    "https://raw.githubusercontent.com/hookzof/socks5_list/master/proxy.txt",
    "https://api.proxyscrape.com/v4/free-proxy-list/get?request=display_proxies&country=sg&proxy_format=protocolipport&format=text&timeout=20000",
    "https://api.proxyscrape.com/v4/free-proxy-list/get?request=display_proxies&country=ae&proxy_format=protocolipport&format=text&timeout=20000",
    "https://api.proxyscrape.com/v4/free-proxy-list/get?request=display_proxies&country=in&proxy_format=protocolipport&format=text&timeout=20000",
    "https://api.proxyscrape.com/v4/free-proxy-list/get?request=display_proxies&country=gb&proxy_format=protocolipport&format=text&timeout=20000",
    "https://api.proxyscrape.com/v4/free-proxy-list/get?request=display_proxies&country=us&proxy_format=protocolipport&format=text&timeout=20000",
    "https://www.proxy-list.download/api/v1/get?type=http",
    "https://www.proxy-list.download/api/v1/get?type=https",
    "https://www.proxy-list.download/api/v1/get?type=socks4",
    "https://www.proxy-list.download/api/v1/get?type=socks5",
    "https://www.fast-proxy.net/",
    "https://free-proxy-list.net/",
    "https://www.us-proxy.org/",
    "https://uk-proxy.uk/",
    "https://www.hidemyass.com/proxy/",
];

pub fn default_sources() -> Vec<Url> {
    DEFAULT_SOURCES
        .iter()
        .filter_map(|s| Url::parse(s).ok())
        .collect()
}

/// Parse a single line as a source URL, trying to add http:// if needed
pub fn parse_source_line(line: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(url);
    }

    if let Ok(url) = Url::parse(&format!("http://{}", line))
        && url.host_str().is_some_and(|h| h.contains('.') || h == "localhost")
    {
        return Some(url);
    }

    warn!("Skipping invalid source '{}'", line);
    None
}

/// Load source URLs from a newline-delimited file. Blank lines and `#` comments are skipped.
pub fn load_sources(path: &Path) -> Result<Vec<Url>> {
    let content = fs::read_to_string(path).map_err(|e| {
        HarvestError::Sources(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let sources: Vec<Url> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_source_line)
        .collect();

    if sources.is_empty() {
        return Err(HarvestError::Sources(format!(
            "No valid sources found in {}",
            path.display()
        )));
    }

    Ok(sources)
}
