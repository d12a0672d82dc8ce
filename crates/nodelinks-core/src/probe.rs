//! Latency prober: one HEAD request per mirror, timed from send to first response headers.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Serialize;

use crate::http_client::build_probe_client;
use crate::utils;

/// Outcome of one probe. Exactly one of `elapsed_ms` / `error` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub target: String,
    pub elapsed_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn success(target: &str, elapsed_ms: u64, status_code: Option<u16>) -> Self {
        Self {
            target: target.to_string(),
            elapsed_ms: Some(elapsed_ms),
            status_code,
            error: None,
        }
    }

    pub fn failure(target: &str, error: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            elapsed_ms: None,
            status_code: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.elapsed_ms.is_some()
    }
}

/// Human rating of a measured latency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatencyRating {
    Excellent,
    Fast,
    Good,
    Fair,
    Slow,
}

impl LatencyRating {
    pub fn from_ms(ms: u64) -> Self {
        match ms {
            0..=99 => LatencyRating::Excellent,
            100..=299 => LatencyRating::Fast,
            300..=799 => LatencyRating::Good,
            800..=1499 => LatencyRating::Fair,
            _ => LatencyRating::Slow,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LatencyRating::Excellent => "excellent",
            LatencyRating::Fast => "fast",
            LatencyRating::Good => "good",
            LatencyRating::Fair => "fair",
            LatencyRating::Slow => "slow",
        }
    }
}

/// Request URL for an address: https:// when no scheme is given, always a trailing slash.
pub fn probe_url(address: &str) -> String {
    let address = address.trim();
    let mut url = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Probe with a shared client. Never retries; every failure becomes an error result.
pub async fn probe_with(client: &Client, address: &str, timeout_ms: u64) -> ProbeResult {
    let url = probe_url(address);
    let start = Instant::now();
    let outcome = client
        .head(&url)
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await;
    let result = match outcome {
        Ok(resp) => {
            let elapsed = start.elapsed().as_millis() as u64;
            ProbeResult::success(address, elapsed, Some(resp.status().as_u16()))
        }
        Err(e) if e.is_timeout() => ProbeResult::failure(
            address,
            format!("request timed out after {}ms", timeout_ms),
        ),
        Err(e) if e.is_redirect() => ProbeResult::failure(address, format!("too many redirects: {}", e)),
        Err(e) => ProbeResult::failure(address, describe_error(&e)),
    };
    match (&result.elapsed_ms, &result.error) {
        (Some(ms), _) => utils::trace(&format!("probe {} -> {}ms ({:?})", url, ms, result.status_code)),
        (_, Some(err)) => utils::trace(&format!("probe {} failed: {}", url, err)),
        _ => {}
    }
    result
}

/// Probe a single address with its own client.
pub async fn probe(address: &str, timeout_ms: u64) -> ProbeResult {
    match build_probe_client(Duration::from_millis(timeout_ms)) {
        Ok(client) => probe_with(&client, address, timeout_ms).await,
        Err(e) => ProbeResult::failure(address, e.to_string()),
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one raw HTTP response on a local port; returns the base address.
    async fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_probe_url_defaults() {
        assert_eq!(probe_url("registry.npmjs.org"), "https://registry.npmjs.org/");
        assert_eq!(
            probe_url("mirrors.cloud.tencent.com/npm/"),
            "https://mirrors.cloud.tencent.com/npm/"
        );
        assert_eq!(probe_url("http://localhost:4873"), "http://localhost:4873/");
    }

    #[test]
    fn test_latency_rating_bands() {
        assert_eq!(LatencyRating::from_ms(50), LatencyRating::Excellent);
        assert_eq!(LatencyRating::from_ms(100), LatencyRating::Fast);
        assert_eq!(LatencyRating::from_ms(799), LatencyRating::Good);
        assert_eq!(LatencyRating::from_ms(1499), LatencyRating::Fair);
        assert_eq!(LatencyRating::from_ms(1500), LatencyRating::Slow);
    }

    #[tokio::test]
    async fn test_probe_success_records_status() {
        let base = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string(),
        )
        .await;
        let result = probe(&base, 2000).await;
        assert!(result.is_ok(), "{:?}", result);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.target, base);
    }

    #[tokio::test]
    async fn test_probe_follows_redirects() {
        let final_base = serve_once(
            "HTTP/1.1 204 No Content\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string(),
        )
        .await;
        let first = serve_once(format!(
            "HTTP/1.1 301 Moved Permanently\r\nlocation: {}/\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            final_base
        ))
        .await;
        let result = probe(&first, 2000).await;
        assert!(result.is_ok(), "{:?}", result);
        assert_eq!(result.status_code, Some(204));
    }

    #[tokio::test]
    async fn test_probe_timeout_is_an_error_without_elapsed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((sock, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(sock);
            }
        });
        let result = probe(&format!("http://{}", addr), 200).await;
        assert!(!result.is_ok());
        assert!(result.elapsed_ms.is_none());
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_probe_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let result = probe(&format!("http://{}", addr), 1000).await;
        assert!(result.elapsed_ms.is_none());
        assert!(result.error.is_some());
    }
}
