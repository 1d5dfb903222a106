use crate::config::FetchConfig;
use crate::prelude::*;
use convertkit_core::ConvertError;

const USER_AGENT: &str = concat!("convertkit/", env!("CARGO_PKG_VERSION"));

/// Shared client for the CSV URL fetch.
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

fn classify(url: &str, e: reqwest::Error, config: &FetchConfig) -> Error {
    if e.is_timeout() {
        Error::FetchTimeout(config.timeout)
    } else {
        Error::Fetch(f!("Failed to fetch {url}: {e}"))
    }
}

/// Download `url` with a total timeout and a body size cap. No retries.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    config: &FetchConfig,
) -> std::result::Result<Vec<u8>, Error> {
    let parsed =
        reqwest::Url::parse(url).map_err(|e| Error::Fetch(f!("Invalid URL '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Fetch(f!(
            "Unsupported URL scheme '{}'; only http and https are allowed",
            parsed.scheme()
        )));
    }

    log::debug!("Fetching {url}");
    let download = async {
        let mut response = client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify(url, e, config))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(f!(
                "Failed to fetch {url}: HTTP {}",
                response.status()
            )));
        }

        let too_large = || {
            Error::Convert(ConvertError::SizeLimit(f!(
                "Remote file exceeds the limit of {} bytes",
                config.max_bytes
            )))
        };

        if response
            .content_length()
            .is_some_and(|length| length > config.max_bytes as u64)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| classify(url, e, config))? {
            if body.len() + chunk.len() > config.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok::<_, Error>(body)
    };

    let body = tokio::time::timeout(config.timeout, download)
        .await
        .map_err(|_| Error::FetchTimeout(config.timeout))??;
    log::debug!("Fetched {} bytes from {url}", body.len());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::time::Duration;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        f!("http://{addr}")
    }

    fn config(timeout: Duration, max_bytes: usize) -> FetchConfig {
        FetchConfig { timeout, max_bytes }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let base = spawn(Router::new().route("/data.csv", get(|| async { "a,b\n1,2\n" }))).await;
        let config = FetchConfig::default();
        let client = build_client(&config).unwrap();

        let body = fetch_bytes(&client, &f!("{base}/data.csv"), &config).await.unwrap();
        assert_eq!(body, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let base = spawn(Router::new().route("/gone", get(|| async { StatusCode::NOT_FOUND }))).await;
        let config = FetchConfig::default();
        let client = build_client(&config).unwrap();

        let err = fetch_bytes(&client, &f!("{base}/gone"), &config).await.unwrap_err();
        assert_eq!(err.kind(), "fetch_error");
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_rejects_other_schemes() {
        let config = FetchConfig::default();
        let client = build_client(&config).unwrap();

        for url in ["file:///etc/passwd", "ftp://example.com/a.csv", "not a url"] {
            let err = fetch_bytes(&client, url, &config).await.unwrap_err();
            assert_eq!(err.kind(), "fetch_error", "url: {url}");
        }
    }

    #[tokio::test]
    async fn test_fetch_body_too_large() {
        let base = spawn(Router::new().route("/big", get(|| async { "x".repeat(64) }))).await;
        let config = config(Duration::from_secs(5), 16);
        let client = build_client(&config).unwrap();

        let err = fetch_bytes(&client, &f!("{base}/big"), &config).await.unwrap_err();
        assert_eq!(err.kind(), "size_limit");
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let base = spawn(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;
        let config = config(Duration::from_millis(300), 1024);
        let client = build_client(&config).unwrap();

        let started = std::time::Instant::now();
        let err = fetch_bytes(&client, &f!("{base}/slow"), &config).await.unwrap_err();
        assert_eq!(err.kind(), "fetch_timeout");
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
