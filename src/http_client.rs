use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::{header, Client};
use std::time::Duration;

const MAX_BACKOFF_SECS: u64 = 10;
const JITTER_MAX_SECS: u64 = 2;

/// Creates an HTTP client that looks like a French-speaking desktop browser
pub fn create_http_client(user_agent: &str) -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8")
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("fr-FR,fr;q=0.9")
    );
    headers.insert(
        header::ACCEPT_ENCODING,
        header::HeaderValue::from_static("gzip, deflate, br")
    );
    headers.insert(
        header::CONNECTION,
        header::HeaderValue::from_static("keep-alive")
    );
    headers.insert(
        "Upgrade-Insecure-Requests",
        header::HeaderValue::from_static("1")
    );

    let client = Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .cookie_store(true)
        .timeout(Duration::from_secs(30))
        .build()?;

    Ok(client)
}

/// Fetches raw documents. Implementations own retries; a returned error is
/// final for that URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, max_attempts: u32) -> Result<Self> {
        Ok(Self {
            client: create_http_client(user_agent)?,
            max_attempts: max_attempts.max(1),
        })
    }

    async fn try_fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} for {}", status, url);
        }

        let body = response.text().await?;
        if is_captcha_page(&body) {
            bail!("Anti-bot challenge returned for {}", url);
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            let start = std::time::Instant::now();

            match self.try_fetch(url).await {
                Ok(body) => {
                    tracing::debug!("Fetched {} ({} bytes) on attempt {} in {:?}",
                        url, body.len(), attempt, start.elapsed());
                    return Ok(body);
                }
                Err(e) => {
                    tracing::warn!("Attempt {}/{} for {} failed in {:?}: {}",
                        attempt, self.max_attempts, url, start.elapsed(), e);
                    last_err = Some(e);

                    if attempt < self.max_attempts {
                        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
                        tokio::time::sleep(backoff_delay(attempt, jitter)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("No fetch attempt made for {}", url)))
    }
}

/// `min(2 * attempt, 10)` seconds plus jitter.
pub fn backoff_delay(attempt: u32, jitter_secs: u64) -> Duration {
    let base = std::cmp::min(2 * attempt as u64, MAX_BACKOFF_SECS);
    Duration::from_secs(base + jitter_secs)
}

/// Detects CAPTCHA and anti-bot interstitials served instead of results
pub fn is_captcha_page(html: &str) -> bool {
    let html_lower = html.to_lowercase();

    html_lower.contains("recaptcha") ||
    html_lower.contains("hcaptcha") ||
    html_lower.contains("g-recaptcha") ||
    html_lower.contains("cf-browser-verification") ||
    html_lower.contains("cf_chl_opt") ||
    html_lower.contains("<title>access denied")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_http_client_succeeds() {
        let result = create_http_client("Mozilla/5.0 (Test Agent)");
        assert!(result.is_ok(), "Client creation should succeed");
    }

    #[test]
    fn test_http_client_with_different_user_agents() {
        let user_agents = vec![
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)",
        ];

        for ua in user_agents {
            let client = create_http_client(ua);
            assert!(client.is_ok(), "Failed to create client with user agent: {}", ua);
        }
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        assert_eq!(backoff_delay(1, 0), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, 1), Duration::from_secs(7));
        assert_eq!(backoff_delay(8, 0), Duration::from_secs(10));
        assert_eq!(backoff_delay(50, 2), Duration::from_secs(12));
    }

    #[test]
    fn test_is_captcha_page() {
        assert!(is_captcha_page("<script>window._cf_chl_opt = {}</script>"));
        assert!(is_captcha_page("<div class=\"g-recaptcha\"></div>"));
        assert!(!is_captcha_page("<html><body><a href=\"/fr/x_1.htm\">Appartements dans Rabat</a></body></html>"));
    }

    #[test]
    fn test_fetcher_needs_at_least_one_attempt() {
        let fetcher = HttpFetcher::new("Mozilla/5.0 (Test Agent)", 0).unwrap();
        assert_eq!(fetcher.max_attempts, 1);
    }
}
