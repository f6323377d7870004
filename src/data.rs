use crate::model::Envelope;
use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const STATS_BASE_URL: &str = "https://stats.nba.com/stats";

/// stats.nba.com drops requests that do not look like they come from nba.com.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json, text/plain, */*"),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Cache-Control", "no-cache"),
    ("Pragma", "no-cache"),
    ("Origin", "https://www.nba.com"),
    ("Referer", "https://www.nba.com/"),
    ("x-nba-stats-origin", "stats"),
    ("x-nba-stats-token", "true"),
];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per attempt, not for the whole retry loop.
    pub timeout: Duration,
    pub retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub backoff: Duration,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: STATS_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            retries: 3,
            backoff: Duration::from_millis(500),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: DEFAULT_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl ClientConfig {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

/// 5xx and 429 are worth another try; other client errors are not.
pub fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

pub struct DataClient {
    client: Client,
    config: ClientConfig,
}

impl DataClient {
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name {:?}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn url_for(&self, resource: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), resource)
    }

    /// GET `{base_url}/{resource}` and return the raw body.
    ///
    /// Connection failures, timeouts, 5xx and 429 are retried with exponential
    /// backoff; any other non-success status fails immediately.
    pub async fn send_request<K, V>(&self, resource: &str, params: &[(K, V)]) -> Result<Bytes>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url = self.url_for(resource);
        let query: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_ref(), v.as_ref()))
            .collect();

        let mut attempt = 0;
        loop {
            tracing::info!("GET {} (attempt {})", url, attempt + 1);

            let err = match self.client.get(&url).query(&query).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .bytes()
                            .await
                            .with_context(|| format!("Failed to read {} response", resource));
                    }
                    if !is_retryable(status) {
                        bail!("{} returned {}", resource, status);
                    }
                    anyhow!("{} returned {}", resource, status)
                }
                Err(e) => anyhow::Error::new(e).context(format!("{} request failed", resource)),
            };

            if attempt >= self.config.retries {
                return Err(err);
            }
            let delay = self.config.delay_for(attempt);
            tracing::warn!("{:#}; retrying in {:?}", err, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn fetch<K, V>(&self, resource: &str, params: &[(K, V)]) -> Result<Envelope>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let body = self.send_request(resource, params).await?;
        Envelope::decode(&body).with_context(|| format!("Failed to decode {} response", resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned response per connection, in order, and returns the
    /// request heads it saw.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let n = sock.read(&mut buf).await.unwrap();
                seen.push(String::from_utf8_lossy(&buf[..n]).to_string());
                let resp = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                sock.write_all(resp.as_bytes()).await.unwrap();
                sock.shutdown().await.unwrap();
            }
            seen
        });
        (format!("http://{}", addr), handle)
    }

    fn client(base_url: String, retries: u32) -> DataClient {
        DataClient::with_config(ClientConfig {
            base_url,
            retries,
            backoff: Duration::from_millis(1),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_backoff_doubles() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.delay_for(0), Duration::from_millis(500));
        assert_eq!(cfg.delay_for(1), Duration::from_millis(1000));
        assert_eq!(cfg.delay_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_url_for_trims_slash() {
        let c = client("http://localhost/stats/".to_string(), 0);
        assert_eq!(c.url_for("commonallplayers"), "http://localhost/stats/commonallplayers");
    }

    #[test]
    fn test_default_headers_are_valid() {
        assert!(DataClient::new().is_ok());
    }

    #[tokio::test]
    async fn test_fetch_sends_params_and_decodes() {
        let (base, server) = serve(vec![(
            200,
            r#"{"resource":"commonallplayers","parameters":{},"resultSets":[{"name":"CommonAllPlayers","headers":["PERSON_ID"],"rowSet":[[2544]]}]}"#,
        )])
        .await;
        let c = client(base, 0);
        let env = c
            .fetch("commonallplayers", &[("LeagueID", "00"), ("Season", "2023-24")])
            .await
            .unwrap();
        assert_eq!(env.get_dataset("CommonAllPlayers").unwrap().row_count(), 1);

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("GET /commonallplayers?LeagueID=00&Season=2023-24 "));
        assert!(seen[0].to_lowercase().contains("x-nba-stats-origin: stats"));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let (base, server) = serve(vec![(503, ""), (200, r#"{"resultSets":[]}"#)]).await;
        let body = client(base, 2)
            .send_request::<&str, &str>("scoreboardv2", &[])
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"resultSets":[]}"#);
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_errors_fail_fast() {
        let (base, server) = serve(vec![(400, "bad")]).await;
        let err = client(base, 3)
            .send_request::<&str, &str>("scoreboardv2", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_endpoint_call_with_no_result_sets() {
        use crate::endpoints::{Endpoint, Season, SeasonType, VideoDetails};

        let (base, server) = serve(vec![(
            200,
            r#"{"resource":"videodetails","parameters":{},"resultSets":[]}"#,
        )])
        .await;
        let req = VideoDetails {
            player_id: 2544,
            team_id: 1610612747,
            season: Season(2023),
            season_type: SeasonType::Playoffs,
        };
        let env = req.call(&client(base, 0)).await.unwrap();
        assert!(env.get_dataset("VideoDetails").unwrap_err().is_not_found());

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("GET /videodetails?"));
        assert!(seen[0].contains("SeasonType=Playoffs"));
    }

    #[tokio::test]
    async fn test_decode_failure_has_context() {
        let (base, _server) = serve(vec![(200, "<html>")]).await;
        let err = client(base, 0)
            .fetch::<&str, &str>("playercareerstats", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("playercareerstats"));
        assert!(err.downcast_ref::<crate::Error>().is_some());
    }
}
