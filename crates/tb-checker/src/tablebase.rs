use std::sync::Arc;
use std::time::Duration;

use puzzle_core::Position;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::CheckerError;
use crate::oracle::{Oracle, OracleError, OracleVerdict};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

pub const DEFAULT_TABLEBASE_URL: &str = "http://tablebase.lichess.ovh";

/// HTTP client for the lichess tablebase (`GET /standard?fen=...`).
pub struct TablebaseClient {
    client: Client,
    endpoint: String,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl TablebaseClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Result<Self, CheckerError> {
        let client = Client::builder()
            .user_agent("tb-puzzle-checker/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/standard", base_url.trim_end_matches('/')),
            limiter,
            retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One rate-limited request, no retries.
    async fn lookup_once(&self, fen: &str, attempt: u32) -> Result<OracleVerdict, OracleError> {
        self.limiter.acquire().await;
        debug!(fen, attempt, "Tablebase query");

        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("fen", fen)])
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::Unavailable("HTTP 429 rate limited".to_string()));
        }
        if status.is_server_error() {
            return Err(OracleError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(OracleError::Rejected(format!("HTTP {status}")));
        }

        let text = resp.text().await.map_err(classify_request_error)?;
        serde_json::from_str::<OracleVerdict>(&text)
            .map_err(|e| OracleError::Rejected(format!("Bad response body: {e}")))
    }
}

fn classify_request_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Unavailable(format!("Request error: {e}"))
    }
}

impl Oracle for TablebaseClient {
    async fn lookup(&self, position: &Position) -> Result<OracleVerdict, OracleError> {
        let fen = position.to_query_string();
        let fen = fen.as_str();
        self.retry
            .run(move |attempt| self.lookup_once(fen, attempt))
            .await
    }
}
