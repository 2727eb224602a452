//! HTTP Transport: a single configured client per pipeline run, with
//! status-based error classification and retry/backoff.
//!
//! Generalizes the teacher's [`crate::exec_ctx::ExecCtx`] client-building
//! convention (timeouts, builder pattern) to the Source Fetcher's plain-HTTP
//! needs, and reuses [`crate::backend::BackoffConfig`]/
//! [`crate::backend::backoff::JitterStrategy`] for its retry loop instead of
//! inventing a second backoff mechanism.

pub mod retry_after;

pub use retry_after::parse_retry_after;

use crate::backend::BackoffConfig;
use crate::error::{CoreError, Result};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::warn;

/// Outcome of classifying a transport response by status code, per the
/// table in the HTTP Transport component design.
#[derive(Debug)]
pub enum Classified {
    Success(Response),
    /// 403/404 — terminal, not retryable. Caller swallows and returns an
    /// empty result.
    AccessDenied { status: u16 },
    /// 429 — always retryable, with an optional adaptive-sleep hint.
    RateLimited { retry_after: Option<Duration> },
    /// 5xx — retryable.
    ServerError { status: u16 },
    /// Any other non-2xx status — not retryable.
    Other { status: u16, body: String },
}

/// A single constructed HTTP client for a pipeline run: total/connect/
/// read/write timeouts, connection-pool limits, browser-like headers, and
/// automatic redirect following.
pub struct Transport {
    client: Client,
    backoff: BackoffConfig,
}

impl Transport {
    pub fn new(user_agent: impl Into<String>) -> Result<Self> {
        Self::with_backoff(user_agent, BackoffConfig::http_transport())
    }

    pub fn with_backoff(user_agent: impl Into<String>, backoff: BackoffConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                .parse()
                .unwrap(),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "en-US,en;q=0.9".parse().unwrap(),
        );
        headers.insert(reqwest::header::CACHE_CONTROL, "no-cache".parse().unwrap());

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .user_agent(user_agent.into())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(CoreError::Request)?;

        Ok(Self { client, backoff })
    }

    /// Issue a GET request, retrying per the HTTP transport policy on
    /// transient failures (connection errors, 429, 5xx). 403/404 are
    /// returned to the caller as [`Classified::AccessDenied`] on the first
    /// attempt without retrying -- they are terminal per the status table.
    pub async fn get(&self, url: &str) -> Result<Classified> {
        let mut last_error: Option<CoreError> = None;

        for attempt in 0..=self.backoff.max_retries {
            if attempt > 0 {
                let delay = retry_delay(&self.backoff, &last_error, attempt - 1);
                warn!(
                    attempt,
                    wait_seconds = delay.as_secs_f64(),
                    "retry_attempt"
                );
                tokio::time::sleep(delay).await;
            }

            match self.client.get(url).send().await {
                Ok(resp) => match classify(resp).await {
                    Ok(Classified::Success(resp)) => return Ok(Classified::Success(resp)),
                    Ok(Classified::AccessDenied { status }) => {
                        return Ok(Classified::AccessDenied { status })
                    }
                    Ok(Classified::Other { status, body }) => {
                        return Ok(Classified::Other { status, body })
                    }
                    Ok(retryable @ Classified::RateLimited { .. }) => {
                        last_error = Some(to_core_error(&retryable));
                        if attempt == self.backoff.max_retries {
                            return Ok(retryable);
                        }
                    }
                    Ok(retryable @ Classified::ServerError { .. }) => {
                        last_error = Some(to_core_error(&retryable));
                        if attempt == self.backoff.max_retries {
                            return Ok(retryable);
                        }
                    }
                    Err(e) => return Err(e),
                },
                Err(e) => {
                    let err = CoreError::Request(e);
                    if attempt == self.backoff.max_retries {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::Other("transport retry loop exhausted".into())))
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

async fn classify(resp: Response) -> Result<Classified> {
    let status = resp.status().as_u16();

    if resp.status().is_success() {
        return Ok(Classified::Success(resp));
    }

    if status == 403 || status == 404 {
        return Ok(Classified::AccessDenied { status });
    }

    if status == 429 {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Ok(Classified::RateLimited { retry_after });
    }

    if (500..600).contains(&status) {
        return Ok(Classified::ServerError { status });
    }

    let body = resp.text().await.unwrap_or_default();
    Ok(Classified::Other { status, body })
}

fn to_core_error(c: &Classified) -> CoreError {
    match c {
        Classified::RateLimited { retry_after } => CoreError::HttpError {
            status: 429,
            body: String::new(),
            retry_after: *retry_after,
        },
        Classified::ServerError { status } => CoreError::HttpError {
            status: *status,
            body: String::new(),
            retry_after: None,
        },
        _ => CoreError::Other("non-retryable classification".into()),
    }
}

fn retry_delay(backoff: &BackoffConfig, last_error: &Option<CoreError>, attempt: u32) -> Duration {
    if backoff.respect_retry_after {
        if let Some(CoreError::HttpError {
            retry_after: Some(ra),
            ..
        }) = last_error
        {
            // Adaptive sleep: the smaller of Retry-After and 60s.
            return (*ra).min(Duration::from_secs(60));
        }
    }
    backoff.delay_for_attempt(attempt)
}
