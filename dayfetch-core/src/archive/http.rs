//! HTTP fetcher for the archive.
//!
//! Artifacts live at `{base_url}/{id}/{artifact}`. The response's
//! `Content-Disposition` header carries the real file name, and the file name
//! carries the dataset date. A response without that header means the
//! identifier is unpublished, whatever the status code says.
//!
//! Transport failures (connect errors, timeouts, 429 and 5xx) are retried with
//! exponential backoff. HTTP 403 opens the circuit breaker at once.

use super::circuit_breaker::CircuitBreaker;
use super::fetcher::{
    date_from_filename, filename_from_disposition, ArtifactStream, FetchError, ResourceFetcher,
};
use crate::config::ArchiveConfig;
use crate::domain::ResourceId;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpFetcher {
    client: Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ArchiveConfig, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            circuit_breaker,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    fn artifact_url(&self, id: ResourceId, artifact: &str) -> String {
        format!("{}/{id}/{artifact}", self.base_url)
    }

    fn breaker_open(&self) -> FetchError {
        FetchError::CircuitBreakerOpen {
            remaining_secs: self.circuit_breaker.remaining_cooldown().as_secs(),
        }
    }

    /// Send a GET with retry and circuit breaker logic. The body is left unread.
    fn get_with_retry(&self, url: &str) -> Result<Response, FetchError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(url, attempt, ?delay, "retrying archive request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(self.breaker_open());
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::FORBIDDEN {
                        warn!(url, "archive answered 403, opening circuit breaker");
                        self.circuit_breaker.trip();
                        return Err(self.breaker_open());
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(FetchError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        continue;
                    }

                    self.circuit_breaker.record_success();
                    return Ok(resp);
                }
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FetchError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(FetchError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Other("max retries exceeded".into())))
    }
}

impl ResourceFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(&self, id: ResourceId, artifact: &str) -> Result<Option<ArtifactStream>, FetchError> {
        let url = self.artifact_url(id, artifact);
        let resp = self.get_with_retry(&url)?;

        let file_name = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition);

        let Some(file_name) = file_name else {
            debug!(%id, artifact, status = %resp.status(), "no metadata, identifier unpublished");
            return Ok(None);
        };

        Ok(Some(ArtifactStream {
            reported_date: date_from_filename(&file_name),
            file_name,
            body: Box::new(resp),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_ARTIFACTS, DEFAULT_PROBE_ARTIFACT};

    fn config(base_url: &str) -> ArchiveConfig {
        ArchiveConfig {
            base_url: base_url.to_string(),
            probe_artifact: DEFAULT_PROBE_ARTIFACT.to_string(),
            artifacts: DEFAULT_ARTIFACTS.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 1,
            max_retries: 0,
        }
    }

    #[test]
    fn url_joins_id_and_artifact() {
        let fetcher = HttpFetcher::new(
            &config("https://archive.example.com/historical/"),
            Arc::new(CircuitBreaker::default_archive()),
        )
        .unwrap();
        assert_eq!(
            fetcher.artifact_url(ResourceId(5600), "TC.txt"),
            "https://archive.example.com/historical/5600/TC.txt"
        );
    }

    #[test]
    fn open_breaker_refuses_without_network() {
        let breaker = Arc::new(CircuitBreaker::default_archive());
        breaker.trip();
        let fetcher = HttpFetcher::new(&config("http://127.0.0.1:9"), breaker).unwrap();
        let err = fetcher.fetch(ResourceId(1), "TC.txt").unwrap_err();
        assert!(matches!(err, FetchError::CircuitBreakerOpen { .. }));
    }
}
