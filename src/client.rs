use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::domain::{BookingRequest, Event, Mode};
use crate::error::{LoadgenError, Result};

/// The booking service as seen by a virtual user
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// POST one booking; `Ok` carries whatever status the server answered with
    async fn book(&self, request: &BookingRequest) -> Result<StatusCode>;

    async fn fetch_event(&self, event_id: i64) -> Result<Event>;
}

#[derive(Clone)]
pub struct HttpBookingClient {
    base_url: String,
    mode: Mode,
    client: reqwest::Client,
}

impl HttpBookingClient {
    pub fn new(base_url: &str, mode: Mode, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("booking-loadgen/", env!("CARGO_PKG_VERSION"))),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LoadgenError::ClientBuild(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mode,
            client,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            &cfg.target.base_url,
            cfg.target.mode,
            cfg.load.request_timeout(),
        )
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn booking_url(&self) -> String {
        format!("{}{}", self.base_url, self.mode.endpoint())
    }

    pub fn event_url(&self, event_id: i64) -> String {
        format!("{}/events/{event_id}", self.base_url)
    }
}

#[async_trait]
impl BookingApi for HttpBookingClient {
    async fn book(&self, request: &BookingRequest) -> Result<StatusCode> {
        let resp = self
            .client
            .post(self.booking_url())
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        // drain so the connection goes back to the pool
        if let Err(e) = resp.bytes().await {
            debug!(error = %e, user_id = %request.user_id, "failed to read booking response body");
        }
        Ok(status)
    }

    async fn fetch_event(&self, event_id: i64) -> Result<Event> {
        let url = self.event_url(event_id);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LoadgenError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            });
        }
        resp.json::<Event>()
            .await
            .map_err(|e| LoadgenError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client =
            HttpBookingClient::new("http://localhost:9999/", Mode::Unsafe, Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.booking_url(), "http://localhost:9999/book/unsafe");
        assert_eq!(client.event_url(7), "http://localhost:9999/events/7");
        assert_eq!(client.mode(), Mode::Unsafe);
    }

    #[test]
    fn test_from_config_uses_target() {
        let cfg = Config::default();
        let client = HttpBookingClient::from_config(&cfg).unwrap();
        assert_eq!(client.booking_url(), cfg.booking_url());
    }
}
