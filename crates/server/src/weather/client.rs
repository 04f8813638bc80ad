//! Upstream weather provider client.
//!
//! Talks to an OpenWeatherMap-compatible API:
//! `GET {base}/weather?q=<city>&appid=<key>&units=metric` and the same for
//! `/forecast`. Bodies are returned verbatim as [`WeatherPayload`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use nimbus_core::{CityName, WeatherKind, WeatherPayload};

use crate::config::WeatherApiConfig;

/// Errors from a single upstream request.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection failure, timeout or undecodable body.
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("upstream returned status {0}")]
    Status(StatusCode),
}

impl UpstreamError {
    /// Whether the request hit the configured timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

/// Source of fresh weather payloads.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch one payload. Exactly one attempt, no retries.
    async fn fetch(&self, kind: WeatherKind, city: &CityName)
    -> Result<WeatherPayload, UpstreamError>;
}

/// [`WeatherProvider`] for the OpenWeatherMap HTTP API.
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenWeatherClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Request` if the HTTP client cannot be built.
    pub fn new(config: &WeatherApiConfig) -> Result<Self, UpstreamError> {
        Self::with_base_url(&config.base_url, config.api_key.clone(), config.timeout)
    }

    /// Build a client against an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Request` if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: &Url,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    fn endpoint(&self, kind: WeatherKind) -> String {
        format!("{}/{}", self.base_url, kind.upstream_path())
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self), fields(kind = %kind, city = %city))]
    async fn fetch(
        &self,
        kind: WeatherKind,
        city: &CityName,
    ) -> Result<WeatherPayload, UpstreamError> {
        let response = self
            .client
            .get(self.endpoint(kind))
            .query(&[
                ("q", city.as_str()),
                ("appid", self.api_key.expose_secret()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Upstream weather request rejected");
            return Err(UpstreamError::Status(status));
        }

        let body: serde_json::Value = response.json().await?;
        Ok(WeatherPayload::new(body))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout: Duration) -> OpenWeatherClient {
        let base: Url = server.uri().parse().unwrap();
        OpenWeatherClient::with_base_url(&base, SecretString::from("test-key"), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_current_sends_city_as_given() {
        let server = MockServer::start().await;
        let body = json!({"name": "New York", "main": {"temp": 21.3}});

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "New York"))
            .and(query_param("appid", "test-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let city = CityName::parse("New York").unwrap();
        let payload = client.fetch(WeatherKind::Current, &city).await.unwrap();

        assert_eq!(payload.as_json(), &body);
    }

    #[tokio::test]
    async fn test_fetch_forecast_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"list": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let city = CityName::parse("Lima").unwrap();
        let payload = client.fetch(WeatherKind::Forecast, &city).await.unwrap();

        assert_eq!(payload.as_json(), &json!({"list": []}));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"cod": "404"})))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let city = CityName::parse("Atlantis").unwrap();
        let err = client.fetch(WeatherKind::Current, &city).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Status(s) if s == StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let city = CityName::parse("Paris").unwrap();
        let err = client.fetch(WeatherKind::Current, &city).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Request(_)));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(50));
        let city = CityName::parse("Paris").unwrap();
        let err = client.fetch(WeatherKind::Current, &city).await.unwrap_err();

        assert!(err.is_timeout());
    }
}
