//! Shared HTTP plumbing for the provider clients.

use crate::error::ProviderError;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default deadline for a whole lookup.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by all providers.
pub fn build_http_client(timeout: Duration, user_agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}

/// GET `url` and decode the JSON body, giving up as soon as `cancel` fires.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    cancel: &CancellationToken,
) -> Result<T, ProviderError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Request to {} cancelled", url);
            Err(ProviderError::Cancelled)
        }
        result = fetch_json(client, url) => result,
    }
}

async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, ProviderError> {
    debug!("GET {}", url);

    let response = client
        .get(url)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(e, url))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(ProviderError::Status(status.as_u16()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ProviderError::from_reqwest(e, url))?;

    serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Echo {
        value: String,
    }

    #[tokio::test]
    async fn test_get_json_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/echo"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": "ok"}"#))
            .mount(&server)
            .await;

        let client = build_http_client(DEFAULT_TIMEOUT, "ipintel-test").unwrap();
        let url = format!("{}/echo", server.uri());
        let echo: Echo = get_json(&client, &url, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(echo.value, "ok");
    }

    #[tokio::test]
    async fn test_get_json_rejects_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/echo", server.uri());
        let err = get_json::<Echo>(&client, &url, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Status(429)));
    }

    #[tokio::test]
    async fn test_get_json_reports_decode_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/echo", server.uri());
        let err = get_json::<Echo>(&client, &url, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Decode(_)));
    }

    #[tokio::test]
    async fn test_get_json_observes_cancellation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"value": "late"}"#)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/echo", server.uri());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = get_json::<Echo>(&client, &url, &cancel).await.unwrap_err();

        assert!(matches!(err, ProviderError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
