//! Client for the ipwhois.app geolocation service.

use super::http::get_json;
use super::{null_as_default, Provider};
use crate::error::ProviderError;
use crate::models::{Geolocation, IpAddress};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Identifies this provider in reports.
pub const PROVIDER_NAME: &str = "ipwhois";

pub const BASE_URL: &str = "https://ipwhois.app/json/";

/// JSON returned by ipwhois.app.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpWhoisResponse {
    #[serde(deserialize_with = "null_as_default")]
    success: bool,
    #[serde(deserialize_with = "null_as_default")]
    message: String,
    #[serde(deserialize_with = "null_as_default")]
    country: String,
    #[serde(deserialize_with = "null_as_default")]
    country_code: String,
    #[serde(deserialize_with = "null_as_default")]
    region: String,
    #[serde(deserialize_with = "null_as_default")]
    city: String,
    #[serde(deserialize_with = "null_as_default")]
    latitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    longitude: f64,
    #[serde(deserialize_with = "null_as_default")]
    isp: String,
    #[serde(deserialize_with = "null_as_default")]
    org: String,
    #[serde(deserialize_with = "null_as_default")]
    asn: String,
}

impl IpWhoisResponse {
    fn into_geolocation(self, ip: IpAddress) -> Geolocation {
        Geolocation {
            ip,
            country: self.country,
            country_code: self.country_code,
            region: self.region,
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            isp: self.isp,
            org: self.org,
            asn: self.asn,
        }
    }
}

/// ipwhois.app client.
#[derive(Debug, Clone)]
pub struct IpWhoisClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl IpWhoisClient {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for IpWhoisClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(
        &self,
        ip: IpAddress,
        cancel: &CancellationToken,
    ) -> Result<Geolocation, ProviderError> {
        let url = format!("{}{}", self.base_url, ip);
        let response: IpWhoisResponse = get_json(&self.http_client, &url, cancel).await?;

        if !response.success {
            let message = if response.message.is_empty() {
                "unknown error".to_string()
            } else {
                response.message
            };
            return Err(ProviderError::Api(message));
        }

        Ok(response.into_geolocation(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(ip: &str, body: serde_json::Value) -> (MockServer, IpWhoisClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/json/{}", ip)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = IpWhoisClient::new(reqwest::Client::new())
            .with_base_url(format!("{}/json/", server.uri()));
        (server, client)
    }

    #[tokio::test]
    async fn test_fetch_maps_fields() {
        let body = json!({
            "ip": "1.1.1.1",
            "success": true,
            "type": "IPv4",
            "country": "Australia",
            "country_code": "AU",
            "region": "New South Wales",
            "city": "Sydney",
            "latitude": -33.8688,
            "longitude": 151.2093,
            "asn": "AS13335",
            "org": "APNIC and Cloudflare DNS Resolver project",
            "isp": "Cloudflare, Inc."
        });
        let (_server, client) = client_for("1.1.1.1", body).await;
        let ip = IpAddress::parse("1.1.1.1").unwrap();

        let geo = client.fetch(ip, &CancellationToken::new()).await.unwrap();

        assert_eq!(geo.ip, ip);
        assert_eq!(geo.country, "Australia");
        assert_eq!(geo.country_code, "AU");
        assert_eq!(geo.region, "New South Wales");
        assert_eq!(geo.city, "Sydney");
        assert_eq!(geo.latitude, -33.8688);
        assert_eq!(geo.longitude, 151.2093);
        assert_eq!(geo.asn, "AS13335");
        assert_eq!(geo.isp, "Cloudflare, Inc.");
    }

    #[tokio::test]
    async fn test_fetch_ipv6_path() {
        let body = json!({"success": true, "country": "United States"});
        let (_server, client) = client_for("2001:4860:4860::8888", body).await;
        let ip = IpAddress::parse("2001:4860:4860::8888").unwrap();

        let geo = client.fetch(ip, &CancellationToken::new()).await.unwrap();

        assert_eq!(geo.country, "United States");
    }

    #[tokio::test]
    async fn test_fetch_null_fields_stay_empty() {
        let body = json!({
            "success": true,
            "country": "United States",
            "country_code": "US",
            "city": null,
            "latitude": null
        });
        let (_server, client) = client_for("8.8.8.8", body).await;
        let ip = IpAddress::parse("8.8.8.8").unwrap();

        let geo = client.fetch(ip, &CancellationToken::new()).await.unwrap();

        assert_eq!(geo.country, "United States");
        assert_eq!(geo.country_code, "US");
        assert!(geo.city.is_empty());
        assert_eq!(geo.latitude, 0.0);
    }

    #[tokio::test]
    async fn test_fetch_api_failure() {
        let body = json!({"success": false, "message": "reserved range"});
        let (_server, client) = client_for("10.0.0.1", body).await;
        let ip = IpAddress::parse("10.0.0.1").unwrap();

        let err = client.fetch(ip, &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "API error: reserved range");
    }

    #[tokio::test]
    async fn test_fetch_missing_success_flag_is_failure() {
        let (_server, client) = client_for("8.8.8.8", json!({"country": "US"})).await;
        let ip = IpAddress::parse("8.8.8.8").unwrap();

        let err = client.fetch(ip, &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.to_string(), "API error: unknown error");
    }
}
