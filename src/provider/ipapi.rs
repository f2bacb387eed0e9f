//! Client for the ip-api.com geolocation service.

use super::http::get_json;
use super::{null_as_default, Provider};
use crate::error::ProviderError;
use crate::models::{Geolocation, IpAddress};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Identifies this provider in reports.
pub const PROVIDER_NAME: &str = "ip-api";

/// API endpoint. The free tier is HTTP only.
pub const BASE_URL: &str = "http://ip-api.com/json/";

/// JSON returned by ip-api.com.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IpApiResponse {
    #[serde(deserialize_with = "null_as_default")]
    status: String,
    #[serde(deserialize_with = "null_as_default")]
    message: String,
    #[serde(deserialize_with = "null_as_default")]
    country: String,
    #[serde(deserialize_with = "null_as_default")]
    country_code: String,
    #[serde(deserialize_with = "null_as_default")]
    region_name: String,
    #[serde(deserialize_with = "null_as_default")]
    city: String,
    #[serde(deserialize_with = "null_as_default")]
    lat: f64,
    #[serde(deserialize_with = "null_as_default")]
    lon: f64,
    #[serde(deserialize_with = "null_as_default")]
    isp: String,
    #[serde(deserialize_with = "null_as_default")]
    org: String,
    #[serde(rename = "as", deserialize_with = "null_as_default")]
    as_info: String,
}

impl IpApiResponse {
    fn into_geolocation(self, ip: IpAddress) -> Geolocation {
        Geolocation {
            ip,
            country: self.country,
            country_code: self.country_code,
            region: self.region_name,
            city: self.city,
            latitude: self.lat,
            longitude: self.lon,
            isp: self.isp,
            org: self.org,
            asn: self.as_info,
        }
    }
}

/// ip-api.com client.
#[derive(Debug, Clone)]
pub struct IpApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl IpApiClient {
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
impl Provider for IpApiClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(
        &self,
        ip: IpAddress,
        cancel: &CancellationToken,
    ) -> Result<Geolocation, ProviderError> {
        let url = format!("{}{}", self.base_url, ip);
        let response: IpApiResponse = get_json(&self.http_client, &url, cancel).await?;

        if response.status != "success" {
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
