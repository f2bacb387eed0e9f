//! Client for the ipinfo.io geolocation service.
//!
//! ipinfo.io reports only a two-letter country code, packs coordinates into
//! a `"lat,lon"` string and prefixes the organisation with its ASN.

use super::http::get_json;
use super::{null_as_default, Provider};
use crate::error::ProviderError;
use crate::models::{Geolocation, IpAddress};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Identifies this provider in reports.
pub const PROVIDER_NAME: &str = "ipinfo";

pub const BASE_URL: &str = "https://ipinfo.io/";

/// JSON returned by ipinfo.io.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpInfoResponse {
    #[serde(deserialize_with = "null_as_default")]
    city: String,
    #[serde(deserialize_with = "null_as_default")]
    region: String,
    /// Two-letter country code.
    #[serde(deserialize_with = "null_as_default")]
    country: String,
    /// "latitude,longitude"
    #[serde(deserialize_with = "null_as_default")]
    loc: String,
    /// "AS12345 Organization Name"
    #[serde(deserialize_with = "null_as_default")]
    org: String,
    error: Option<IpInfoError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpInfoError {
    #[serde(deserialize_with = "null_as_default")]
    title: String,
    #[serde(deserialize_with = "null_as_default")]
    message: String,
}

impl IpInfoResponse {
    fn into_geolocation(self, ip: IpAddress) -> Geolocation {
        let mut geo = Geolocation {
            country_code: self.country,
            region: self.region,
            city: self.city,
            ..Geolocation::new(ip)
        };

        if let Some((lat, lon)) = parse_location(&self.loc) {
            geo.latitude = lat;
            geo.longitude = lon;
        }

        if !self.org.is_empty() {
            let (asn, org) = parse_org(&self.org);
            geo.asn = asn;
            // ipinfo.io does not distinguish ISP from organisation.
            geo.isp = org.clone();
            geo.org = org;
        }

        geo
    }
}

/// Parse a `"latitude,longitude"` pair.
pub fn parse_location(loc: &str) -> Option<(f64, f64)> {
    let (lat, lon) = loc.split_once(',')?;
    if lon.contains(',') {
        return None;
    }

    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;
    Some((lat, lon))
}

/// Split `"AS12345 Organization Name"` into ASN and organisation name.
///
/// When the first word is not an ASN the whole string is the organisation.
pub fn parse_org(org: &str) -> (String, String) {
    let mut parts = org.splitn(2, ' ');
    let first = parts.next().unwrap_or_default();

    if first.starts_with("AS") {
        let name = parts.next().unwrap_or_default();
        (first.to_string(), name.to_string())
    } else {
        (String::new(), org.to_string())
    }
}

/// ipinfo.io client.
#[derive(Debug, Clone)]
pub struct IpInfoClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl IpInfoClient {
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
impl Provider for IpInfoClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(
        &self,
        ip: IpAddress,
        cancel: &CancellationToken,
    ) -> Result<Geolocation, ProviderError> {
        let url = format!("{}{}/json", self.base_url, ip);
        let response: IpInfoResponse = get_json(&self.http_client, &url, cancel).await?;

        if let Some(error) = response.error {
            return Err(ProviderError::Api(format!(
                "{} - {}",
                error.title, error.message
            )));
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

    fn ip() -> IpAddress {
        IpAddress::parse("8.8.8.8").unwrap()
    }

    async fn client_for(body: serde_json::Value) -> (MockServer, IpInfoClient) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/8.8.8.8/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client =
            IpInfoClient::new(reqwest::Client::new()).with_base_url(format!("{}/", server.uri()));
        (server, client)
    }

    #[test]
    fn test_parse_location() {
        assert_eq!(parse_location("37.386,-122.0838"), Some((37.386, -122.0838)));
        assert_eq!(parse_location(" 1.5 , 2.5 "), Some((1.5, 2.5)));
        assert_eq!(parse_location(""), None);
        assert_eq!(parse_location("37.386"), None);
        assert_eq!(parse_location("1,2,3"), None);
        assert_eq!(parse_location("north,south"), None);
    }

    #[test]
    fn test_parse_org() {
        assert_eq!(
            parse_org("AS15169 Google LLC"),
            ("AS15169".to_string(), "Google LLC".to_string())
        );
        assert_eq!(parse_org("AS15169"), ("AS15169".to_string(), String::new()));
        assert_eq!(
            parse_org("Google LLC"),
            (String::new(), "Google LLC".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_maps_fields() {
        let body = json!({
            "ip": "8.8.8.8",
            "hostname": "dns.google",
            "city": "Mountain View",
            "region": "California",
            "country": "US",
            "loc": "37.4056,-122.0775",
            "org": "AS15169 Google LLC",
            "timezone": "America/Los_Angeles"
        });
        let (_server, client) = client_for(body).await;

        let geo = client.fetch(ip(), &CancellationToken::new()).await.unwrap();

        assert!(geo.country.is_empty());
        assert_eq!(geo.country_code, "US");
        assert_eq!(geo.region, "California");
        assert_eq!(geo.city, "Mountain View");
        assert_eq!(geo.latitude, 37.4056);
        assert_eq!(geo.longitude, -122.0775);
        assert_eq!(geo.asn, "AS15169");
        assert_eq!(geo.org, "Google LLC");
        assert_eq!(geo.isp, "Google LLC");
    }

    #[tokio::test]
    async fn test_fetch_bad_location_is_not_fatal() {
        let (_server, client) = client_for(json!({"country": "DE", "loc": "garbage"})).await;

        let geo = client.fetch(ip(), &CancellationToken::new()).await.unwrap();

        assert_eq!(geo.country_code, "DE");
        assert!(!geo.has_location());
    }

    #[tokio::test]
    async fn test_fetch_null_fields_stay_empty() {
        let body = json!({
            "ip": "8.8.8.8",
            "city": null,
            "region": "California",
            "country": "US",
            "loc": null,
            "org": null,
            "error": null
        });
        let (_server, client) = client_for(body).await;

        let geo = client.fetch(ip(), &CancellationToken::new()).await.unwrap();

        assert_eq!(geo.country_code, "US");
        assert_eq!(geo.region, "California");
        assert!(geo.city.is_empty());
        assert!(geo.org.is_empty());
        assert!(!geo.has_location());
    }

    #[tokio::test]
    async fn test_fetch_api_error() {
        let body = json!({"error": {"title": "Wrong ip", "message": "Please provide a valid IP address"}});
        let (_server, client) = client_for(body).await;

        let err = client.fetch(ip(), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "API error: Wrong ip - Please provide a valid IP address"
        );
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        let client =
            IpInfoClient::new(reqwest::Client::new()).with_base_url(format!("{}/", server.uri()));

        let err = client.fetch(ip(), &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ProviderError::Status(429)));
    }
}
