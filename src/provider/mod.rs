//! Geolocation providers.
//!
//! Every data source implements [`Provider`]. The aggregator only sees
//! `Arc<dyn Provider>`; concrete clients are chosen at startup from
//! [`ProviderKind`].

pub mod http;
pub mod ipapi;
pub mod ipinfo;
pub mod ipwhois;

use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::models::{Geolocation, IpAddress};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use ipapi::IpApiClient;
pub use ipinfo::IpInfoClient;
pub use ipwhois::IpWhoisClient;

/// A source of geolocation data for IP addresses.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identifies this provider in reports.
    fn name(&self) -> &str;

    /// Look up `ip`.
    ///
    /// Implementations must return [`ProviderError::Cancelled`] promptly once
    /// `cancel` fires, and must fail rather than return a partially decoded
    /// answer. Fields the upstream omits are left empty.
    async fn fetch(
        &self,
        ip: IpAddress,
        cancel: &CancellationToken,
    ) -> Result<Geolocation, ProviderError>;
}

/// Deserialize a response field, treating an explicit `null` like a missing key.
///
/// Upstreams send `null` for fields they know nothing about; those fields stay
/// empty instead of failing the whole response.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The built-in providers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ProviderKind {
    /// ip-api.com
    #[serde(rename = "ip-api")]
    #[value(name = "ip-api")]
    IpApi,
    /// ipinfo.io
    #[serde(rename = "ipinfo")]
    #[value(name = "ipinfo")]
    IpInfo,
    /// ipwhois.app
    #[serde(rename = "ipwhois")]
    #[value(name = "ipwhois")]
    IpWhois,
}

impl ProviderKind {
    /// Every built-in provider, in default registration order.
    pub fn all() -> Vec<ProviderKind> {
        vec![ProviderKind::IpApi, ProviderKind::IpInfo, ProviderKind::IpWhois]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::IpApi => ipapi::PROVIDER_NAME,
            ProviderKind::IpInfo => ipinfo::PROVIDER_NAME,
            ProviderKind::IpWhois => ipwhois::PROVIDER_NAME,
        }
    }

    /// Instantiate the client for this provider.
    pub fn build(&self, http_client: reqwest::Client, config: &ProvidersConfig) -> Arc<dyn Provider> {
        match self {
            ProviderKind::IpApi => {
                Arc::new(IpApiClient::new(http_client).with_base_url(&config.ip_api_url))
            }
            ProviderKind::IpInfo => {
                Arc::new(IpInfoClient::new(http_client).with_base_url(&config.ipinfo_url))
            }
            ProviderKind::IpWhois => {
                Arc::new(IpWhoisClient::new(http_client).with_base_url(&config.ipwhois_url))
            }
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Build the clients for `kinds`, sharing one HTTP connection pool.
pub fn build_providers(
    kinds: &[ProviderKind],
    http_client: &reqwest::Client,
    config: &ProvidersConfig,
) -> Vec<Arc<dyn Provider>> {
    kinds
        .iter()
        .map(|kind| kind.build(http_client.clone(), config))
        .collect()
}
