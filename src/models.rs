//! Data models for IP lookups.
//!
//! This module contains the core value types shared by the aggregator,
//! the provider clients and the report generators.

use crate::error::AddressError;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

/// A validated IPv4 or IPv6 address.
///
/// Zone-qualified literals (`fe80::1%eth0`) are rejected: they only make
/// sense on one host and carry no geographic meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpAddress(IpAddr);

impl IpAddress {
    /// Parse and validate an address literal.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        if input.contains('%') {
            return Err(AddressError::Zoned(input.to_string()));
        }

        input
            .parse::<IpAddr>()
            .map(IpAddress)
            .map_err(|_| AddressError::Invalid(input.to_string()))
    }

    /// The underlying standard library address.
    pub fn addr(&self) -> IpAddr {
        self.0
    }

    pub fn is_ipv6(&self) -> bool {
        self.0.is_ipv6()
    }

    /// Whether the address can be expected to have public geolocation data.
    ///
    /// Loopback, private (RFC 1918, IPv6 unique-local) and unspecified
    /// addresses return false. IPv4-mapped IPv6 addresses are judged by
    /// the IPv4 address they carry.
    pub fn is_globally_routable(&self) -> bool {
        match self.0 {
            IpAddr::V4(v4) => is_routable_v4(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => is_routable_v4(v4),
                None => {
                    !v6.is_loopback()
                        && !v6.is_unspecified()
                        && (v6.segments()[0] & 0xfe00) != 0xfc00
                }
            },
        }
    }
}

fn is_routable_v4(v4: Ipv4Addr) -> bool {
    !v4.is_loopback() && !v4.is_unspecified() && !v4.is_private()
}

impl FromStr for IpAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        IpAddress(addr)
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for IpAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for IpAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        IpAddress::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Geographic and network information for an IP address.
///
/// This is the normalised result type every provider maps its response to.
/// Missing upstream fields are empty strings or `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    /// The queried address.
    pub ip: IpAddress,

    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,

    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub asn: String,
}

impl Geolocation {
    /// Creates a geolocation holding only the address.
    pub fn new(ip: IpAddress) -> Self {
        Self {
            ip,
            country: String::new(),
            country_code: String::new(),
            region: String::new(),
            city: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            isp: String::new(),
            org: String::new(),
            asn: String::new(),
        }
    }

    /// Whether coordinates are present.
    ///
    /// `(0, 0)` counts as absent: it cannot be told apart from a provider
    /// that omitted coordinates.
    pub fn has_location(&self) -> bool {
        self.latitude != 0.0 || self.longitude != 0.0
    }

    pub fn has_network_info(&self) -> bool {
        !self.isp.is_empty() || !self.org.is_empty() || !self.asn.is_empty()
    }

    /// Whether every field except `ip` is at its zero value.
    pub fn is_empty(&self) -> bool {
        self.country.is_empty()
            && self.country_code.is_empty()
            && self.region.is_empty()
            && self.city.is_empty()
            && !self.has_location()
            && !self.has_network_info()
    }
}

/// What happened when a provider was asked.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Geolocation),
    /// Failure description (transport, decoding, API or cancellation).
    Failure(String),
}

/// The outcome of a single provider lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    /// Name of the provider.
    pub provider: String,
    /// Success payload or failure description.
    pub outcome: Outcome,
    /// Wall-clock time spent in the provider's fetch.
    pub duration: Duration,
}

impl ProviderResult {
    pub fn succeeded(provider: impl Into<String>, geo: Geolocation, duration: Duration) -> Self {
        Self {
            provider: provider.into(),
            outcome: Outcome::Success(geo),
            duration,
        }
    }

    pub fn failed(provider: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            provider: provider.into(),
            outcome: Outcome::Failure(error.into()),
            duration,
        }
    }

    /// Whether this provider lookup succeeded.
    pub fn success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// The geolocation, if the lookup succeeded.
    pub fn result(&self) -> Option<&Geolocation> {
        match &self.outcome {
            Outcome::Success(geo) => Some(geo),
            Outcome::Failure(_) => None,
        }
    }

    /// The failure description, if the lookup failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(err) => Some(err),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl Serialize for ProviderResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ProviderResult", 3)?;
        state.serialize_field("provider", &self.provider)?;
        match &self.outcome {
            Outcome::Success(geo) => state.serialize_field("result", geo)?,
            Outcome::Failure(err) => state.serialize_field("error", err)?,
        }
        state.serialize_field("duration_ms", &duration_ms(self.duration))?;
        state.end()
    }
}

/// The aggregated result of querying every provider about one address.
///
/// `results` has one entry per registered provider, in registration order.
#[derive(Debug, Clone)]
pub struct Report {
    /// The address that was queried.
    pub ip: IpAddress,
    /// When the lookup started.
    pub timestamp: DateTime<Utc>,
    /// Results from each provider.
    pub results: Vec<ProviderResult>,
    /// How long the entire lookup took.
    pub total_duration: Duration,
}

impl Report {
    /// Number of providers that returned successfully.
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }

    /// Number of providers that failed.
    pub fn error_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// Successful results only, in registration order.
    pub fn successful_results(&self) -> Vec<&ProviderResult> {
        self.results.iter().filter(|r| r.success()).collect()
    }

    /// True when at least one provider was asked and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.success_count() == 0
    }

    /// The most commonly agreed-upon values across successful providers.
    pub fn consensus(&self) -> Geolocation {
        crate::analysis::consensus(self.ip, &self.successful_results())
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Report", 4)?;
        state.serialize_field("ip", &self.ip)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("results", &self.results)?;
        state.serialize_field("total_duration_ms", &duration_ms(self.total_duration))?;
        state.end()
    }
}
