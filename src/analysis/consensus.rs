//! Consensus resolution across provider results.
//!
//! Categorical fields are decided by vote, coordinates by averaging.
//! Tallies live in `BTreeMap`s so iteration order, and therefore the
//! tie-break, never depends on hashing.

use crate::models::{Geolocation, IpAddress, ProviderResult};
use std::collections::BTreeMap;

/// Vote counts for one categorical field.
#[derive(Debug, Default, Clone)]
pub struct VoteTally {
    votes: BTreeMap<String, usize>,
}

impl VoteTally {
    /// Record one vote. Empty values abstain.
    pub fn cast(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        *self.votes.entry(value.to_string()).or_insert(0) += 1;
    }

    /// The value with the most votes, or an empty string if nobody voted.
    ///
    /// Ties go to the lexicographically smallest value. The rule is
    /// arbitrary but stable; a tie-broken winner is no more authoritative
    /// than the values it beat.
    pub fn winner(&self) -> String {
        let mut best: Option<(&String, usize)> = None;

        // Ascending key order: only a strictly higher count displaces the
        // current leader, so the smallest key wins a tie.
        for (value, &count) in &self.votes {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((value, count)),
            }
        }

        best.map(|(value, _)| value.clone()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

/// Running sum of coordinates from providers that reported a location.
#[derive(Debug, Default, Clone, Copy)]
struct CoordinateMean {
    lat_sum: f64,
    lon_sum: f64,
    count: usize,
}

impl CoordinateMean {
    fn add(&mut self, geo: &Geolocation) {
        if !geo.has_location() {
            return;
        }
        self.lat_sum += geo.latitude;
        self.lon_sum += geo.longitude;
        self.count += 1;
    }

    fn mean(&self) -> Option<(f64, f64)> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        Some((self.lat_sum / n, self.lon_sum / n))
    }
}

/// Reduce successful provider results into one representative geolocation.
///
/// Results that did not succeed are skipped. With no successes the returned
/// geolocation carries only `ip`.
pub fn consensus(ip: IpAddress, results: &[&ProviderResult]) -> Geolocation {
    let mut country = VoteTally::default();
    let mut country_code = VoteTally::default();
    let mut region = VoteTally::default();
    let mut city = VoteTally::default();
    let mut isp = VoteTally::default();
    let mut org = VoteTally::default();
    let mut asn = VoteTally::default();
    let mut coords = CoordinateMean::default();

    for geo in results.iter().filter_map(|r| r.result()) {
        country.cast(&geo.country);
        country_code.cast(&geo.country_code);
        region.cast(&geo.region);
        city.cast(&geo.city);
        isp.cast(&geo.isp);
        org.cast(&geo.org);
        asn.cast(&geo.asn);
        coords.add(geo);
    }

    let mut resolved = Geolocation {
        country: country.winner(),
        country_code: country_code.winner(),
        region: region.winner(),
        city: city.winner(),
        isp: isp.winner(),
        org: org.winner(),
        asn: asn.winner(),
        ..Geolocation::new(ip)
    };

    if let Some((lat, lon)) = coords.mean() {
        resolved.latitude = lat;
        resolved.longitude = lon;
    }

    resolved
}
