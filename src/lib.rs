//! ipintel - concurrent multi-provider IP geolocation lookup.
//!
//! An [`Aggregator`] queries every configured [`Provider`] in parallel under
//! one deadline and collects their answers into a [`Report`] in registration
//! order. [`Report::consensus`] then merges the successful answers: each text
//! field takes the majority value and coordinates are averaged.

pub mod aggregator;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod provider;
pub mod report;

pub use aggregator::Aggregator;
pub use error::{AddressError, ProviderError};
pub use models::{Geolocation, IpAddress, Outcome, ProviderResult, Report};
pub use provider::{Provider, ProviderKind};
