//! Analysis of aggregated provider results.

pub mod consensus;

pub use consensus::{consensus, VoteTally};
