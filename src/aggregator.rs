//! Concurrent lookups across multiple providers.
//!
//! One task is spawned per provider. Task handles are kept in registration
//! order, so joining them in that order fills result slot `i` from provider
//! `i` no matter which task finishes first. Provider failures, panics and
//! cancellations become failed outcomes; a lookup itself never fails.

use crate::models::{IpAddress, ProviderResult, Report};
use crate::provider::Provider;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Coordinates concurrent lookups across a fixed set of providers.
#[derive(Clone)]
pub struct Aggregator {
    providers: Vec<Arc<dyn Provider>>,
}

impl Aggregator {
    /// Create an aggregator over `providers`.
    ///
    /// Order is significant: reports list outcomes in this order. Duplicates
    /// are allowed and queried independently.
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Query every provider concurrently and aggregate the answers.
    ///
    /// `cancel` is shared by all provider tasks. Tasks are never aborted:
    /// this waits for every provider to return, so the total time depends
    /// on how quickly providers react to cancellation.
    pub async fn lookup(&self, ip: IpAddress, cancel: &CancellationToken) -> Report {
        let started = Instant::now();
        let timestamp = Utc::now();

        debug!(
            "Dispatching lookup of {} to {} providers",
            ip,
            self.providers.len()
        );

        let handles: Vec<JoinHandle<ProviderResult>> = self
            .providers
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let cancel = cancel.clone();
                tokio::spawn(async move { run_provider(provider, ip, cancel).await })
            })
            .collect();

        let results: Vec<ProviderResult> = join_all(handles)
            .await
            .into_iter()
            .zip(&self.providers)
            .map(|(joined, provider)| match joined {
                Ok(result) => result,
                Err(err) => {
                    warn!("Provider {} task did not complete: {}", provider.name(), err);
                    ProviderResult::failed(
                        provider.name(),
                        describe_join_error(&err),
                        started.elapsed(),
                    )
                }
            })
            .collect();

        let report = Report {
            ip,
            timestamp,
            results,
            total_duration: started.elapsed(),
        };

        info!(
            "Lookup of {} finished: {}/{} providers succeeded in {}ms",
            ip,
            report.success_count(),
            report.results.len(),
            report.total_duration.as_millis()
        );

        report
    }

    /// Like [`lookup`](Self::lookup), but cancels providers still running
    /// after `timeout`.
    ///
    /// The deadline token is a child of `parent`, so cancelling `parent`
    /// (e.g. on Ctrl-C) also stops the lookup.
    pub async fn lookup_with_timeout(
        &self,
        ip: IpAddress,
        timeout: Duration,
        parent: &CancellationToken,
    ) -> Report {
        let deadline = parent.child_token();
        // Cancels the token once the lookup returns, which also stops the timer.
        let _disarm = deadline.clone().drop_guard();

        let timer = deadline.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    debug!("Lookup deadline of {}ms reached", timeout.as_millis());
                    timer.cancel();
                }
                _ = timer.cancelled() => {}
            }
        });

        self.lookup(ip, &deadline).await
    }
}

async fn run_provider(
    provider: Arc<dyn Provider>,
    ip: IpAddress,
    cancel: CancellationToken,
) -> ProviderResult {
    let started = Instant::now();
    let fetched = provider.fetch(ip, &cancel).await;
    let duration = started.elapsed();

    match fetched {
        Ok(geo) => {
            debug!(
                "Provider {} succeeded in {}ms",
                provider.name(),
                duration.as_millis()
            );
            ProviderResult::succeeded(provider.name(), geo, duration)
        }
        Err(err) => {
            debug!(
                "Provider {} failed in {}ms: {}",
                provider.name(),
                duration.as_millis(),
                err
            );
            ProviderResult::failed(provider.name(), err.to_string(), duration)
        }
    }
}

fn describe_join_error(err: &JoinError) -> String {
    if err.is_panic() {
        "provider panicked".to_string()
    } else {
        "provider task was cancelled".to_string()
    }
}
