//! Progress observers

use super::types::{Outcome, ProgressEvent};
use tracing::{debug, info, warn};

/// Receives progress events from a run
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Renders events as log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { target, resumed_at } => {
                if *resumed_at > 0 {
                    info!("Resuming {} after {} processed", target, resumed_at);
                } else {
                    info!("Starting {}", target);
                }
            }
            ProgressEvent::Enumerated {
                parents,
                declared,
                unreachable,
            } => {
                info!("Collected {} of {} declared parents", parents, declared);
                if *unreachable > 0 {
                    warn!("{} parents are unreachable through the listing", unreachable);
                }
            }
            ProgressEvent::ParentStarted {
                index,
                total,
                alias,
            } => {
                debug!("[{}/{}] {}", index + 1, total, alias);
            }
            ProgressEvent::ParentFinished { alias, outcome } => match outcome {
                Outcome::Updated {
                    extracted,
                    new_records,
                    unreachable: 0,
                } => info!("{}: {} records, +{} new", alias, extracted, new_records),
                Outcome::Updated {
                    extracted,
                    new_records,
                    unreachable,
                } => info!(
                    "{}: {} records, +{} new, {} out of reach",
                    alias, extracted, new_records, unreachable
                ),
                Outcome::UpToDate => debug!("{}: up to date", alias),
                Outcome::RemoteEmpty => debug!("{}: nothing upstream", alias),
                Outcome::Failed { reason } => warn!("{}: skipped ({})", alias, reason),
            },
            ProgressEvent::BatchPersisted {
                written,
                total_written,
            } => {
                debug!("Saved {} records ({} this run)", written, total_written);
            }
            ProgressEvent::Cancelled { processed } => {
                warn!("Stopped on request after {} processed; run again to resume", processed);
            }
            ProgressEvent::RunFinished { completed, stats } => {
                info!(
                    "Finished ({}): {} examined, {} updated, {} up to date, {} empty, {} failed, {} records written, {} new",
                    if *completed { "complete" } else { "partial" },
                    stats.parents_examined,
                    stats.parents_updated,
                    stats.parents_up_to_date,
                    stats.parents_empty,
                    stats.parents_failed,
                    stats.records_written,
                    stats.new_records
                );
                if stats.records_unreachable > 0 {
                    warn!(
                        "{} upstream records were beyond the offset ceiling",
                        stats.records_unreachable
                    );
                }
            }
        }
    }
}
