#![allow(async_fn_in_trait)]

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::watch;
use tracing::{Instrument as _, error, info, info_span, warn};
use uuid::Uuid;

use crate::domain::repository::OutboxStore;
use crate::domain::types::{BatchReport, OutboxRecord};
use crate::error::SyncError;

/// Handles a single claimed record.
pub trait OutboxProcessor: Send + Sync {
    async fn process(&self, record: &OutboxRecord) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub batch_size: u64,
    /// `None` disables reclaiming stuck leases.
    pub lease_timeout: Option<TimeDelta>,
    /// `None` keeps `done` records forever.
    pub retention: Option<TimeDelta>,
    pub attempt_warn_threshold: i32,
    /// 0 never gives up on an unavailable store.
    pub max_store_failures: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            batch_size: 25,
            lease_timeout: Some(TimeDelta::minutes(15)),
            retention: None,
            attempt_warn_threshold: 10,
            max_store_failures: 5,
        }
    }
}

enum Outcome {
    Succeeded,
    Failed,
    /// Another worker holds the record now; nothing was written.
    LeaseLost,
}

/// Polling loop: claim, process each record in isolation, record outcome.
pub struct OutboxWorker<O, P>
where
    O: OutboxStore,
    P: OutboxProcessor,
{
    pub store: O,
    pub processor: P,
    pub settings: WorkerSettings,
}

impl<O, P> OutboxWorker<O, P>
where
    O: OutboxStore,
    P: OutboxProcessor,
{
    /// One iteration. Only a failed claim is an error; item failures are
    /// recorded on their rows and counted in the report.
    pub async fn run_once(&self) -> Result<BatchReport, SyncError> {
        self.housekeeping().await;

        let records = self.store.claim_batch(self.settings.batch_size).await?;
        let mut report = BatchReport {
            claimed: records.len(),
            ..BatchReport::default()
        };
        for record in &records {
            let span = info_span!(
                "outbox_item",
                trace_id = %Uuid::new_v4(),
                outbox_id = %record.id,
                topic = %record.topic,
                aggregate_type = %record.aggregate_type,
                aggregate_id = %record.aggregate_id,
                workspace_id = %record.workspace_id,
                attempt_count = record.attempt_count
            );
            match self.handle(record).instrument(span).await {
                Outcome::Succeeded => report.succeeded += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::LeaseLost => report.lease_lost += 1,
            }
        }
        Ok(report)
    }

    async fn handle(&self, record: &OutboxRecord) -> Outcome {
        // Refreshed per item: a whole batch may outlive the lease timeout.
        let leased_at = match self.store.renew_lease(record.id, record.updated_at).await {
            Ok(Some(leased_at)) => leased_at,
            Ok(None) => {
                warn!("outbox lease lost before processing, skipping");
                return Outcome::LeaseLost;
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "failed to renew outbox lease");
                record.updated_at
            }
        };

        let err = match self.processor.process(record).await {
            Ok(()) => {
                return match self.store.mark_succeeded(record.id, leased_at).await {
                    Ok(true) => {
                        info!("outbox record delivered");
                        Outcome::Succeeded
                    }
                    Ok(false) => {
                        warn!("outbox lease lost, delivery left to the new holder");
                        Outcome::LeaseLost
                    }
                    Err(e) => {
                        // The row stays leased until reclaimed and is delivered again.
                        error!(error = %e, kind = e.kind(), "failed to mark outbox record succeeded");
                        Outcome::Failed
                    }
                };
            }
            Err(err) => err,
        };

        let attempts = record.attempt_count.saturating_add(1);
        if attempts >= self.settings.attempt_warn_threshold {
            error!(
                error = %err,
                kind = err.kind(),
                attempts,
                threshold = self.settings.attempt_warn_threshold,
                "outbox record keeps failing"
            );
        } else {
            warn!(error = %err, kind = err.kind(), attempts, "outbox record failed, will retry");
        }

        match self
            .store
            .mark_failed(record.id, leased_at, &err.to_string(), record.attempt_count)
            .await
        {
            Ok(true) => Outcome::Failed,
            Ok(false) => {
                warn!("outbox lease lost, failure not recorded");
                Outcome::LeaseLost
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "failed to mark outbox record failed");
                Outcome::Failed
            }
        }
    }

    /// Release stuck leases and purge old `done` rows. Never fatal.
    async fn housekeeping(&self) {
        let now = Utc::now();
        let cutoff = |age: Option<TimeDelta>| age.and_then(|age| now.checked_sub_signed(age));
        if let Some(leased_before) = cutoff(self.settings.lease_timeout) {
            match self.store.reclaim_expired(leased_before).await {
                Ok(0) => {}
                Ok(reclaimed) => warn!(reclaimed, "reclaimed expired outbox leases"),
                Err(e) => warn!(error = %e, "failed to reclaim expired outbox leases"),
            }
        }
        if let Some(done_before) = cutoff(self.settings.retention) {
            match self.store.purge_done(done_before).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged delivered outbox records"),
                Err(e) => warn!(error = %e, "failed to purge delivered outbox records"),
            }
        }
    }

    /// Loop until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// The batch in flight always completes. Returns an error only after
    /// `max_store_failures` consecutive claims found the store unavailable.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), SyncError> {
        info!(
            batch_size = self.settings.batch_size,
            poll_interval = ?self.settings.poll_interval,
            "outbox worker started"
        );
        let mut store_failures: u32 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_once().await {
                Ok(report) => {
                    store_failures = 0;
                    if report.claimed > 0 {
                        info!(
                            claimed = report.claimed,
                            succeeded = report.succeeded,
                            failed = report.failed,
                            lease_lost = report.lease_lost,
                            "outbox batch processed"
                        );
                    }
                }
                Err(err) if err.is_store_unavailable() => {
                    store_failures += 1;
                    error!(error = %err, consecutive = store_failures, "outbox store unavailable");
                    let limit = self.settings.max_store_failures;
                    if limit > 0 && store_failures >= limit {
                        return Err(err);
                    }
                }
                Err(err) => {
                    store_failures = 0;
                    error!(error = %err, kind = err.kind(), "failed to claim outbox batch");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("outbox worker stopped");
        Ok(())
    }
}
