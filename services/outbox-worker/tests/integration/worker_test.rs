use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use soba_domain::outbox::OutboxStatus;
use soba_domain::sync_status::EngineSyncStatus;
use soba_outbox_worker::domain::repository::OutboxStore;
use soba_outbox_worker::domain::types::{BatchReport, OutboxRecord};
use soba_outbox_worker::error::SyncError;
use soba_outbox_worker::usecase::worker::{OutboxProcessor, OutboxWorker, WorkerSettings};

use crate::helpers::{
    FORMIO, MemoryOutboxStore, MockFormRepo, MockFormVersionRepo, MockSubmissionRepo,
    StubAdapter, StubBehavior, TestSyncEngine, form_version_id, form_version_record,
    record_from_fixture, registry_with, submission_id, sync_engine, test_form_version,
    test_submission,
};

fn worker<P: OutboxProcessor>(
    store: MemoryOutboxStore,
    processor: P,
) -> OutboxWorker<MemoryOutboxStore, P> {
    OutboxWorker {
        store,
        processor,
        settings: WorkerSettings {
            poll_interval: Duration::from_millis(100),
            ..WorkerSettings::default()
        },
    }
}

fn formio_engine(behavior: StubBehavior) -> (TestSyncEngine, MockFormVersionRepo) {
    let versions = MockFormVersionRepo::new(vec![test_form_version(form_version_id())]);
    let engine = sync_engine(
        MockFormRepo::empty(),
        versions.clone(),
        MockSubmissionRepo::new(vec![test_submission(submission_id())]),
        registry_with(FORMIO, StubAdapter::new(behavior)),
    );
    (engine, versions)
}

/// Records every id it is handed and always succeeds.
#[derive(Clone, Default)]
struct RecordingProcessor {
    seen: Arc<Mutex<Vec<Uuid>>>,
}

impl OutboxProcessor for RecordingProcessor {
    async fn process(&self, record: &OutboxRecord) -> Result<(), SyncError> {
        tokio::task::yield_now().await;
        self.seen.lock().unwrap().push(record.id);
        Ok(())
    }
}

/// Lets a second holder take the lease over while the first is mid-delivery.
#[derive(Clone)]
struct LeaseStealingProcessor {
    store: MemoryOutboxStore,
}

impl OutboxProcessor for LeaseStealingProcessor {
    async fn process(&self, _record: &OutboxRecord) -> Result<(), SyncError> {
        self.store
            .reclaim_expired(Utc::now() + TimeDelta::seconds(1))
            .await?;
        let stolen = self.store.claim_batch(10).await?;
        assert_eq!(stolen.len(), 1);
        Ok(())
    }
}

// ── run_once ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_deliver_batch_and_requeue_only_the_failing_item() {
    let form_version = record_from_fixture("form_version_create.json");
    let widget = record_from_fixture("widget_create.json");
    let submission = record_from_fixture("submission_create.json");
    let ids = (form_version.id, widget.id, submission.id);
    let store = MemoryOutboxStore::with_records(vec![form_version, widget, submission]);
    let (engine, _) = formio_engine(StubBehavior::Succeed("formio"));
    let worker = worker(store.clone(), engine);

    let before = Utc::now();
    let report = worker.run_once().await.unwrap();

    assert_eq!(
        report,
        BatchReport {
            claimed: 3,
            succeeded: 2,
            failed: 1,
            lease_lost: 0,
        }
    );
    assert_eq!(store.get(ids.0).status, OutboxStatus::Done);
    assert_eq!(store.get(ids.2).status, OutboxStatus::Done);

    let widget = store.get(ids.1);
    assert_eq!(widget.status, OutboxStatus::Pending);
    assert_eq!(widget.attempt_count, 1);
    assert!(widget.last_error.as_deref().unwrap().contains("widget"));
    assert!(widget.next_attempt_at.unwrap() >= before + TimeDelta::seconds(60));
}

#[tokio::test]
async fn should_record_engine_failure_and_schedule_retry() {
    let record = record_from_fixture("form_version_create.json");
    let id = record.id;
    let store = MemoryOutboxStore::with_records(vec![record]);
    let (engine, versions) = formio_engine(StubBehavior::Fail("engine unreachable"));
    let worker = worker(store.clone(), engine);

    let before = Utc::now();
    let report = worker.run_once().await.unwrap();
    let after = Utc::now();

    assert_eq!(report.failed, 1);
    let row = store.get(id);
    assert_eq!(row.status, OutboxStatus::Pending);
    assert_eq!(row.attempt_count, 1);
    assert_eq!(row.last_error.as_deref(), Some("engine unreachable"));
    let next = row.next_attempt_at.unwrap();
    assert!(next >= before + TimeDelta::seconds(60));
    assert!(next <= after + TimeDelta::seconds(60));
    assert_eq!(
        versions.versions_handle().lock().unwrap()[0].engine_sync_status,
        EngineSyncStatus::Provisioning
    );
}

#[tokio::test]
async fn should_not_claim_record_before_its_retry_time() {
    let mut record = form_version_record(form_version_id(), TimeDelta::minutes(1));
    record.attempt_count = 1;
    record.next_attempt_at = Some(Utc::now() + TimeDelta::seconds(30));
    let store = MemoryOutboxStore::with_records(vec![record]);
    let processor = RecordingProcessor::default();
    let worker = worker(store, processor.clone());

    let report = worker.run_once().await.unwrap();

    assert_eq!(report, BatchReport::default());
    assert!(processor.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn should_cap_retry_delay_at_ten_minutes() {
    let mut record = record_from_fixture("form_version_create.json");
    record.attempt_count = 100;
    let id = record.id;
    let store = MemoryOutboxStore::with_records(vec![record]);
    let (engine, _) = formio_engine(StubBehavior::Fail("engine unreachable"));
    let worker = worker(store.clone(), engine);

    let before = Utc::now();
    worker.run_once().await.unwrap();
    let after = Utc::now();

    let row = store.get(id);
    assert_eq!(row.attempt_count, 101);
    let next = row.next_attempt_at.unwrap();
    assert!(next >= before + TimeDelta::minutes(10));
    assert!(next <= after + TimeDelta::minutes(10));
}

#[tokio::test]
async fn should_claim_oldest_records_first_up_to_batch_size() {
    let oldest = form_version_record(Uuid::now_v7(), TimeDelta::minutes(30));
    let middle = form_version_record(Uuid::now_v7(), TimeDelta::minutes(20));
    let newest = form_version_record(Uuid::now_v7(), TimeDelta::minutes(10));
    let expected = vec![oldest.id, middle.id];
    let store = MemoryOutboxStore::with_records(vec![newest, oldest, middle]);
    let processor = RecordingProcessor::default();
    let mut worker = worker(store, processor.clone());
    worker.settings.batch_size = 2;

    let report = worker.run_once().await.unwrap();

    assert_eq!(report.claimed, 2);
    assert_eq!(*processor.seen.lock().unwrap(), expected);
}

#[tokio::test]
async fn should_hand_each_record_to_exactly_one_of_two_workers() {
    let records: Vec<_> = (0..10)
        .map(|i| form_version_record(Uuid::now_v7(), TimeDelta::seconds(60 - i)))
        .collect();
    let mut all_ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    let store = MemoryOutboxStore::with_records(records);
    let processor = RecordingProcessor::default();
    let mut first = worker(store.clone(), processor.clone());
    let mut second = worker(store.clone(), processor.clone());
    first.settings.batch_size = 6;
    second.settings.batch_size = 6;

    let (a, b) = tokio::join!(first.run_once(), second.run_once());

    assert_eq!(a.unwrap().claimed + b.unwrap().claimed, 10);
    let mut seen = processor.seen.lock().unwrap().clone();
    seen.sort();
    all_ids.sort();
    assert_eq!(seen, all_ids);
    assert!(
        store
            .rows_handle()
            .lock()
            .unwrap()
            .iter()
            .all(|r| r.status == OutboxStatus::Done)
    );
}

// ── Lease ownership ──────────────────────────────────────────────────────────

#[tokio::test]
async fn should_ignore_late_failure_from_a_worker_whose_lease_was_reclaimed() {
    let record = form_version_record(form_version_id(), TimeDelta::minutes(5));
    let id = record.id;
    let store = MemoryOutboxStore::with_records(vec![record]);

    let first = store.claim_batch(10).await.unwrap();
    let a_stamp = first[0].updated_at;
    store
        .reclaim_expired(Utc::now() + TimeDelta::seconds(1))
        .await
        .unwrap();
    let second = store.claim_batch(10).await.unwrap();
    let b_stamp = second[0].updated_at;
    assert_ne!(a_stamp, b_stamp);

    let written = store.mark_failed(id, a_stamp, "late", 0).await.unwrap();

    assert!(!written);
    let row = store.get(id);
    assert_eq!(row.status, OutboxStatus::Processing);
    assert_eq!(row.updated_at, b_stamp);
    assert_eq!(row.attempt_count, 0);
    assert!(store.claim_batch(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn should_only_let_the_current_holder_complete_a_record() {
    let record = form_version_record(form_version_id(), TimeDelta::minutes(5));
    let id = record.id;
    let store = MemoryOutboxStore::with_records(vec![record]);

    let a_stamp = store.claim_batch(10).await.unwrap()[0].updated_at;
    store
        .reclaim_expired(Utc::now() + TimeDelta::seconds(1))
        .await
        .unwrap();
    let b_stamp = store.claim_batch(10).await.unwrap()[0].updated_at;

    assert!(!store.mark_succeeded(id, a_stamp).await.unwrap());
    assert_eq!(store.get(id).status, OutboxStatus::Processing);
    assert!(store.mark_succeeded(id, b_stamp).await.unwrap());
    assert_eq!(store.get(id).status, OutboxStatus::Done);
}

#[tokio::test]
async fn should_refuse_to_renew_a_reclaimed_lease() {
    let record = form_version_record(form_version_id(), TimeDelta::minutes(5));
    let id = record.id;
    let store = MemoryOutboxStore::with_records(vec![record]);

    let stamp = store.claim_batch(10).await.unwrap()[0].updated_at;
    let renewed = store.renew_lease(id, stamp).await.unwrap().unwrap();
    assert!(renewed > stamp);
    assert_eq!(store.renew_lease(id, stamp).await.unwrap(), None);

    store
        .reclaim_expired(Utc::now() + TimeDelta::seconds(1))
        .await
        .unwrap();

    assert_eq!(store.renew_lease(id, renewed).await.unwrap(), None);
    assert_eq!(store.get(id).status, OutboxStatus::Pending);
}

#[tokio::test]
async fn should_count_lease_lost_when_another_worker_takes_over_mid_delivery() {
    let record = form_version_record(form_version_id(), TimeDelta::minutes(5));
    let id = record.id;
    let store = MemoryOutboxStore::with_records(vec![record]);
    let processor = LeaseStealingProcessor {
        store: store.clone(),
    };
    let worker = worker(store.clone(), processor);

    let report = worker.run_once().await.unwrap();

    assert_eq!(
        report,
        BatchReport {
            claimed: 1,
            succeeded: 0,
            failed: 0,
            lease_lost: 1,
        }
    );
    let row = store.get(id);
    assert_eq!(row.status, OutboxStatus::Processing);
    assert_eq!(row.attempt_count, 0);
}

// ── Housekeeping ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reclaim_expired_lease_and_deliver_it() {
    let mut stuck = form_version_record(form_version_id(), TimeDelta::hours(2));
    stuck.status = OutboxStatus::Processing;
    stuck.updated_at = Utc::now() - TimeDelta::hours(1);
    let id = stuck.id;
    let store = MemoryOutboxStore::with_records(vec![stuck]);
    let processor = RecordingProcessor::default();
    let worker = worker(store.clone(), processor.clone());

    let report = worker.run_once().await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(*processor.seen.lock().unwrap(), vec![id]);
    assert_eq!(store.get(id).status, OutboxStatus::Done);
}

#[tokio::test]
async fn should_leave_fresh_lease_alone() {
    let mut leased = form_version_record(form_version_id(), TimeDelta::minutes(1));
    leased.status = OutboxStatus::Processing;
    leased.updated_at = Utc::now();
    let id = leased.id;
    let store = MemoryOutboxStore::with_records(vec![leased]);
    let worker = worker(store.clone(), RecordingProcessor::default());

    let report = worker.run_once().await.unwrap();

    assert_eq!(report.claimed, 0);
    assert_eq!(store.get(id).status, OutboxStatus::Processing);
}

#[tokio::test]
async fn should_purge_done_records_past_retention() {
    let mut old = form_version_record(Uuid::now_v7(), TimeDelta::days(10));
    old.status = OutboxStatus::Done;
    let mut recent = form_version_record(Uuid::now_v7(), TimeDelta::days(1));
    recent.status = OutboxStatus::Done;
    let recent_id = recent.id;
    let store = MemoryOutboxStore::with_records(vec![old, recent]);
    let mut worker = worker(store.clone(), RecordingProcessor::default());
    worker.settings.retention = Some(TimeDelta::days(7));

    worker.run_once().await.unwrap();

    let rows = store.rows_handle();
    let rows = rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, recent_id);
}

#[tokio::test]
async fn should_keep_done_records_without_retention() {
    let mut old = form_version_record(Uuid::now_v7(), TimeDelta::days(400));
    old.status = OutboxStatus::Done;
    let store = MemoryOutboxStore::with_records(vec![old]);
    let worker = worker(store.clone(), RecordingProcessor::default());

    worker.run_once().await.unwrap();

    assert_eq!(store.rows_handle().lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_report_backlog_stats() {
    let fresh = form_version_record(Uuid::now_v7(), TimeDelta::minutes(5));
    let oldest_at = fresh.created_at;
    let mut retrying = form_version_record(Uuid::now_v7(), TimeDelta::minutes(1));
    retrying.attempt_count = 2;
    let mut stuck = form_version_record(Uuid::now_v7(), TimeDelta::minutes(2));
    stuck.attempt_count = 12;
    let mut done = form_version_record(Uuid::now_v7(), TimeDelta::minutes(3));
    done.status = OutboxStatus::Done;
    done.attempt_count = 15;
    let store = MemoryOutboxStore::with_records(vec![fresh, retrying, stuck, done]);

    let stats = store.stats(10).await.unwrap();

    assert_eq!(stats.pending, 3);
    assert_eq!(stats.done, 1);
    assert_eq!(stats.retrying, 2);
    assert_eq!(stats.over_threshold, 1);
    assert_eq!(stats.oldest_pending_at, Some(oldest_at));
}

// ── run ──────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn should_stop_after_consecutive_store_failures() {
    let store = MemoryOutboxStore::new();
    store.fail_next_claims(10);
    let mut worker = worker(store, RecordingProcessor::default());
    worker.settings.max_store_failures = 3;
    let (_tx, rx) = watch::channel(false);

    let result = worker.run(rx).await;

    assert!(
        matches!(result, Err(SyncError::StoreUnavailable(_))),
        "expected StoreUnavailable, got {result:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn should_recover_from_transient_store_failure() {
    let record = form_version_record(form_version_id(), TimeDelta::minutes(1));
    let id = record.id;
    let store = MemoryOutboxStore::with_records(vec![record]);
    store.fail_next_claims(2);
    let worker = worker(store.clone(), RecordingProcessor::default());
    let (tx, rx) = watch::channel(false);

    let (result, _) = tokio::join!(worker.run(rx), async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
    });

    assert!(result.is_ok());
    assert_eq!(store.get(id).status, OutboxStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn should_finish_cleanly_when_shutdown_is_requested() {
    let worker = worker(MemoryOutboxStore::new(), RecordingProcessor::default());
    let (tx, rx) = watch::channel(false);

    let (result, _) = tokio::join!(worker.run(rx), async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        tx.send(true).unwrap();
    });

    assert!(result.is_ok());
}

#[tokio::test]
async fn should_not_start_when_already_shut_down() {
    let record = form_version_record(form_version_id(), TimeDelta::minutes(1));
    let store = MemoryOutboxStore::with_records(vec![record]);
    let processor = RecordingProcessor::default();
    let worker = worker(store, processor.clone());
    let (_tx, rx) = watch::channel(true);

    worker.run(rx).await.unwrap();

    assert!(processor.seen.lock().unwrap().is_empty());
}
