//! Runs against a real Postgres when `TEST_DATABASE_URL` is set; each test
//! gets its own schema. Without the variable the database tests return early.

use std::collections::HashSet;

use chrono::{TimeDelta, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter,
};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use uuid::Uuid;

use soba_domain::aggregate::AggregateType;
use soba_domain::events::EventPayload;
use soba_domain::sync_status::EngineSyncStatus;
use soba_outbox_migration::Migrator;
use soba_outbox_schema::{form, form_version, integration_outbox, platform_form_engine};
use soba_outbox_worker::domain::repository::{
    FormVersionRepository, OutboxStore, SubmissionRepository,
};
use soba_outbox_worker::domain::types::NewOutboxEvent;
use soba_outbox_worker::error::SyncError;
use soba_outbox_worker::infra::db::{
    DbFormVersionRepository, DbOutboxStore, DbSubmissionRepository, enqueue,
};

use crate::helpers::{FORMIO, form_id, form_version_id, submission_id, workspace_id};

struct TestSchema {
    admin: DatabaseConnection,
    db: DatabaseConnection,
    name: String,
}

impl TestSchema {
    async fn create() -> Option<Self> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping postgres test");
            return None;
        };
        let admin = Database::connect(url.as_str()).await.unwrap();
        let name = format!("outbox_test_{}", Uuid::new_v4().simple());
        admin
            .execute_unprepared(&format!("CREATE SCHEMA {name}"))
            .await
            .unwrap();

        let mut options = ConnectOptions::new(url);
        options
            .max_connections(4)
            .set_schema_search_path(name.clone())
            .sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Some(Self { admin, db, name })
    }

    fn store(&self) -> DbOutboxStore {
        DbOutboxStore {
            db: self.db.clone(),
            actor_id: None,
        }
    }

    async fn outbox_rows(&self) -> u64 {
        integration_outbox::Entity::find()
            .count(&self.db)
            .await
            .unwrap()
    }

    async fn drop_schema(self) {
        self.db.close().await.unwrap();
        self.admin
            .execute_unprepared(&format!("DROP SCHEMA {} CASCADE", self.name))
            .await
            .unwrap();
    }
}

fn actor() -> Uuid {
    Uuid::parse_str("0192f0c4-5a1e-7c3a-9b11-4f0e8d2a6cff").unwrap()
}

fn form_version_event(id: Uuid) -> NewOutboxEvent {
    let payload = EventPayload::form_version_create(id, FORMIO, Some(form_id()));
    NewOutboxEvent::from_payload(workspace_id(), &payload, Some(actor())).unwrap()
}

/// One engine, one form and one draft version whose last sync had failed.
async fn seed_draft_form_version(db: &DatabaseConnection) {
    let now = Utc::now();
    let engine_id = Uuid::now_v7();
    platform_form_engine::ActiveModel {
        id: Set(engine_id),
        code: Set(FORMIO.to_owned()),
        name: Set("Form.io v5".to_owned()),
        engine_version: Set(Some("v5".to_owned())),
        is_active: Set(true),
        is_default: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
    form::ActiveModel {
        id: Set(form_id()),
        workspace_id: Set(workspace_id()),
        form_engine_id: Set(engine_id),
        slug: Set("intake".to_owned()),
        name: Set("Intake".to_owned()),
        status: Set("active".to_owned()),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(actor()),
        updated_by: Set(actor()),
        deleted_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();
    form_version::ActiveModel {
        id: Set(form_version_id()),
        workspace_id: Set(workspace_id()),
        form_id: Set(form_id()),
        version_no: Set(1),
        state: Set("draft".to_owned()),
        engine_schema_ref: Set(None),
        engine_sync_status: Set(EngineSyncStatus::Error.as_str().to_owned()),
        engine_sync_error: Set(Some("previous attempt".to_owned())),
        published_at: Set(None),
        published_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        created_by: Set(actor()),
        updated_by: Set(actor()),
        deleted_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();
}

async fn enqueue_many(db: &DatabaseConnection, count: usize) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(
            enqueue(db, &form_version_event(Uuid::now_v7()))
                .await
                .unwrap(),
        );
    }
    ids
}

// ── Claiming ─────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn should_hand_disjoint_batches_to_concurrent_claims() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    let all: HashSet<Uuid> = enqueue_many(&schema.db, 10).await.into_iter().collect();
    let (a, b) = (schema.store(), schema.store());

    let (first, second) = tokio::join!(a.claim_batch(5), b.claim_batch(5));

    let first: HashSet<Uuid> = first.unwrap().into_iter().map(|r| r.id).collect();
    let second: HashSet<Uuid> = second.unwrap().into_iter().map(|r| r.id).collect();
    assert!(first.is_disjoint(&second));
    assert_eq!(&first | &second, all);
    schema.drop_schema().await;
}

#[tokio::test]
async fn should_claim_in_creation_order() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    let ids = enqueue_many(&schema.db, 5).await;

    let claimed = schema.store().claim_batch(3).await.unwrap();

    let claimed: Vec<Uuid> = claimed.into_iter().map(|r| r.id).collect();
    assert_eq!(claimed, ids[..3]);
    schema.drop_schema().await;
}

// ── Lease ownership ──────────────────────────────────────────────────────────

#[tokio::test]
async fn should_reject_writes_from_a_reclaimed_lease() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    let id = enqueue_many(&schema.db, 1).await[0];
    let store = schema.store();

    let a_stamp = store.claim_batch(10).await.unwrap()[0].updated_at;
    let reclaimed = store
        .reclaim_expired(Utc::now() + TimeDelta::seconds(1))
        .await
        .unwrap();
    assert_eq!(reclaimed, 1);
    let b_stamp = store.claim_batch(10).await.unwrap()[0].updated_at;

    assert_eq!(store.renew_lease(id, a_stamp).await.unwrap(), None);
    assert!(!store.mark_failed(id, a_stamp, "late", 0).await.unwrap());
    assert!(!store.mark_succeeded(id, a_stamp).await.unwrap());
    assert!(store.claim_batch(10).await.unwrap().is_empty());

    let b_stamp = store.renew_lease(id, b_stamp).await.unwrap().unwrap();
    assert!(store.mark_succeeded(id, b_stamp).await.unwrap());
    let stats = store.stats(10).await.unwrap();
    assert_eq!((stats.pending, stats.processing, stats.done), (0, 0, 1));
    schema.drop_schema().await;
}

// ── Atomic publish ───────────────────────────────────────────────────────────

#[tokio::test]
async fn should_publish_version_and_enqueue_together() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    seed_draft_form_version(&schema.db).await;
    let repo = DbFormVersionRepository {
        db: schema.db.clone(),
        actor_id: None,
    };

    repo.publish_with_outbox(
        workspace_id(),
        form_version_id(),
        actor(),
        &form_version_event(form_version_id()),
    )
    .await
    .unwrap();

    let version = form_version::Entity::find_by_id(form_version_id())
        .one(&schema.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.state, "published");
    assert_eq!(version.engine_sync_status, EngineSyncStatus::Pending.as_str());
    assert_eq!(version.published_by, Some(actor()));
    let rows = integration_outbox::Entity::find()
        .filter(integration_outbox::Column::AggregateId.eq(form_version_id()))
        .all(&schema.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].topic, "form_engine.formio-v5.form_version.create");
    assert_eq!(rows[0].status, "pending");
    schema.drop_schema().await;
}

#[tokio::test]
async fn should_roll_back_publish_when_outbox_insert_fails() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    seed_draft_form_version(&schema.db).await;
    let repo = DbFormVersionRepository {
        db: schema.db.clone(),
        actor_id: None,
    };
    let mismatched = NewOutboxEvent {
        topic: "form_engine.formio-v5.form_version.create".to_owned(),
        aggregate_type: AggregateType::FormVersion,
        aggregate_id: form_version_id(),
        workspace_id: workspace_id(),
        payload: json!({ "formVersionId": Uuid::now_v7(), "engineCode": FORMIO }),
        actor_id: Some(actor()),
    };

    let result = repo
        .publish_with_outbox(workspace_id(), form_version_id(), actor(), &mismatched)
        .await;

    assert!(
        matches!(result, Err(SyncError::Internal(_))),
        "expected Internal, got {result:?}"
    );
    let version = form_version::Entity::find_by_id(form_version_id())
        .one(&schema.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.state, "draft");
    assert_eq!(version.engine_sync_status, EngineSyncStatus::Error.as_str());
    assert_eq!(version.engine_sync_error.as_deref(), Some("previous attempt"));
    assert_eq!(schema.outbox_rows().await, 0);
    schema.drop_schema().await;
}

#[tokio::test]
async fn should_not_enqueue_when_version_to_publish_is_missing() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    let repo = DbFormVersionRepository {
        db: schema.db.clone(),
        actor_id: None,
    };

    let result = repo
        .publish_with_outbox(
            workspace_id(),
            form_version_id(),
            actor(),
            &form_version_event(form_version_id()),
        )
        .await;

    assert!(matches!(result, Err(SyncError::AggregateNotFound { .. })));
    assert_eq!(schema.outbox_rows().await, 0);
    schema.drop_schema().await;
}

#[tokio::test]
async fn should_not_enqueue_when_submission_to_submit_is_missing() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    let repo = DbSubmissionRepository {
        db: schema.db.clone(),
        actor_id: None,
    };
    let payload =
        EventPayload::submission_create(submission_id(), FORMIO, Some(form_version_id()));
    let event = NewOutboxEvent::from_payload(workspace_id(), &payload, Some(actor())).unwrap();

    let result = repo
        .submit_with_outbox(workspace_id(), submission_id(), actor(), &event)
        .await;

    assert!(matches!(
        result,
        Err(SyncError::AggregateNotFound {
            aggregate_type: AggregateType::Submission,
            ..
        })
    ));
    assert_eq!(schema.outbox_rows().await, 0);
    schema.drop_schema().await;
}

// ── Connectivity ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_report_store_unavailable_without_connection() {
    let store = DbOutboxStore {
        db: DatabaseConnection::Disconnected,
        actor_id: None,
    };

    let claim = store.claim_batch(5).await;
    let stats = store.stats(10).await;

    assert!(claim.unwrap_err().is_store_unavailable());
    assert!(stats.unwrap_err().is_store_unavailable());
}
