//! Outbox topic names. Built here, never parsed by the worker.

use crate::aggregate::AggregateType;

pub fn form_version_create(engine_code: &str) -> String {
    format!("form_engine.{engine_code}.form_version.create")
}

pub fn submission_create(engine_code: &str) -> String {
    format!("form_engine.{engine_code}.submission.create")
}

/// Create-topic for the given aggregate kind.
pub fn create_topic(aggregate_type: AggregateType, engine_code: &str) -> String {
    match aggregate_type {
        AggregateType::FormVersion => form_version_create(engine_code),
        AggregateType::Submission => submission_create(engine_code),
    }
}
