//! sea-orm entities for the tables the outbox worker reads and writes.

pub mod form;
pub mod form_version;
pub mod integration_outbox;
pub mod platform_form_engine;
pub mod submission;
