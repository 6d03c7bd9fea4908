//! Domain types for the form-engine outbox.
//!
//! Pure types with no framework dependencies: aggregate kinds, outbox and
//! engine-sync status machines, the event payload codec, topic names and the
//! retry policy. Import in `usecase/` and `domain/` layers as well as `infra/`.

pub mod aggregate;
pub mod events;
pub mod outbox;
pub mod sync_status;
pub mod topic;
