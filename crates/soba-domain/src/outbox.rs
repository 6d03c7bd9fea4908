//! Outbox record status machine and retry policy.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Delivery status of an outbox record.
///
/// `pending` → `processing` → `done`; `processing` → `pending` on failure.
/// `done` is terminal and there is no dead-letter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Done,
}

impl OutboxStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown outbox status: {0}")]
pub struct UnknownOutboxStatus(pub String);

impl FromStr for OutboxStatus {
    type Err = UnknownOutboxStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            other => Err(UnknownOutboxStatus(other.to_owned())),
        }
    }
}

/// A record may be claimed iff it is pending and its retry time has come.
pub fn is_claimable(
    status: OutboxStatus,
    next_attempt_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    status == OutboxStatus::Pending && next_attempt_at.is_none_or(|at| at <= now)
}

/// Linear step between retries.
pub const RETRY_STEP_MS: i64 = 60_000;

/// Upper bound on the delay between two attempts.
pub const MAX_RETRY_DELAY_MS: i64 = 600_000;

/// `last_error` is stored truncated to this many characters.
pub const MAX_ERROR_LEN: usize = 1000;

/// Delay before the next attempt, given the attempt count *before* the
/// failure being recorded: 60s, 120s, ... capped at 10 minutes.
pub fn retry_delay(attempt_count_before: i32) -> TimeDelta {
    let factor = i64::from(attempt_count_before.max(0)) + 1;
    let ms = RETRY_STEP_MS.saturating_mul(factor).min(MAX_RETRY_DELAY_MS);
    TimeDelta::milliseconds(ms)
}

pub fn next_attempt_at(now: DateTime<Utc>, attempt_count_before: i32) -> DateTime<Utc> {
    now + retry_delay(attempt_count_before)
}

/// Cut an error message to [`MAX_ERROR_LEN`] characters on a char boundary.
pub fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_LEN) {
        Some((idx, _)) => message[..idx].to_owned(),
        None => message.to_owned(),
    }
}
