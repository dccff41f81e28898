//! Core error type.
//!
//! Almost every operation in this crate degrades instead of failing: a
//! malformed snapshot entry is dropped with a diagnostic, a stale lookup
//! returns `None`. `CoreError` exists for the few entry points that can fail
//! wholesale, such as parsing a snapshot from raw JSON.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed server snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
