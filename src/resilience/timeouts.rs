//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every external call (probe, RPC, advisory, command) with a deadline
//! - Keep timeout errors distinct from other failures
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - In-flight calls are waited out to their deadline, never force-cancelled early

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The wrapped call did not complete in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline of {0:?} exceeded")]
pub struct DeadlineExceeded(pub Duration);

/// Await `fut` for at most `limit`.
pub async fn with_deadline<F: Future>(limit: Duration, fut: F) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DeadlineExceeded(limit))
}
