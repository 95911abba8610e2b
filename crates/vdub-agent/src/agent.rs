//! The transformation-agent seam.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::AgentResult;
use crate::types::DubRequest;

/// A service that turns one segment into one dubbed segment.
///
/// Implementations hold one exclusive session; callers must not issue
/// concurrent `dub` calls.
#[async_trait]
pub trait DubbingAgent: Send + Sync {
    /// Establish the session. Idempotent once it succeeds.
    async fn authenticate(&self) -> AgentResult<()>;

    /// Whether a session is currently established.
    async fn is_authenticated(&self) -> bool;

    /// Dub `request.input` into `request.output`.
    ///
    /// Returns the path the agent reports having written. The caller is
    /// responsible for checking that the file exists and is non-empty.
    async fn dub(&self, request: &DubRequest) -> AgentResult<PathBuf>;

    /// Forget the session so the next job logs in again.
    async fn invalidate(&self) {}
}
