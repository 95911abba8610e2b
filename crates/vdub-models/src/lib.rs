//! Shared data models for the VDub dubbing workflow.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their lifecycle state
//! - Segments and per-segment transform results
//! - Status snapshots broadcast to observers
//! - WebSocket message schemas

pub mod job;
pub mod segment;
pub mod status;
pub mod ws;

// Re-export common types
pub use job::{Job, JobId, JobState, TransitionError};
pub use segment::{Segment, TransformResult};
pub use status::{Phase, StatusKind, StatusSnapshot, StatusUpdate};
pub use ws::{ClientAction, ClientActionError, ServerMessage, StatusEvent, WorkflowResult};
