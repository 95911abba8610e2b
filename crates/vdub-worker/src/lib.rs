//! Dubbing workflow orchestrator.
//!
//! This crate provides:
//! - The single-flight job state machine ([`Orchestrator`])
//! - Sequential segment dubbing with bounded retry ([`SegmentTransformer`])
//! - Shared status with fan-out to observers ([`StatusBroadcaster`])
//! - Worker configuration, job logging and metrics

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod transformer;

pub use broadcaster::{StatusBroadcaster, StatusSubscription};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::{JobHandle, Orchestrator, RunningJob};
pub use transformer::SegmentTransformer;
