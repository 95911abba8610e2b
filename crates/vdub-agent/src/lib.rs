//! Client for the external dubbing agent.
//!
//! The agent is a long-running browser-automation service that logs into
//! the dubbing website once per session and then turns one input video
//! into one dubbed output video per request. This crate provides:
//! - The [`DubbingAgent`] trait the worker drives
//! - [`HttpAgentClient`], its implementation over the agent's HTTP API

pub mod agent;
pub mod client;
pub mod error;
pub mod types;

pub use agent::DubbingAgent;
pub use client::{AgentConfig, HttpAgentClient};
pub use error::{AgentError, AgentResult};
pub use types::{DubRequest, DubResponse, SessionRequest, SessionResponse};
