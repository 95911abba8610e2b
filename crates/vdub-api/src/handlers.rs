//! Request handlers.

pub mod files;
pub mod health;
pub mod workflow;

pub use files::*;
pub use health::*;
pub use workflow::*;
