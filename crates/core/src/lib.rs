//! Shared types for the broadcast-lifecycle orchestrator.
//!
//! This crate has no knowledge of AWS, YouTube's wire formats, or any other
//! concrete backend. It defines the domain model (§3), the narrow
//! capability traits every control loop and worker depends on instead of a
//! concrete backend (§9), the error taxonomy (§7), and small ambient
//! helpers (config loading, tracing setup) shared by every binary.

pub mod capability;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use error::{OrchestratorError, Result};
