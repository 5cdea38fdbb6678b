//! Shared data models for the Imgx backend.
//!
//! This crate provides Serde-serializable types for:
//! - Transformation jobs and their lifecycle status
//! - The service catalog (upscale, colorize, generate)
//! - Usage ledger records and partial amendments
//! - Workflow requests and progress events

pub mod job;
pub mod progress;
pub mod request;
pub mod service;
pub mod usage;

// Re-export common types
pub use job::{Job, JobId, JobStatus};
pub use progress::ProgressEvent;
pub use request::{RequestValidationError, TransformRequest};
pub use service::ServiceKind;
pub use usage::{NewUsageRecord, UsageAmendment, UsageRecord};
