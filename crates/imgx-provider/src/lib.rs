//! Inference provider client.
//!
//! This crate provides:
//! - Job submission against the provider's predictions API
//! - Status fetching with wire payloads validated at the boundary
//! - A cancellable polling loop that drives a job to a terminal state

pub mod client;
pub mod error;
pub mod poller;
pub mod types;

pub use client::{ProviderClient, ProviderConfig};
pub use error::{PollError, ProviderError, ProviderResult};
pub use poller::{JobPoller, PollerConfig};
pub use types::SubmitRequest;
