//! Durable artifact storage.
//!
//! This crate provides:
//! - A thin S3-compatible client (Cloudflare R2 or any S3 endpoint)
//! - The artifact store: fetch a transient source URL (remote or data:)
//!   and archive it under a stable, publicly resolvable name

pub mod artifacts;
pub mod client;
pub mod error;

pub use artifacts::ArtifactStore;
pub use client::{StorageClient, StorageConfig};
pub use error::{StorageError, StorageResult};
