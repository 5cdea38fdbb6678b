//! Usage database client.
//!
//! This crate provides:
//! - A thin PostgREST client over the usage database
//! - The credit ledger: balance checks and the atomic deduct-and-record
//!   operation backed by a stored procedure
//! - The usage recorder: insert and partial amendment of usage rows

pub mod client;
pub mod credits;
pub mod error;
pub mod usage;

pub use client::{SupabaseClient, SupabaseConfig};
pub use credits::{CreditCheck, CreditLedger};
pub use error::{LedgerError, LedgerResult};
pub use usage::UsageRecorder;
