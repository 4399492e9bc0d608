//! # MediaSync Client
//!
//! Reference client for the MediaSync gateway.
//!
//! This crate provides:
//! - Batched reads of per-key lists
//! - Fetch, merge and write-back cycles using the protocol merge policies
//! - Delete by URL, purge and clear
//! - Retry with exponential backoff on 429, 5xx and transport errors
//!
//! ## Key Invariants
//!
//! - The gateway never merges; the client always fetches before writing
//! - A write replaces a whole list, so a merge must include the cloud copy
//! - Keys ending in `_extra_field` keep the newest `saved_at`; all others
//!   keep the oldest

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;

pub use client::{Lists, SyncClient};
pub use config::{ClientConfig, RetryConfig};
pub use error::{ClientError, ClientResult};
