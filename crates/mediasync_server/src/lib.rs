//! # MediaSync Server
//!
//! Multi-tenant key-value sync gateway for MediaSync.
//!
//! This crate provides:
//! - HTTP endpoints for reading, replacing and pruning per-key lists
//! - Two-tier shared-secret authorization (read and write)
//! - Prefix allow-listing so many tenants can share one store
//! - Record validation and `saved_at` normalization on write
//! - CORS headers on every response
//!
//! # Architecture
//!
//! The gateway keeps no state of its own. Each key maps to one JSON list in
//! a [`KvStore`](mediasync_storage::KvStore); a write replaces the whole
//! list. Clients merge before writing.
//!
//! # Example
//!
//! ```rust,no_run
//! use mediasync_server::{GatewayConfig, SyncGateway};
//! use mediasync_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> mediasync_server::GatewayResult<()> {
//! let config = GatewayConfig::from_env()?;
//! let gateway = SyncGateway::bind(config, Some(Arc::new(InMemoryStore::new()))).await?;
//! println!("listening on {}", gateway.local_addr());
//! gateway.serve().await
//! # }
//! ```
//!
//! # Protocol
//!
//! - `GET ?keys=a,b` reads up to 25 lists
//! - `POST {key: [records]}` replaces lists
//! - `DELETE {purgeKey}` removes one key
//! - `DELETE {url, keys}` removes a record by URL from up to 25 lists
//! - `OPTIONS` answers CORS preflight

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod http;
mod server;

pub use auth::{secure_compare, Credentials, ReadGrant, WriteGrant};
pub use config::{
    GatewayConfig, Secret, DEFAULT_ALLOWED_ORIGIN, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_ITEMS,
};
pub use error::{GatewayError, GatewayResult};
pub use handler::{Gateway, WriteSummary};
pub use http::router;
pub use server::{GatewayHandle, SyncGateway};
