//! # MediaSync Protocol
//!
//! Storage contract types for the MediaSync gateway and its clients.
//!
//! This crate provides:
//! - Record validation and `saved_at` normalization
//! - The key prefix allow-list that isolates tenants sharing one store
//! - Request body shapes for write and delete operations
//! - Status and error bodies returned by the gateway
//! - Client-side merge policies for list-shaped records keyed by URL
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Wire contract
//!
//! | Method | Body | Response |
//! |--------|------|----------|
//! | `GET ?keys=a,b` | none | `{ "a": [...], "b": [...] }` |
//! | `POST` | `{ "a": [...] }` | `{ "status": "ok" }` |
//! | `DELETE` | `{ "purgeKey": "a" }` | `{ "status": "key_deleted", "key": "a" }` |
//! | `DELETE` | `{ "url": "...", "keys": [...] }` | `{ "status": "single_deleted_dynamically" }` |

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod merge;
mod messages;
mod namespace;
mod record;

pub use error::{ProtocolError, ProtocolResult};
pub use merge::{better_poster, better_title, merge_records, normalize_url, MergePolicy};
pub use messages::{error_codes, DeleteRequest, ErrorBody, StatusBody, WriteBody};
pub use namespace::{parse_key_list, KeyPolicy, DEFAULT_PREFIXES, MAX_KEYS_PER_REQUEST};
pub use record::{normalize_saved_at, sanitize_list, sanitize_record, Record};

/// Name of the request header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Name of the query parameter listing the keys to read.
pub const KEYS_QUERY_PARAM: &str = "keys";
