//! CLI command implementations.

pub mod dump;
pub mod keys;
pub mod serve;
