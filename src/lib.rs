//! Response caching for the book catalog service.
//!
//! - [`cache`]: two-tier store (shared Redis + bounded local map)
//! - [`coalesce`]: single-flight execution of expensive computations
//! - [`fingerprint`]: content fingerprints and conditional GET helpers

pub mod cache;
pub mod coalesce;
pub mod commands;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod infra;
