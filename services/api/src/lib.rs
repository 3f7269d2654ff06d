//! services/api/src/lib.rs
//!
//! Library root for the `api` service, re-exported for the binaries and the
//! integration tests.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
