//! Shared wire types for sigrelay.
//!
//! - [`objects`]: request and response bodies of the HTTP API
//! - [`signature`]: HMAC-SHA256 webhook signature primitives

#![forbid(unsafe_code)]

pub mod objects;
pub mod signature;
