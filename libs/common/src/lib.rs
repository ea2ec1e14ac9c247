//! Common library for the Subasta client SDK
//!
//! This crate provides the shared infrastructure used by the client crate:
//! the key-value storage abstraction that stands in for browser local
//! storage, the clock abstraction that keeps every expiry computation
//! testable, and the TTL cache for GET responses.

pub mod cache;
pub mod clock;
pub mod storage;
