//! Client SDK for the Subasta30 vehicle-auction marketplace API
//!
//! This crate packages the non-presentation layers of the auction web
//! client: the authenticated API gateway with response normalization,
//! caching and retry, the auth session with its proactive refresh timer,
//! the bidding calculator, the dynamic category/field engine, the
//! document and image managers, and the search/filter composer.
//!
//! All failures surface as [`error::ApiError`] values; nothing here panics
//! past the gateway boundary. Time and persistent state are injected
//! through the `common` crate's [`common::clock::Clock`] and
//! [`common::storage::KeyValueStore`] abstractions so every expiry and
//! history computation is deterministic under test.

pub mod auth;
pub mod bidding;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod fields;
pub mod files;
pub mod gateway;
pub mod models;
pub mod search;
pub mod subastas;
pub mod validation;

pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
