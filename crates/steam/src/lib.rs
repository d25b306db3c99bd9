//! REST client for the Steam community endpoints.
//!
//! This crate provides:
//! - Paginated inventory fetching with the asset/description join
//! - Market price-overview lookups
//! - Vanity URL resolution via the profile XML view

pub mod client;
pub mod error;
pub mod market;
pub mod resolve;

pub use client::{SteamClient, SteamClientConfig};
pub use error::SteamError;
