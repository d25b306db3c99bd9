//! Steam profile identity parsing.
//!
//! Free-text input is accepted in exactly three shapes: a raw SteamID64,
//! a `/profiles/<id>` URL, or a `/id/<alias>` vanity URL. Everything else
//! is rejected. Vanity aliases still need a network round-trip to resolve;
//! that lives in the `tracker-steam` crate.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// 64-bit Steam account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SteamId(pub u64);

impl SteamId {
    /// Parse from a decimal digit string.
    /// Public-universe IDs are 17 digits starting with 7656.
    pub fn parse(digits: &str) -> Option<Self> {
        if digits.len() != 17 || !digits.starts_with("7656") {
            return None;
        }
        digits.parse().ok().map(SteamId)
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parsed shape of free-text profile input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileRef {
    /// Numeric ID, usable directly.
    Id64(SteamId),
    /// Human-chosen alias, requires resolution.
    Vanity(String),
}

fn profiles_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/profiles/(\d+)$").expect("static regex"))
}

fn vanity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/id/([A-Za-z0-9_-]+)$").expect("static regex"))
}

impl ProfileRef {
    /// Parse user input into one of the accepted shapes, or `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim().trim_end_matches('/');

        if let Some(id) = SteamId::parse(input) {
            return Some(ProfileRef::Id64(id));
        }

        if input.contains("/profiles/") {
            let caps = profiles_re().captures(input)?;
            return SteamId::parse(&caps[1]).map(ProfileRef::Id64);
        }

        if input.contains("/id/") {
            let caps = vanity_re().captures(input)?;
            return Some(ProfileRef::Vanity(caps[1].to_string()));
        }

        None
    }
}
