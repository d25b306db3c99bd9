//! Error types for Steam API calls.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SteamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Steam profile or inventory is private")]
    PrivateProfile,
    #[error("Steam rate limit hit")]
    RateLimited,
    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl SteamError {
    /// Map a non-success HTTP status to the meaning the community API
    /// uses it for: 403 is a private profile, 429 a rate limit.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            403 => SteamError::PrivateProfile,
            429 => SteamError::RateLimited,
            other => SteamError::Parse(format!("HTTP {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_sentinels() {
        assert!(matches!(
            SteamError::from_status(reqwest::StatusCode::FORBIDDEN),
            SteamError::PrivateProfile
        ));
        assert!(matches!(
            SteamError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            SteamError::RateLimited
        ));
        assert!(matches!(
            SteamError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            SteamError::Parse(_)
        ));
    }
}
