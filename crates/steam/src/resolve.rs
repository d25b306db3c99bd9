//! Vanity profile resolution.
//!
//! A vanity alias needs a profile-XML fetch to obtain the numeric ID; when
//! the XML view comes back without one, the HTML page embeds the same ID in
//! a script blob.

use crate::client::SteamClient;
use crate::error::SteamError;
use regex::Regex;
use std::sync::OnceLock;
use tracker_core::{ProfileRef, SteamId};
use tracing::debug;

fn xml_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<steamID64>(\d+)</steamID64>").expect("static regex"))
}

fn html_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""steamid":"(\d+)""#).expect("static regex"))
}

fn extract_xml_id(xml: &str) -> Option<SteamId> {
    xml_id_re()
        .captures(xml)
        .and_then(|caps| SteamId::parse(&caps[1]))
}

fn extract_html_id(html: &str) -> Option<SteamId> {
    html_id_re()
        .captures(html)
        .and_then(|caps| SteamId::parse(&caps[1]))
}

impl SteamClient {
    /// Resolve a parsed profile reference to a numeric ID.
    /// Unresolvable vanity names yield `Ok(None)`.
    pub async fn resolve(&self, profile: &ProfileRef) -> Result<Option<SteamId>, SteamError> {
        match profile {
            ProfileRef::Id64(id) => Ok(Some(*id)),
            ProfileRef::Vanity(alias) => self.resolve_vanity(alias).await,
        }
    }

    async fn resolve_vanity(&self, alias: &str) -> Result<Option<SteamId>, SteamError> {
        let url = format!("https://steamcommunity.com/id/{alias}");

        // The XML view carries the ID verbatim
        let xml = self
            .http()
            .get(&url)
            .query(&[("xml", "1")])
            .send()
            .await?
            .text()
            .await?;
        if let Some(id) = extract_xml_id(&xml) {
            return Ok(Some(id));
        }

        debug!(alias, "XML view had no steamID64, falling back to HTML");
        let html = self.http().get(&url).send().await?.text().await?;
        Ok(extract_html_id(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_xml_id() {
        let xml = r#"<?xml version="1.0"?>
<profile>
  <steamID64>76561198012345678</steamID64>
  <steamID><![CDATA[gaben]]></steamID>
</profile>"#;
        assert_eq!(extract_xml_id(xml), Some(SteamId(76561198012345678)));
    }

    #[test]
    fn test_extract_xml_id_missing() {
        assert_eq!(extract_xml_id("<profile></profile>"), None);
        assert_eq!(extract_xml_id(""), None);
    }

    #[test]
    fn test_extract_xml_id_rejects_bad_digits() {
        // Matching tag but not a valid SteamID64
        assert_eq!(extract_xml_id("<steamID64>123</steamID64>"), None);
    }

    #[test]
    fn test_extract_html_id() {
        let html = r#"<script>g_rgProfileData = {"url":"...","steamid":"76561198012345678","personaname":"gaben"};</script>"#;
        assert_eq!(extract_html_id(html), Some(SteamId(76561198012345678)));
    }

    #[test]
    fn test_extract_html_id_missing() {
        assert_eq!(extract_html_id("<html></html>"), None);
    }
}
