//! Steam inventory fetching.
//!
//! Pages through the community inventory endpoint and joins asset records
//! to description records by the classid/instanceid composite key. If the
//! primary endpoint returns no assets at all, the legacy mirror endpoint
//! is tried once before giving up.

use crate::error::SteamError;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracker_core::{Category, InventoryItem, SteamId};
use tracing::{debug, warn};

/// Browser-like User-Agent; the community endpoints reject the default one.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct SteamClientConfig {
    /// Game whose inventory is fetched (730 = CS2).
    pub app_id: u32,
    /// Inventory context (2 = the default community context).
    pub context_id: u32,
    /// Page size for the inventory endpoint.
    pub page_size: u32,
    /// Fixed sleep between inventory pages.
    pub page_delay: Duration,
}

impl Default for SteamClientConfig {
    fn default() -> Self {
        Self {
            app_id: 730,
            context_id: 2,
            page_size: 2000,
            page_delay: Duration::from_secs(1),
        }
    }
}

/// Shared HTTP client for the community endpoints.
#[derive(Clone)]
pub struct SteamClient {
    http: reqwest::Client,
    config: SteamClientConfig,
}

#[derive(Debug, Deserialize)]
struct InventoryResponse {
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    descriptions: Vec<Description>,
    #[serde(default)]
    more_items: Option<u8>,
    #[serde(default)]
    last_assetid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    classid: String,
    instanceid: String,
}

#[derive(Debug, Deserialize)]
struct Description {
    classid: String,
    instanceid: String,
    #[serde(default)]
    market_hash_name: Option<String>,
    #[serde(default)]
    market_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    type_line: Option<String>,
    #[serde(default)]
    icon_url: Option<String>,
    #[serde(default)]
    marketable: u8,
}

/// Legacy mirror payload: maps keyed by asset id / composite key instead
/// of flat arrays.
#[derive(Debug, Deserialize)]
struct LegacyInventoryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default, rename = "rgInventory")]
    inventory: HashMap<String, LegacyAsset>,
    #[serde(default, rename = "rgDescriptions")]
    descriptions: HashMap<String, Description>,
}

#[derive(Debug, Deserialize)]
struct LegacyAsset {
    classid: String,
    instanceid: String,
}

impl SteamClient {
    pub fn new(config: SteamClientConfig) -> Result<Self, SteamError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { http, config })
    }

    /// The underlying HTTP client, shared with the market and resolve calls.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn app_id(&self) -> u32 {
        self.config.app_id
    }

    /// Fetch the full marketable inventory for a profile.
    pub async fn fetch_inventory(
        &self,
        steam_id: SteamId,
    ) -> Result<Vec<InventoryItem>, SteamError> {
        let mut assets: Vec<Asset> = Vec::new();
        let mut descriptions: Vec<Description> = Vec::new();
        let mut start_assetid: Option<String> = None;

        loop {
            let url = format!(
                "https://steamcommunity.com/inventory/{}/{}/{}",
                steam_id, self.config.app_id, self.config.context_id
            );
            let mut request = self.http.get(&url).query(&[
                ("l", "english".to_string()),
                ("count", self.config.page_size.to_string()),
            ]);
            if let Some(ref cursor) = start_assetid {
                request = request.query(&[("start_assetid", cursor.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(SteamError::from_status(response.status()));
            }
            let page: InventoryResponse = response.json().await?;

            let more = page.more_items == Some(1);
            let cursor = page.last_assetid.clone();
            debug!(
                assets = page.assets.len(),
                descriptions = page.descriptions.len(),
                more,
                "Fetched inventory page"
            );
            assets.extend(page.assets);
            descriptions.extend(page.descriptions);

            if !more {
                break;
            }
            match cursor {
                Some(c) => start_assetid = Some(c),
                None => break,
            }
            tokio::time::sleep(self.config.page_delay).await;
        }

        if assets.is_empty() {
            warn!(steam_id = %steam_id, "Primary inventory endpoint empty, trying mirror");
            return self.fetch_inventory_mirror(steam_id).await;
        }

        Ok(join_inventory(assets, descriptions))
    }

    async fn fetch_inventory_mirror(
        &self,
        steam_id: SteamId,
    ) -> Result<Vec<InventoryItem>, SteamError> {
        let url = format!(
            "https://steamcommunity.com/profiles/{}/inventory/json/{}/{}",
            steam_id, self.config.app_id, self.config.context_id
        );

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SteamError::from_status(response.status()));
        }
        let body: LegacyInventoryResponse = response.json().await?;
        if !body.success {
            return Ok(Vec::new());
        }

        let assets = body
            .inventory
            .into_values()
            .map(|a| Asset {
                classid: a.classid,
                instanceid: a.instanceid,
            })
            .collect();
        let descriptions = body.descriptions.into_values().collect();

        Ok(join_inventory(assets, descriptions))
    }
}

/// Join assets to descriptions by the composite classid/instanceid key,
/// keep only marketable entries, and aggregate duplicate assets into a
/// per-item amount. Assets without a matching description are dropped.
fn join_inventory(assets: Vec<Asset>, descriptions: Vec<Description>) -> Vec<InventoryItem> {
    let mut by_key: HashMap<String, &Description> = HashMap::new();
    for desc in &descriptions {
        by_key.insert(format!("{}_{}", desc.classid, desc.instanceid), desc);
    }

    let mut items: Vec<InventoryItem> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for asset in &assets {
        let key = format!("{}_{}", asset.classid, asset.instanceid);
        let Some(desc) = by_key.get(key.as_str()) else {
            continue;
        };
        if desc.marketable != 1 {
            continue;
        }
        let Some(hash_name) = desc.market_hash_name.clone() else {
            continue;
        };

        if let Some(&pos) = index.get(&hash_name) {
            items[pos].amount += 1;
            continue;
        }

        let name = desc
            .market_name
            .clone()
            .or_else(|| desc.name.clone())
            .unwrap_or_else(|| hash_name.clone());
        let type_line = desc.type_line.clone().unwrap_or_default();
        let category = Category::classify(&name, &type_line);

        index.insert(hash_name.clone(), items.len());
        items.push(InventoryItem {
            market_hash_name: hash_name.into(),
            name: name.into(),
            type_line: type_line.into(),
            icon_url: desc.icon_url.clone().unwrap_or_default(),
            amount: 1,
            category,
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn asset(classid: &str, instanceid: &str) -> Asset {
        Asset {
            classid: classid.to_string(),
            instanceid: instanceid.to_string(),
        }
    }

    fn description(classid: &str, instanceid: &str, hash_name: &str, marketable: u8) -> Description {
        Description {
            classid: classid.to_string(),
            instanceid: instanceid.to_string(),
            market_hash_name: Some(hash_name.to_string()),
            market_name: Some(hash_name.to_string()),
            name: None,
            type_line: Some("Classified Rifle".to_string()),
            icon_url: Some("icon".to_string()),
            marketable,
        }
    }

    #[test]
    fn test_join_keeps_only_marketable() {
        let assets = vec![asset("1", "0"), asset("2", "0")];
        let descriptions = vec![
            description("1", "0", "AK-47 | Redline (Field-Tested)", 1),
            description("2", "0", "Untradable Thing", 0),
        ];

        let items = join_inventory(assets, descriptions);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].market_hash_name, "AK-47 | Redline (Field-Tested)");
    }

    #[test]
    fn test_join_aggregates_duplicates() {
        let assets = vec![asset("1", "0"), asset("1", "0"), asset("1", "0")];
        let descriptions = vec![description("1", "0", "Revolution Case", 1)];

        let items = join_inventory(assets, descriptions);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, 3);
    }

    #[test]
    fn test_join_drops_orphan_assets() {
        let assets = vec![asset("1", "0"), asset("9", "9")];
        let descriptions = vec![description("1", "0", "AWP | Asiimov (Field-Tested)", 1)];

        let items = join_inventory(assets, descriptions);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_join_requires_hash_name() {
        let assets = vec![asset("1", "0")];
        let mut desc = description("1", "0", "", 1);
        desc.market_hash_name = None;
        let items = join_inventory(assets, vec![desc]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_join_distinguishes_instanceid() {
        // Same classid, different instanceid: separate composite keys
        let assets = vec![asset("1", "0"), asset("1", "7")];
        let descriptions = vec![
            description("1", "0", "P250 | Sand Dune (Field-Tested)", 1),
            description("1", "7", "P250 | Sand Dune (Souvenir)", 1),
        ];

        let items = join_inventory(assets, descriptions);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_inventory_response_parses() {
        let raw = r#"{
            "assets": [{"appid": 730, "classid": "310776", "instanceid": "302028390", "assetid": "1", "amount": "1"}],
            "descriptions": [{
                "classid": "310776",
                "instanceid": "302028390",
                "market_hash_name": "AK-47 | Redline (Field-Tested)",
                "market_name": "AK-47 | Redline (Field-Tested)",
                "type": "Classified Rifle",
                "icon_url": "fWFc82js0fmoRAP-qOIPu5THSWqfSmTELLqcUywGkijVjZULUrsm1j-9xgEYbgoPTfH",
                "marketable": 1
            }],
            "total_inventory_count": 1,
            "success": 1
        }"#;

        let parsed: InventoryResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.assets.len(), 1);
        assert_eq!(parsed.more_items, None);
        let items = join_inventory(parsed.assets, parsed.descriptions);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].category, Category::Rifle);
    }

    #[test]
    fn test_legacy_response_parses() {
        let raw = r#"{
            "success": true,
            "rgInventory": {
                "123456": {"id": "123456", "classid": "310776", "instanceid": "0", "amount": "1"}
            },
            "rgDescriptions": {
                "310776_0": {
                    "classid": "310776",
                    "instanceid": "0",
                    "market_hash_name": "Glock-18 | Fade (Factory New)",
                    "type": "Restricted Pistol",
                    "icon_url": "xyz",
                    "marketable": 1
                }
            }
        }"#;

        let parsed: LegacyInventoryResponse = serde_json::from_str(raw).expect("parse");
        assert!(parsed.success);
        assert_eq!(parsed.inventory.len(), 1);
        assert_eq!(parsed.descriptions.len(), 1);
    }

    #[test]
    fn test_client_config_default() {
        let config = SteamClientConfig::default();
        assert_eq!(config.app_id, 730);
        assert_eq!(config.context_id, 2);
        assert_eq!(config.page_size, 2000);
    }
}
