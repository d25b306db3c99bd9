//! Inventory item identity and category classification.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single marketable inventory entry after the asset/description join.
///
/// Identity is the `market_hash_name`; items are shared across users and
/// deduplicated by that canonical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Canonical marketplace name, unique per item kind.
    pub market_hash_name: CompactString,
    /// Localized display name.
    pub name: CompactString,
    /// Type line from the description (e.g. "Covert Sniper Rifle").
    pub type_line: CompactString,
    /// Icon path fragment for the community CDN.
    pub icon_url: String,
    /// Number of identical assets held.
    pub amount: u32,
    /// Inferred category.
    pub category: Category,
}

impl InventoryItem {
    /// Full CDN link for the item icon.
    pub fn icon_link(&self) -> String {
        if self.icon_url.is_empty() {
            return String::new();
        }
        format!(
            "https://community.cloudflare.steamstatic.com/economy/image/{}",
            self.icon_url
        )
    }
}

/// Coarse item category inferred from name/type heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Knife,
    Pistol,
    Rifle,
    Smg,
    Heavy,
    Sticker,
    Case,
    Graffiti,
    Agent,
    Other,
}

const PISTOLS: &[&str] = &[
    "Glock-18",
    "USP-S",
    "P2000",
    "P250",
    "Five-SeveN",
    "Tec-9",
    "CZ75-Auto",
    "Dual Berettas",
    "Desert Eagle",
    "R8 Revolver",
];

const RIFLES: &[&str] = &[
    "AK-47", "M4A4", "M4A1-S", "AUG", "SG 553", "FAMAS", "Galil AR", "AWP", "SSG 08", "SCAR-20",
    "G3SG1",
];

const SMGS: &[&str] = &["MP9", "MAC-10", "MP7", "MP5-SD", "UMP-45", "P90", "PP-Bizon"];

const HEAVY: &[&str] = &["Nova", "XM1014", "Sawed-Off", "MAG-7", "M249", "Negev"];

impl Category {
    /// All categories, in menu order.
    pub const ALL: [Category; 10] = [
        Category::Knife,
        Category::Pistol,
        Category::Rifle,
        Category::Smg,
        Category::Heavy,
        Category::Sticker,
        Category::Case,
        Category::Graffiti,
        Category::Agent,
        Category::Other,
    ];

    /// Infer a category from the display name and the description type line.
    ///
    /// Shallow string heuristics: the type line wins where it is specific,
    /// then the weapon family before the " | " separator is matched against
    /// known family lists.
    pub fn classify(name: &str, type_line: &str) -> Self {
        if type_line.contains("Sticker") || name.starts_with("Sticker |") {
            return Category::Sticker;
        }
        if type_line.contains("Graffiti") || name.contains("Graffiti") {
            return Category::Graffiti;
        }
        if type_line.contains("Container") || name.ends_with("Case") {
            return Category::Case;
        }
        if type_line.contains("Knife") || name.starts_with('★') {
            return Category::Knife;
        }
        if type_line.contains("Agent") {
            return Category::Agent;
        }

        let family = name.split(" | ").next().unwrap_or(name).trim();
        let family = family.trim_start_matches("StatTrak™ ").trim_start_matches("Souvenir ");

        if PISTOLS.contains(&family) || type_line.contains("Pistol") {
            return Category::Pistol;
        }
        if RIFLES.contains(&family) || type_line.contains("Rifle") {
            return Category::Rifle;
        }
        if SMGS.contains(&family) || type_line.contains("SMG") {
            return Category::Smg;
        }
        if HEAVY.contains(&family)
            || type_line.contains("Shotgun")
            || type_line.contains("Machinegun")
        {
            return Category::Heavy;
        }

        Category::Other
    }

    /// Stable label used in the database and callback data.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Knife => "Knives",
            Category::Pistol => "Pistols",
            Category::Rifle => "Rifles",
            Category::Smg => "SMGs",
            Category::Heavy => "Heavy",
            Category::Sticker => "Stickers",
            Category::Case => "Cases",
            Category::Graffiti => "Graffiti",
            Category::Agent => "Agents",
            Category::Other => "Other",
        }
    }

    /// Inverse of [`Category::label`].
    pub fn from_label(label: &str) -> Option<Self> {
        Category::ALL.iter().copied().find(|c| c.label() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_sticker() {
        assert_eq!(
            Category::classify("Sticker | Crown (Foil)", "Sticker"),
            Category::Sticker
        );
    }

    #[test]
    fn test_classify_case() {
        assert_eq!(
            Category::classify("Revolution Case", "Base Grade Container"),
            Category::Case
        );
    }

    #[test]
    fn test_classify_graffiti() {
        assert_eq!(
            Category::classify("Sealed Graffiti | Lambda (Violent Violet)", "Base Grade Graffiti"),
            Category::Graffiti
        );
    }

    #[test]
    fn test_classify_knife_by_star() {
        assert_eq!(
            Category::classify("★ Karambit | Doppler", "Covert Knife"),
            Category::Knife
        );
        // Star prefix alone is enough
        assert_eq!(Category::classify("★ Bayonet", ""), Category::Knife);
    }

    #[test]
    fn test_classify_weapon_families() {
        assert_eq!(
            Category::classify("AK-47 | Redline", "Classified Rifle"),
            Category::Rifle
        );
        assert_eq!(
            Category::classify("Glock-18 | Fade", "Restricted Pistol"),
            Category::Pistol
        );
        assert_eq!(Category::classify("P90 | Asiimov", ""), Category::Smg);
        assert_eq!(Category::classify("Nova | Hyper Beast", ""), Category::Heavy);
    }

    #[test]
    fn test_classify_stattrak_prefix() {
        assert_eq!(
            Category::classify("StatTrak™ AWP | Asiimov", ""),
            Category::Rifle
        );
    }

    #[test]
    fn test_classify_sniper_rifle_type_line() {
        // "Sniper Rifle" in the type line still lands in Rifle
        assert_eq!(
            Category::classify("Unknown Gun | Skin", "Covert Sniper Rifle"),
            Category::Rifle
        );
    }

    #[test]
    fn test_classify_agent() {
        assert_eq!(
            Category::classify("Sir Bloody Miami Darryl | The Professionals", "Master Agent"),
            Category::Agent
        );
    }

    #[test]
    fn test_classify_fallback() {
        assert_eq!(
            Category::classify("Music Kit | Some Artist", "Music Kit"),
            Category::Other
        );
    }

    #[test]
    fn test_label_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("Nonsense"), None);
    }

    #[test]
    fn test_icon_link() {
        let item = InventoryItem {
            market_hash_name: "AK-47 | Redline (Field-Tested)".into(),
            name: "AK-47 | Redline".into(),
            type_line: "Classified Rifle".into(),
            icon_url: "abc123".to_string(),
            amount: 1,
            category: Category::Rifle,
        };
        assert_eq!(
            item.icon_link(),
            "https://community.cloudflare.steamstatic.com/economy/image/abc123"
        );

        let bare = InventoryItem {
            icon_url: String::new(),
            ..item
        };
        assert_eq!(bare.icon_link(), "");
    }
}
