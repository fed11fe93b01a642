//! Data Models
//! Item / ItemImage rows, draft DTOs, analysis suggestion, cart entry

use serde::{Deserialize, Serialize};

// ========================================
// Condition
// ========================================

/// Item condition scale used across drafts, persisted items and analysis output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    New,
    #[serde(rename = "Like New")]
    LikeNew,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
}

impl Condition {
    /// Map a free-form value (e.g. from the vision model) onto the enum.
    /// Unknown values return `None` and are left for manual entry.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "new" => Some(Condition::New),
            "like new" | "like-new" => Some(Condition::LikeNew),
            "very good" | "very-good" => Some(Condition::VeryGood),
            "good" => Some(Condition::Good),
            "fair" => Some(Condition::Fair),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "New",
            Condition::LikeNew => "Like New",
            Condition::VeryGood => "Very Good",
            Condition::Good => "Good",
            Condition::Fair => "Fair",
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::New
    }
}

// ========================================
// Item Status
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Available,
    LowStock,
    OutOfStock,
}

impl ItemStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(ItemStatus::Available),
            "low_stock" => Some(ItemStatus::LowStock),
            "out_of_stock" => Some(ItemStatus::OutOfStock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::LowStock => "low_stock",
            ItemStatus::OutOfStock => "out_of_stock",
        }
    }
}

// ========================================
// Item
// ========================================

/// Item (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub item_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub subcategory1: Option<String>,
    pub subcategory2: Option<String>,
    pub condition: String,
    pub size: Option<String>,
    pub status: String,
    pub available_in_store: i32,
    pub list_on_paperclip: i32,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// Item image link (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ItemImage {
    pub image_id: String,
    pub item_id: String,
    pub image_url: String,
    pub display_order: i64,
    pub created_at_ms: i64,
}

/// Item response (API)
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub item_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub subcategory1: Option<String>,
    pub subcategory2: Option<String>,
    pub condition: String,
    pub size: Option<String>,
    pub status: String,
    pub available_in_store: bool,
    pub list_on_paperclip: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub images: Vec<String>,
}

impl ItemResponse {
    /// Images must already be sorted by display_order.
    pub fn from_item(item: &Item, images: &[ItemImage]) -> Self {
        Self {
            item_id: item.item_id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            price: item.price,
            category: item.category.clone(),
            subcategory1: item.subcategory1.clone(),
            subcategory2: item.subcategory2.clone(),
            condition: item.condition.clone(),
            size: item.size.clone(),
            status: item.status.clone(),
            available_in_store: item.available_in_store == 1,
            list_on_paperclip: item.list_on_paperclip == 1,
            created_at_ms: item.created_at_ms,
            updated_at_ms: item.updated_at_ms,
            images: images.iter().map(|i| i.image_url.clone()).collect(),
        }
    }
}

// ========================================
// Draft Item
// ========================================

/// The in-progress, unsaved listing being composed by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftItem {
    pub name: String,
    pub description: String,
    /// Decimal string, parsed on submit.
    pub price: String,
    pub category: String,
    pub subcategory1: String,
    pub subcategory2: String,
    pub condition: Option<Condition>,
    pub size: Option<String>,
    pub available_in_store: bool,
    pub list_on_paperclip: bool,
}

impl DraftItem {
    pub fn empty() -> Self {
        Self {
            available_in_store: true,
            list_on_paperclip: true,
            ..Default::default()
        }
    }
}

/// Partial manual edit of a draft; absent fields stay untouched.
#[derive(Debug, Default, Deserialize)]
pub struct DraftPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub subcategory1: Option<String>,
    pub subcategory2: Option<String>,
    pub condition: Option<Condition>,
    pub size: Option<String>,
    pub available_in_store: Option<bool>,
    pub list_on_paperclip: Option<bool>,
}

// ========================================
// Listing Suggestion
// ========================================

/// Structured result proposed by the vision model for one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSuggestion {
    pub title: String,
    pub description: String,
    pub price_avg: f64,
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

// ========================================
// Cart
// ========================================

/// Cart entry (in-memory, POS session)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
    pub item_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    pub image: Option<String>,
    pub category: String,
    pub stock: String,
}

// ========================================
// Category taxonomy
// ========================================

/// Category path (DB row); level2/level3 empty at the shallower levels.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryPath {
    pub level1: String,
    pub level2: String,
    pub level3: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_parse_known_values() {
        assert_eq!(Condition::parse("New"), Some(Condition::New));
        assert_eq!(Condition::parse("like new"), Some(Condition::LikeNew));
        assert_eq!(Condition::parse(" Very Good "), Some(Condition::VeryGood));
        assert_eq!(Condition::parse("GOOD"), Some(Condition::Good));
        assert_eq!(Condition::parse("fair"), Some(Condition::Fair));
    }

    #[test]
    fn condition_parse_unknown_is_none() {
        assert_eq!(Condition::parse("Mint"), None);
        assert_eq!(Condition::parse(""), None);
        assert_eq!(Condition::parse("used"), None);
    }

    #[test]
    fn item_status_round_trip() {
        for s in ["available", "low_stock", "out_of_stock"] {
            assert_eq!(ItemStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(ItemStatus::parse("sold").is_none());
    }

    #[test]
    fn empty_draft_defaults_flags_on() {
        let d = DraftItem::empty();
        assert!(d.available_in_store);
        assert!(d.list_on_paperclip);
        assert!(d.name.is_empty());
        assert!(d.condition.is_none());
    }
}
