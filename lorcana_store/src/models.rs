//! Canonical record types persisted in the document files
//!
//! Every struct reads leniently so a hand-edited or restored document still
//! loads: missing fields take defaults, numbers may arrive as numeric
//! strings, and nulls read as empty. Writes always emit every field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Catalog card
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Card {
    #[serde(deserialize_with = "text")]
    pub id: String,
    #[serde(deserialize_with = "text")]
    pub full_name: String,
    #[serde(deserialize_with = "text")]
    pub name: String,
    #[serde(deserialize_with = "text")]
    pub set_code: String,
    #[serde(deserialize_with = "optional_text")]
    pub color: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub rarity: Option<String>,
    #[serde(deserialize_with = "optional_count")]
    pub cost: Option<u32>,
    #[serde(deserialize_with = "optional_count")]
    pub lore: Option<u32>,
    #[serde(deserialize_with = "or_default")]
    pub images: Map<String, Value>,
    #[serde(deserialize_with = "or_default")]
    pub external_links: Map<String, Value>,
    #[serde(deserialize_with = "or_default")]
    pub abilities: Vec<Value>,
    #[serde(deserialize_with = "or_default")]
    pub characteristics: Vec<Value>,
    #[serde(deserialize_with = "text")]
    pub created_at: String,
    #[serde(deserialize_with = "text")]
    pub updated_at: String,
}

/// Card as returned by the catalog: the stored record plus its joined price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogCard {
    #[serde(flatten)]
    pub card: Card,
    pub price: Option<PriceEntry>,
}

/// Card set (expansion)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardSet {
    #[serde(deserialize_with = "text")]
    pub id: String,
    #[serde(deserialize_with = "text")]
    pub code: String,
    #[serde(deserialize_with = "text")]
    pub name: String,
    #[serde(deserialize_with = "optional_text")]
    pub release_date: Option<String>,
    #[serde(deserialize_with = "count_or_zero")]
    pub card_count: u32,
    pub languages: Vec<String>,
    #[serde(deserialize_with = "text")]
    pub created_at: String,
    #[serde(deserialize_with = "text")]
    pub updated_at: String,
}

impl Default for CardSet {
    fn default() -> Self {
        Self {
            id: String::new(),
            code: String::new(),
            name: String::new(),
            release_date: None,
            card_count: 0,
            languages: vec![DEFAULT_LANGUAGE.to_string()],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

/// Locale assumed for sets that don't list any
pub const DEFAULT_LANGUAGE: &str = "fr";

/// Price of a single card, keyed by card id in [`Prices`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceEntry {
    #[serde(deserialize_with = "amount")]
    pub price: f64,
    #[serde(deserialize_with = "text")]
    pub currency: String,
    #[serde(deserialize_with = "text")]
    pub source: String,
    #[serde(deserialize_with = "text")]
    pub last_updated: String,
}

/// The prices document: card id -> price
pub type Prices = BTreeMap<String, PriceEntry>;

/// The metadata document: free-form bookkeeping merged on every update
pub type Metadata = Map<String, Value>;

/// User-defined collection of cards
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collection {
    #[serde(deserialize_with = "text")]
    pub id: String,
    #[serde(deserialize_with = "text")]
    pub name: String,
    #[serde(deserialize_with = "text")]
    pub description: String,
    pub cards: Vec<LineItem>,
    pub created_at: String,
    pub updated_at: String,
}

impl Collection {
    pub fn line_item(&self, card_id: &str) -> Option<&LineItem> {
        self.cards.iter().find(|item| item.card_id == card_id)
    }
}

/// One card entry inside a collection; at most one per `card_id`, quantity >= 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default, deserialize_with = "text")]
    pub card_id: String,
    #[serde(default = "single_copy", deserialize_with = "quantity")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "text")]
    pub added_at: String,
}

/// Input for creating a collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Fields of a collection that may be changed after creation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Summary figures for one collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    /// Distinct cards
    pub total_cards: usize,
    /// Sum of all quantities
    pub total_quantity: u64,
    pub last_updated: String,
    pub created_at: String,
}

/// Histograms and totals over the card catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_cards: usize,
    pub total_sets: usize,
    pub total_prices: usize,
    pub by_color: BTreeMap<String, usize>,
    pub by_rarity: BTreeMap<String, usize>,
    pub by_set: BTreeMap<String, usize>,
}

/// Current timestamp in the format written to every document (`2026-02-01T10:00:00.000Z`)
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ==================== Lenient field readers ====================

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

/// Strings as-is, numbers and booleans stringified, anything else absent
fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Non-negative integer from a number or numeric string
fn optional_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn count_or_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_count(deserializer)?.unwrap_or(0))
}

/// Line item quantities never read below one
fn quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_count(deserializer)?.map_or(1, |q| q.max(1)))
}

fn single_copy() -> u32 {
    1
}

/// Finite amount from a number or numeric string, 0 otherwise
fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(parsed.filter(|p: &f64| p.is_finite()).unwrap_or(0.0))
}

/// Container fields of the wrong JSON type read as empty
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_serializes_camel_case_with_nulls() {
        let card = Card {
            id: "card_1".to_string(),
            full_name: "Mickey Mouse - Brave Little Tailor".to_string(),
            name: "Mickey Mouse".to_string(),
            set_code: "TFC".to_string(),
            ..Card::default()
        };

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["fullName"], "Mickey Mouse - Brave Little Tailor");
        assert_eq!(json["setCode"], "TFC");
        assert!(json["color"].is_null());
        assert_eq!(json["images"], serde_json::json!({}));
        assert_eq!(json["abilities"], serde_json::json!([]));
    }

    #[test]
    fn catalog_card_flattens_price() {
        let card = CatalogCard {
            card: Card {
                id: "card_1".to_string(),
                ..Card::default()
            },
            price: None,
        };

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["id"], "card_1");
        assert!(json["price"].is_null());
    }

    #[test]
    fn set_reads_missing_languages_as_default() {
        let set: CardSet = serde_json::from_str(r#"{"id": "set_1", "code": "TFC"}"#).unwrap();
        assert_eq!(set.languages, vec!["fr".to_string()]);
        assert_eq!(set.card_count, 0);
    }

    #[test]
    fn card_reads_numbers_given_as_strings() {
        let card: Card = serde_json::from_str(
            r#"{"id": 12, "fullName": null, "cost": "3", "lore": "x", "images": null}"#,
        )
        .unwrap();

        assert_eq!(card.id, "12");
        assert_eq!(card.full_name, "");
        assert_eq!(card.cost, Some(3));
        assert_eq!(card.lore, None);
        assert!(card.images.is_empty());
    }

    #[test]
    fn price_reads_string_amounts_and_missing_fields() {
        let prices: Prices =
            serde_json::from_str(r#"{"c1": {"price": "3.50"}, "c2": {"price": null, "currency": "USD"}}"#)
                .unwrap();

        assert_eq!(prices["c1"].price, 3.5);
        assert_eq!(prices["c1"].currency, "");
        assert_eq!(prices["c2"].price, 0.0);
        assert_eq!(prices["c2"].currency, "USD");
    }

    #[test]
    fn line_item_without_added_at_loads() {
        let collection: Collection = serde_json::from_str(
            r#"{"id": "col", "cards": [{"cardId": "c1"}, {"cardId": "c2", "quantity": "4"}]}"#,
        )
        .unwrap();

        assert_eq!(collection.cards[0].quantity, 1);
        assert_eq!(collection.cards[0].added_at, "");
        assert_eq!(collection.cards[1].quantity, 4);
    }

    #[test]
    fn non_object_records_are_still_rejected() {
        assert!(serde_json::from_str::<Vec<Card>>("[1]").is_err());
        assert!(serde_json::from_str::<Prices>(r#"{"c1": 2.5}"#).is_err());
        assert!(serde_json::from_str::<Collection>(r#"{"cards": ["c1"]}"#).is_err());
    }

    #[test]
    fn collection_finds_line_item() {
        let collection = Collection {
            cards: vec![LineItem {
                card_id: "card_1".to_string(),
                quantity: 2,
                added_at: now_timestamp(),
            }],
            ..Collection::default()
        };

        assert_eq!(collection.line_item("card_1").map(|i| i.quantity), Some(2));
        assert!(collection.line_item("card_2").is_none());
    }

    #[test]
    fn timestamp_is_utc_millis() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-02-01T10:00:00.000Z".len());
    }
}
