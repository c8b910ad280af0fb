//! Validation and normalization of imported documents
//!
//! Import payloads are arbitrary JSON. Each import kind has a normalizer that
//! checks the top-level shape, then builds canonical records field by field
//! with deterministic fallbacks. Unknown fields are dropped.
//!
//! Records that arrive without an `id` get a fresh one from the
//! [`IdGenerator`]. There is no lookup against the existing store, so
//! re-importing id-less data creates new records instead of updating old
//! ones. That is fine because an import replaces the whole document anyway.

use crate::error::{json_kind, ValidationError};
use crate::ids::IdGenerator;
use crate::models::{Card, CardSet, PriceEntry, Prices, DEFAULT_LANGUAGE};
use crate::store::DocumentKind;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Placeholder for cards with neither `fullName` nor `name`
pub const UNKNOWN_CARD_NAME: &str = "Unknown Card";
/// Placeholder set code for cards and sets without one
pub const UNKNOWN_SET_CODE: &str = "UNKNOWN";
pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_PRICE_SOURCE: &str = "manual";

/// Document types that can be bulk imported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Cards,
    Sets,
    Prices,
}

impl ImportKind {
    pub fn key(self) -> &'static str {
        self.document().key()
    }

    /// The live document an import of this kind replaces
    pub fn document(self) -> DocumentKind {
        match self {
            ImportKind::Cards => DocumentKind::Cards,
            ImportKind::Sets => DocumentKind::Sets,
            ImportKind::Prices => DocumentKind::Prices,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ImportKind::Cards => "Cards",
            ImportKind::Sets => "Sets",
            ImportKind::Prices => "Prices",
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ImportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cards" => Ok(ImportKind::Cards),
            "sets" => Ok(ImportKind::Sets),
            "prices" => Ok(ImportKind::Prices),
            other => Err(other.to_string()),
        }
    }
}

/// A fully normalized import, ready to replace its document
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedImport {
    Cards(Vec<Card>),
    Sets(Vec<CardSet>),
    Prices(Prices),
}

impl NormalizedImport {
    pub fn kind(&self) -> ImportKind {
        match self {
            NormalizedImport::Cards(_) => ImportKind::Cards,
            NormalizedImport::Sets(_) => ImportKind::Sets,
            NormalizedImport::Prices(_) => ImportKind::Prices,
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            NormalizedImport::Cards(cards) => cards.len(),
            NormalizedImport::Sets(sets) => sets.len(),
            NormalizedImport::Prices(prices) => prices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize `raw` as an import of `kind`, stamping `now` on every record
pub fn normalize(
    kind: ImportKind,
    raw: &Value,
    ids: &dyn IdGenerator,
    now: &str,
) -> Result<NormalizedImport, ValidationError> {
    match kind {
        ImportKind::Cards => normalize_cards(raw, ids, now).map(NormalizedImport::Cards),
        ImportKind::Sets => normalize_sets(raw, ids, now).map(NormalizedImport::Sets),
        ImportKind::Prices => normalize_prices(raw, now).map(NormalizedImport::Prices),
    }
}

pub fn normalize_cards(
    raw: &Value,
    ids: &dyn IdGenerator,
    now: &str,
) -> Result<Vec<Card>, ValidationError> {
    let cards: Vec<Card> = records(ImportKind::Cards, raw)?
        .into_iter()
        .map(|record| normalize_card(record, ids, now))
        .collect();

    let duplicate = {
        let mut seen = HashSet::with_capacity(cards.len());
        let found = cards
            .iter()
            .find(|card| !seen.insert(card.id.as_str()))
            .map(|card| card.id.clone());
        found
    };
    match duplicate {
        Some(id) => Err(ValidationError::DuplicateId(id)),
        None => Ok(cards),
    }
}

pub(crate) fn normalize_card(record: &Map<String, Value>, ids: &dyn IdGenerator, now: &str) -> Card {
    let full_name = first_text(record, &["fullName", "name"]);
    let name = first_text(record, &["name", "fullName"]);

    Card {
        id: first_text(record, &["id"]).unwrap_or_else(|| ids.card_id()),
        full_name: full_name.unwrap_or_else(|| UNKNOWN_CARD_NAME.to_string()),
        name: name.unwrap_or_else(|| UNKNOWN_CARD_NAME.to_string()),
        set_code: first_text(record, &["setCode", "set_code"])
            .unwrap_or_else(|| UNKNOWN_SET_CODE.to_string()),
        color: first_text(record, &["color"]),
        rarity: first_text(record, &["rarity"]),
        cost: count(record.get("cost")),
        lore: count(record.get("lore")),
        images: object(record.get("images")),
        external_links: object(record.get("externalLinks")),
        abilities: array(record.get("abilities")),
        characteristics: array(record.get("characteristics")),
        created_at: first_text(record, &["createdAt"]).unwrap_or_else(|| now.to_string()),
        updated_at: now.to_string(),
    }
}

pub fn normalize_sets(
    raw: &Value,
    ids: &dyn IdGenerator,
    now: &str,
) -> Result<Vec<CardSet>, ValidationError> {
    Ok(records(ImportKind::Sets, raw)?
        .into_iter()
        .map(|record| {
            let raw_code = first_text(record, &["code", "setCode"]);
            let name = first_text(record, &["name"]).unwrap_or_else(|| {
                format!("Set {}", raw_code.as_deref().unwrap_or("Unknown"))
            });
            let code = raw_code.unwrap_or_else(|| UNKNOWN_SET_CODE.to_string());
            let languages = match record.get("languages") {
                Some(Value::Array(langs)) => langs
                    .iter()
                    .filter_map(|l| l.as_str().map(str::to_string))
                    .collect(),
                _ => vec![DEFAULT_LANGUAGE.to_string()],
            };

            CardSet {
                id: first_text(record, &["id"]).unwrap_or_else(|| ids.set_id()),
                name,
                code,
                release_date: first_text(record, &["releaseDate", "release_date"]),
                card_count: count(record.get("cardCount"))
                    .or_else(|| count(record.get("card_count")))
                    .unwrap_or(0),
                languages,
                created_at: first_text(record, &["createdAt"]).unwrap_or_else(|| now.to_string()),
                updated_at: now.to_string(),
            }
        })
        .collect())
}

pub fn normalize_prices(raw: &Value, now: &str) -> Result<Prices, ValidationError> {
    let map = raw.as_object().ok_or(ValidationError::ShapeMismatch {
        document: ImportKind::Prices.label(),
        expected: "an object",
        found: json_kind(raw),
    })?;

    map.iter()
        .map(|(card_id, info)| {
            let entry = match info {
                Value::Number(n) => PriceEntry {
                    price: n.as_f64().unwrap_or(0.0),
                    currency: DEFAULT_CURRENCY.to_string(),
                    source: DEFAULT_PRICE_SOURCE.to_string(),
                    last_updated: now.to_string(),
                },
                Value::Object(fields) => PriceEntry {
                    price: amount(fields.get("price")).unwrap_or(0.0),
                    currency: first_text(fields, &["currency"])
                        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                    source: first_text(fields, &["source"])
                        .unwrap_or_else(|| DEFAULT_PRICE_SOURCE.to_string()),
                    last_updated: first_text(fields, &["lastUpdated"])
                        .unwrap_or_else(|| now.to_string()),
                },
                other => {
                    return Err(ValidationError::ShapeMismatch {
                        document: ImportKind::Prices.label(),
                        expected: "a number or an object per card",
                        found: json_kind(other),
                    })
                }
            };
            Ok((card_id.clone(), entry))
        })
        .collect()
}

/// Check that `raw` is an array of objects and borrow its elements
fn records(kind: ImportKind, raw: &Value) -> Result<Vec<&Map<String, Value>>, ValidationError> {
    let items = raw.as_array().ok_or(ValidationError::ShapeMismatch {
        document: kind.label(),
        expected: "an array",
        found: json_kind(raw),
    })?;

    items
        .iter()
        .map(|item| {
            item.as_object().ok_or(ValidationError::ShapeMismatch {
                document: kind.label(),
                expected: "an array of objects",
                found: json_kind(item),
            })
        })
        .collect()
}

/// First key holding a non-empty string (numbers are stringified)
fn first_text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Non-negative integer from a number or numeric string
fn count(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn amount(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn object(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn array(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
