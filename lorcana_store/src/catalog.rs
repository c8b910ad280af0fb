//! Card catalog: filtering, price enrichment and card maintenance
//!
//! Read paths (`list_cards`, `get_card_by_id`, `list_sets`, `prices`, `stats`)
//! log storage failures and degrade to empty results so a broken price file
//! never takes the catalog view down. Write paths return errors.

use crate::error::{json_kind, Result, ValidationError};
use crate::ids::IdGenerator;
use crate::models::{now_timestamp, Card, CardSet, CatalogCard, CatalogStats, Prices};
use crate::normalize::normalize_card;
use crate::store::{Change, DocumentKind, Records};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Optional card filters, combined with AND. Empty strings are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFilters {
    /// Set code
    pub set: Option<String>,
    pub color: Option<String>,
    pub rarity: Option<String>,
    /// Case-insensitive substring of `fullName` or `name`
    pub search: Option<String>,
    /// Locale the card's set must be published in
    pub language: Option<String>,
}

fn active(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().filter(|value| !value.is_empty())
}

impl CardFilters {
    fn matches(&self, card: &Card, sets: &[CardSet]) -> bool {
        if let Some(set) = active(&self.set) {
            if card.set_code != set {
                return false;
            }
        }
        if let Some(color) = active(&self.color) {
            if card.color.as_deref() != Some(color) {
                return false;
            }
        }
        if let Some(rarity) = active(&self.rarity) {
            if card.rarity.as_deref() != Some(rarity) {
                return false;
            }
        }
        if let Some(search) = active(&self.search) {
            let needle = search.to_lowercase();
            if !card.full_name.to_lowercase().contains(&needle)
                && !card.name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(language) = active(&self.language) {
            // Cards whose set isn't in the sets document are kept
            let published = sets
                .iter()
                .find(|set| set.code == card.set_code)
                .map_or(true, |set| set.languages.iter().any(|l| l == language));
            if !published {
                return false;
            }
        }
        true
    }
}

/// Card catalog service
#[derive(Clone)]
pub struct CardCatalog {
    records: Records,
    ids: Arc<dyn IdGenerator>,
}

impl CardCatalog {
    pub fn new(records: Records, ids: Arc<dyn IdGenerator>) -> Self {
        Self { records, ids }
    }

    /// Cards matching `filters`, in store order, each with its price attached
    pub fn list_cards(&self, filters: &CardFilters) -> Vec<CatalogCard> {
        self.try_list_cards(filters).unwrap_or_else(|e| {
            log::error!("Error getting cards: {}", e);
            Vec::new()
        })
    }

    fn try_list_cards(&self, filters: &CardFilters) -> Result<Vec<CatalogCard>> {
        let cards: Vec<Card> = self.records.load(DocumentKind::Cards)?;
        let sets: Vec<CardSet> = if active(&filters.language).is_some() {
            self.records.load(DocumentKind::Sets)?
        } else {
            Vec::new()
        };
        let prices: Prices = self.records.load(DocumentKind::Prices)?;

        Ok(cards
            .into_iter()
            .filter(|card| filters.matches(card, &sets))
            .map(|card| {
                let price = prices.get(&card.id).cloned();
                CatalogCard { card, price }
            })
            .collect())
    }

    /// Enriched card by id; `None` when absent or when the catalog can't be read
    pub fn get_card_by_id(&self, id: &str) -> Option<CatalogCard> {
        self.list_cards(&CardFilters::default())
            .into_iter()
            .find(|entry| entry.card.id == id)
    }

    /// All sets, optionally limited to those published in `language`
    ///
    /// Sets without a name are shown as `Extension <code>`.
    pub fn list_sets(&self, language: Option<&str>) -> Vec<CardSet> {
        let sets: Vec<CardSet> = match self.records.load(DocumentKind::Sets) {
            Ok(sets) => sets,
            Err(e) => {
                log::error!("Error getting sets: {}", e);
                return Vec::new();
            }
        };

        sets.into_iter()
            .filter(|set| match language.filter(|l| !l.is_empty()) {
                Some(language) => set.languages.iter().any(|l| l == language),
                None => true,
            })
            .map(|mut set| {
                if set.name.is_empty() {
                    set.name = format!("Extension {}", set.code);
                }
                set
            })
            .collect()
    }

    pub fn prices(&self) -> Prices {
        self.records.load(DocumentKind::Prices).unwrap_or_else(|e| {
            log::error!("Error getting prices: {}", e);
            Prices::new()
        })
    }

    /// Totals and per-color / per-rarity / per-set histograms
    pub fn stats(&self) -> CatalogStats {
        let cards = self.list_cards(&CardFilters::default());
        let mut stats = CatalogStats {
            total_cards: cards.len(),
            total_sets: self.list_sets(None).len(),
            total_prices: self.prices().len(),
            ..CatalogStats::default()
        };

        for CatalogCard { card, .. } in &cards {
            if let Some(color) = card.color.as_deref().filter(|c| !c.is_empty()) {
                *stats.by_color.entry(color.to_string()).or_default() += 1;
            }
            if let Some(rarity) = card.rarity.as_deref().filter(|r| !r.is_empty()) {
                *stats.by_rarity.entry(rarity.to_string()).or_default() += 1;
            }
            if !card.set_code.is_empty() {
                *stats.by_set.entry(card.set_code.clone()).or_default() += 1;
            }
        }

        stats
    }

    /// Append a single card, normalized like an imported one
    pub fn add_card(&self, data: &Value) -> Result<Card> {
        let fields = as_object("Card", data)?;
        let now = now_timestamp();
        let mut card = normalize_card(fields, self.ids.as_ref(), &now);
        card.created_at = now;

        self.records
            .update(DocumentKind::Cards, |cards: &mut Vec<Card>| {
                if cards.iter().any(|c| c.id == card.id) {
                    return Err(ValidationError::DuplicateId(card.id.clone()).into());
                }
                cards.push(card.clone());
                Ok(Change::Write(card))
            })
            .inspect(|card| log::info!("Added card {}", card.id))
    }

    /// Shallow-merge `patch` into the card; the id never changes
    ///
    /// Returns `None` when no card has this id.
    pub fn update_card(&self, id: &str, patch: &Value) -> Result<Option<Card>> {
        let patch = as_object("Card", patch)?;
        let now = now_timestamp();

        self.records
            .update(DocumentKind::Cards, |cards: &mut Vec<Card>| {
                let Some(slot) = cards.iter_mut().find(|c| c.id == id) else {
                    return Ok(Change::Keep(None));
                };

                let mut merged = match serde_json::to_value(&*slot) {
                    Ok(Value::Object(fields)) => fields,
                    _ => Map::new(),
                };
                for (key, value) in patch {
                    merged.insert(key.clone(), value.clone());
                }
                merged.insert("id".to_string(), Value::String(id.to_string()));

                *slot = normalize_card(&merged, self.ids.as_ref(), &now);
                Ok(Change::Write(Some(slot.clone())))
            })
    }

    /// Remove a card from the catalog. Collections referencing it are not touched.
    pub fn delete_card(&self, id: &str) -> Result<bool> {
        self.records
            .update(DocumentKind::Cards, |cards: &mut Vec<Card>| {
                let before = cards.len();
                cards.retain(|c| c.id != id);
                if cards.len() == before {
                    Ok(Change::Keep(false))
                } else {
                    Ok(Change::Write(true))
                }
            })
    }
}

fn as_object<'a>(document: &'static str, value: &'a Value) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ValidationError::ShapeMismatch {
            document,
            expected: "an object",
            found: json_kind(value),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::store::FileStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_catalog() -> (CardCatalog, Records, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let records = Records::new(Arc::new(FileStore::new(temp_dir.path())));
        let catalog = CardCatalog::new(records.clone(), Arc::new(SequentialIds::new()));
        (catalog, records, temp_dir)
    }

    fn make_test_card(id: &str, name: &str, color: &str, set_code: &str) -> Card {
        Card {
            id: id.to_string(),
            full_name: name.to_string(),
            name: name.to_string(),
            set_code: set_code.to_string(),
            color: Some(color.to_string()),
            rarity: Some("Common".to_string()),
            ..Card::default()
        }
    }

    fn seed(records: &Records) {
        let cards = vec![
            make_test_card("c1", "Mickey Mouse - Wayward Sorcerer", "Amber", "TFC"),
            make_test_card("c2", "Maleficent - Monstrous Dragon", "Ruby", "TFC"),
            make_test_card("c3", "Mickey Mouse - Detective", "Ruby", "ROF"),
        ];
        records.save(DocumentKind::Cards, &cards).unwrap();
        records
            .save(
                DocumentKind::Sets,
                &json!([
                    {"id": "s1", "code": "TFC", "name": "The First Chapter", "languages": ["en", "fr"]},
                    {"id": "s2", "code": "ROF", "name": "", "languages": ["en"]},
                ]),
            )
            .unwrap();
        records
            .save(
                DocumentKind::Prices,
                &json!({"c2": {"price": 24.5, "currency": "EUR", "source": "manual", "lastUpdated": "2026-01-01"}}),
            )
            .unwrap();
    }

    fn ids(cards: &[CatalogCard]) -> Vec<&str> {
        cards.iter().map(|c| c.card.id.as_str()).collect()
    }

    #[test]
    fn list_cards_without_filters_keeps_store_order() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let cards = catalog.list_cards(&CardFilters::default());
        assert_eq!(ids(&cards), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn list_cards_attaches_prices() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let cards = catalog.list_cards(&CardFilters::default());
        assert!(cards[0].price.is_none());
        assert_eq!(cards[1].price.as_ref().map(|p| p.price), Some(24.5));
    }

    #[test]
    fn filter_by_color() {
        let (catalog, records, _temp_dir) = test_catalog();
        records
            .save(
                DocumentKind::Cards,
                &vec![
                    make_test_card("a", "Amber card", "Amber", "TFC"),
                    make_test_card("r", "Ruby card", "Ruby", "TFC"),
                ],
            )
            .unwrap();

        let filters = CardFilters {
            color: Some("Ruby".to_string()),
            ..CardFilters::default()
        };
        assert_eq!(ids(&catalog.list_cards(&filters)), vec!["r"]);
    }

    #[test]
    fn filters_combine_with_and() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let filters = CardFilters {
            set: Some("TFC".to_string()),
            color: Some("Ruby".to_string()),
            ..CardFilters::default()
        };
        assert_eq!(ids(&catalog.list_cards(&filters)), vec!["c2"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let filters = CardFilters {
            search: Some("MICKEY".to_string()),
            ..CardFilters::default()
        };
        assert_eq!(ids(&catalog.list_cards(&filters)), vec!["c1", "c3"]);
    }

    #[test]
    fn empty_filter_values_are_ignored() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let filters = CardFilters {
            color: Some(String::new()),
            ..CardFilters::default()
        };
        assert_eq!(catalog.list_cards(&filters).len(), 3);
    }

    #[test]
    fn language_filter_uses_set_languages() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let filters = CardFilters {
            language: Some("fr".to_string()),
            ..CardFilters::default()
        };
        assert_eq!(ids(&catalog.list_cards(&filters)), vec!["c1", "c2"]);
    }

    #[test]
    fn listing_does_not_mutate_store() {
        let (catalog, records, temp_dir) = test_catalog();
        seed(&records);
        let path = temp_dir.path().join("cards.json");
        let before = std::fs::read_to_string(&path).unwrap();

        catalog.list_cards(&CardFilters {
            search: Some("dragon".to_string()),
            ..CardFilters::default()
        });

        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn corrupt_cards_degrade_to_empty_listing() {
        let (catalog, _records, temp_dir) = test_catalog();
        std::fs::write(temp_dir.path().join("cards.json"), "not json").unwrap();

        assert!(catalog.list_cards(&CardFilters::default()).is_empty());
        assert!(catalog.get_card_by_id("c1").is_none());
    }

    #[test]
    fn get_card_by_id_returns_none_when_absent() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        assert_eq!(catalog.get_card_by_id("c2").unwrap().card.color.as_deref(), Some("Ruby"));
        assert!(catalog.get_card_by_id("missing").is_none());
    }

    #[test]
    fn list_sets_fills_missing_names_and_filters_language() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let sets = catalog.list_sets(None);
        assert_eq!(sets[1].name, "Extension ROF");

        let french = catalog.list_sets(Some("fr"));
        assert_eq!(french.len(), 1);
        assert_eq!(french[0].code, "TFC");
    }

    #[test]
    fn stats_tabulates_histograms() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let stats = catalog.stats();
        assert_eq!(stats.total_cards, 3);
        assert_eq!(stats.total_sets, 2);
        assert_eq!(stats.total_prices, 1);
        assert_eq!(stats.by_color["Ruby"], 2);
        assert_eq!(stats.by_color["Amber"], 1);
        assert_eq!(stats.by_rarity["Common"], 3);
        assert_eq!(stats.by_set["TFC"], 2);
    }

    #[test]
    fn stats_on_empty_store_is_zeroed() {
        let (catalog, _records, _temp_dir) = test_catalog();
        assert_eq!(catalog.stats(), CatalogStats::default());
    }

    #[test]
    fn add_card_normalizes_and_appends() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let card = catalog.add_card(&json!({"name": "Flounder"})).unwrap();
        assert_eq!(card.id, "card_1");
        assert_eq!(card.full_name, "Flounder");
        assert_eq!(card.set_code, "UNKNOWN");

        let cards = catalog.list_cards(&CardFilters::default());
        assert_eq!(cards.last().unwrap().card.id, "card_1");
    }

    #[test]
    fn add_card_rejects_existing_id() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let err = catalog.add_card(&json!({"id": "c1", "name": "Copy"})).unwrap_err();
        assert!(matches!(
            err,
            crate::error::StoreError::Validation(ValidationError::DuplicateId(_))
        ));
        assert_eq!(catalog.list_cards(&CardFilters::default()).len(), 3);
    }

    #[test]
    fn update_card_merges_and_keeps_id() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        let updated = catalog
            .update_card("c1", &json!({"id": "hijack", "rarity": "Rare", "lore": 2}))
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, "c1");
        assert_eq!(updated.rarity.as_deref(), Some("Rare"));
        assert_eq!(updated.lore, Some(2));
        assert_eq!(updated.color.as_deref(), Some("Amber"));
        assert!(catalog.update_card("missing", &json!({})).unwrap().is_none());
    }

    #[test]
    fn delete_card_reports_absence() {
        let (catalog, records, _temp_dir) = test_catalog();
        seed(&records);

        assert!(catalog.delete_card("c1").unwrap());
        assert!(!catalog.delete_card("c1").unwrap());
        assert_eq!(catalog.list_cards(&CardFilters::default()).len(), 2);
    }

    #[test]
    fn writes_fail_loudly_on_corrupt_document() {
        let (catalog, _records, temp_dir) = test_catalog();
        std::fs::write(temp_dir.path().join("cards.json"), "[{").unwrap();

        assert!(catalog.add_card(&json!({"name": "Ariel"})).is_err());
        assert!(catalog.delete_card("c1").is_err());
    }
}
