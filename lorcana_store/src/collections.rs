//! User collections and their card line items
//!
//! Every mutation is one guarded read-modify-replace of the collections
//! document and bumps the collection's `updatedAt`.
//!
//! Quantity changes follow a small state machine per line item:
//! adding to an existing entry sums the quantities and drops the entry once
//! the total reaches zero or below; adding a positive quantity for a new card
//! inserts it; adding zero or a negative quantity for a card that isn't in
//! the collection does nothing. So `add_card(.., -n)` is a valid way to
//! remove copies.

use crate::error::{Result, ValidationError};
use crate::ids::IdGenerator;
use crate::models::{
    now_timestamp, Collection, CollectionDraft, CollectionPatch, CollectionStats, LineItem,
};
use crate::store::{Change, DocumentKind, Records};
use std::sync::Arc;

/// Result of an operation addressing one line item of one collection
#[derive(Debug, Clone, PartialEq)]
pub enum LineItemOutcome {
    /// The collection after the change
    Updated(Collection),
    CollectionNotFound,
    CardNotInCollection,
}

impl LineItemOutcome {
    pub fn collection(self) -> Option<Collection> {
        match self {
            LineItemOutcome::Updated(collection) => Some(collection),
            _ => None,
        }
    }
}

/// What [`CollectionService::modify`] found and did
enum Modified {
    Missing,
    Unchanged(Collection),
    Changed(Collection),
}

impl Modified {
    /// The collection, whether or not it changed
    fn collection(self) -> Option<Collection> {
        match self {
            Modified::Missing => None,
            Modified::Unchanged(collection) | Modified::Changed(collection) => Some(collection),
        }
    }

    /// Line item view: an unchanged collection means the card wasn't there
    fn line_item(self) -> LineItemOutcome {
        match self {
            Modified::Missing => LineItemOutcome::CollectionNotFound,
            Modified::Unchanged(_) => LineItemOutcome::CardNotInCollection,
            Modified::Changed(collection) => LineItemOutcome::Updated(collection),
        }
    }
}

/// Collection service
#[derive(Clone)]
pub struct CollectionService {
    records: Records,
    ids: Arc<dyn IdGenerator>,
}

impl CollectionService {
    pub fn new(records: Records, ids: Arc<dyn IdGenerator>) -> Self {
        Self { records, ids }
    }

    pub fn list(&self) -> Result<Vec<Collection>> {
        self.records.load(DocumentKind::Collections)
    }

    pub fn get(&self, id: &str) -> Result<Option<Collection>> {
        Ok(self.list()?.into_iter().find(|c| c.id == id))
    }

    /// Create an empty collection; the name must not be blank
    pub fn create(&self, draft: CollectionDraft) -> Result<Collection> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }

        let now = now_timestamp();
        let collection = Collection {
            id: self.ids.collection_id(),
            name: name.to_string(),
            description: draft.description.unwrap_or_default(),
            cards: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };

        self.records
            .update(DocumentKind::Collections, |collections: &mut Vec<Collection>| {
                collections.push(collection.clone());
                Ok(Change::Write(collection))
            })
            .inspect(|c| log::info!("Created collection {} ({})", c.id, c.name))
    }

    /// Apply `name`/`description` changes; `None` if the collection doesn't exist
    pub fn update(&self, id: &str, patch: CollectionPatch) -> Result<Option<Collection>> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(ValidationError::MissingField("name").into());
            }
        }

        self.modify(id, |collection| {
            if let Some(name) = patch.name {
                collection.name = name.trim().to_string();
            }
            if let Some(description) = patch.description {
                collection.description = description;
            }
            true
        })
        .map(Modified::collection)
    }

    /// Delete a collection and its line items; `false` if it didn't exist
    pub fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self
            .records
            .update(DocumentKind::Collections, |collections: &mut Vec<Collection>| {
                let before = collections.len();
                collections.retain(|c| c.id != id);
                if collections.len() == before {
                    Ok(Change::Keep(false))
                } else {
                    Ok(Change::Write(true))
                }
            })?;
        if deleted {
            log::info!("Deleted collection {}", id);
        }
        Ok(deleted)
    }

    /// Add `quantity` copies of a card (negative removes copies)
    ///
    /// `None` if the collection doesn't exist. A non-positive quantity for a
    /// card that isn't in the collection leaves it untouched.
    pub fn add_card(&self, collection_id: &str, card_id: &str, quantity: i64) -> Result<Option<Collection>> {
        self.modify(collection_id, |collection| {
            match collection.cards.iter().position(|item| item.card_id == card_id) {
                Some(index) => {
                    let total = i64::from(collection.cards[index].quantity).saturating_add(quantity);
                    if total <= 0 {
                        collection.cards.remove(index);
                    } else {
                        collection.cards[index].quantity = clamp_quantity(total);
                    }
                    true
                }
                None if quantity > 0 => {
                    collection.cards.push(LineItem {
                        card_id: card_id.to_string(),
                        quantity: clamp_quantity(quantity),
                        added_at: now_timestamp(),
                    });
                    true
                }
                None => false,
            }
        })
        .map(Modified::collection)
    }

    /// Remove a card's line item entirely
    pub fn remove_card(&self, collection_id: &str, card_id: &str) -> Result<LineItemOutcome> {
        self.modify(collection_id, |collection| {
            let before = collection.cards.len();
            collection.cards.retain(|item| item.card_id != card_id);
            collection.cards.len() != before
        })
        .map(Modified::line_item)
    }

    /// Set a card's quantity directly; zero or less removes the line item
    pub fn set_quantity(&self, collection_id: &str, card_id: &str, quantity: i64) -> Result<LineItemOutcome> {
        if quantity <= 0 {
            return self.remove_card(collection_id, card_id);
        }

        self.modify(collection_id, |collection| {
            match collection.cards.iter_mut().find(|item| item.card_id == card_id) {
                Some(item) => {
                    item.quantity = clamp_quantity(quantity);
                    true
                }
                None => false,
            }
        })
        .map(Modified::line_item)
    }

    /// Distinct cards, total copies and timestamps; `None` if the collection doesn't exist
    pub fn stats(&self, id: &str) -> Result<Option<CollectionStats>> {
        Ok(self.get(id)?.map(|collection| CollectionStats {
            total_cards: collection.cards.len(),
            total_quantity: collection.cards.iter().map(|i| u64::from(i.quantity)).sum(),
            last_updated: collection.updated_at,
            created_at: collection.created_at,
        }))
    }

    /// Run `mutate` on one collection under the document lock
    ///
    /// `mutate` returns whether it changed anything; unchanged collections are
    /// not written back and keep their `updatedAt`.
    fn modify<F>(&self, id: &str, mutate: F) -> Result<Modified>
    where
        F: FnOnce(&mut Collection) -> bool,
    {
        self.records
            .update(DocumentKind::Collections, |collections: &mut Vec<Collection>| {
                let Some(collection) = collections.iter_mut().find(|c| c.id == id) else {
                    return Ok(Change::Keep(Modified::Missing));
                };

                if !mutate(collection) {
                    return Ok(Change::Keep(Modified::Unchanged(collection.clone())));
                }
                collection.updated_at = now_timestamp();
                Ok(Change::Write(Modified::Changed(collection.clone())))
            })
    }
}

fn clamp_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity).unwrap_or(u32::MAX)
}

#[cfg(test)]
#[path = "collections_tests.rs"]
mod tests;
