//! Tests for the collection service

use super::*;
use crate::error::StoreError;
use crate::ids::SequentialIds;
use crate::store::SqliteStore;
use std::thread;

fn test_service() -> CollectionService {
    let store = SqliteStore::open_in_memory().unwrap();
    let records = Records::new(Arc::new(store));
    CollectionService::new(records, Arc::new(SequentialIds::new()))
}

fn draft(name: &str) -> CollectionDraft {
    CollectionDraft {
        name: name.to_string(),
        description: None,
    }
}

#[test]
fn create_trims_name_and_defaults_description() {
    let service = test_service();

    let collection = service.create(draft("  My binder  ")).unwrap();

    assert_eq!(collection.id, "collection_1");
    assert_eq!(collection.name, "My binder");
    assert_eq!(collection.description, "");
    assert!(collection.cards.is_empty());
    assert_eq!(collection.created_at, collection.updated_at);
    assert_eq!(service.list().unwrap(), vec![collection]);
}

#[test]
fn create_rejects_blank_name() {
    let service = test_service();

    let err = service.create(draft("   ")).unwrap_err();

    assert!(matches!(err, StoreError::Validation(ValidationError::MissingField("name"))));
    assert!(service.list().unwrap().is_empty());
}

#[test]
fn adding_twice_sums_quantities() {
    let service = test_service();
    let id = service.create(draft("Deck")).unwrap().id;

    service.add_card(&id, "card_a", 2).unwrap();
    let collection = service.add_card(&id, "card_a", 3).unwrap().unwrap();

    assert_eq!(collection.cards.len(), 1);
    assert_eq!(collection.line_item("card_a").unwrap().quantity, 5);
}

#[test]
fn huge_add_saturates_instead_of_wrapping() {
    let service = test_service();
    let id = service.create(draft("Deck")).unwrap().id;

    service.add_card(&id, "card_a", 1).unwrap();
    let collection = service.add_card(&id, "card_a", i64::MAX).unwrap().unwrap();

    assert_eq!(collection.line_item("card_a").unwrap().quantity, u32::MAX);

    let collection = service.add_card(&id, "card_a", i64::MIN).unwrap().unwrap();
    assert!(collection.line_item("card_a").is_none());
}

#[test]
fn negative_add_down_to_zero_removes_entry() {
    let service = test_service();
    let id = service.create(draft("Deck")).unwrap().id;

    service.add_card(&id, "card_a", 2).unwrap();
    let collection = service.add_card(&id, "card_a", -2).unwrap().unwrap();
    assert!(collection.line_item("card_a").is_none());

    let outcome = service.remove_card(&id, "card_a").unwrap();
    assert_eq!(outcome, LineItemOutcome::CardNotInCollection);
}

#[test]
fn negative_add_for_missing_card_is_a_noop() {
    let service = test_service();
    let created = service.create(draft("Deck")).unwrap();

    let collection = service.add_card(&created.id, "card_a", -1).unwrap().unwrap();

    assert!(collection.cards.is_empty());
    assert_eq!(collection.updated_at, created.updated_at);
}

#[test]
fn add_to_missing_collection_returns_none() {
    let service = test_service();
    assert_eq!(service.add_card("nope", "card_a", 1).unwrap(), None);
}

#[test]
fn remove_card_reports_each_outcome() {
    let service = test_service();
    let id = service.create(draft("Deck")).unwrap().id;
    service.add_card(&id, "card_a", 4).unwrap();

    assert_eq!(
        service.remove_card("nope", "card_a").unwrap(),
        LineItemOutcome::CollectionNotFound
    );
    assert_eq!(
        service.remove_card(&id, "card_b").unwrap(),
        LineItemOutcome::CardNotInCollection
    );

    let collection = service.remove_card(&id, "card_a").unwrap().collection().unwrap();
    assert!(collection.cards.is_empty());
}

#[test]
fn set_quantity_overwrites_and_zero_removes() {
    let service = test_service();
    let id = service.create(draft("Deck")).unwrap().id;
    service.add_card(&id, "card_a", 1).unwrap();

    let collection = service.set_quantity(&id, "card_a", 7).unwrap().collection().unwrap();
    assert_eq!(collection.line_item("card_a").unwrap().quantity, 7);

    let collection = service.set_quantity(&id, "card_a", 0).unwrap().collection().unwrap();
    assert!(collection.line_item("card_a").is_none());

    assert_eq!(
        service.set_quantity(&id, "card_a", 3).unwrap(),
        LineItemOutcome::CardNotInCollection
    );
}

#[test]
fn update_changes_only_given_fields() {
    let service = test_service();
    let id = service
        .create(CollectionDraft {
            name: "Deck".to_string(),
            description: Some("Amber/Amethyst".to_string()),
        })
        .unwrap()
        .id;

    let patch = CollectionPatch {
        name: Some("Tournament deck".to_string()),
        description: None,
    };
    let updated = service.update(&id, patch).unwrap().unwrap();

    assert_eq!(updated.name, "Tournament deck");
    assert_eq!(updated.description, "Amber/Amethyst");
    assert_eq!(service.update("nope", CollectionPatch::default()).unwrap(), None);
}

#[test]
fn update_rejects_blank_name() {
    let service = test_service();
    let id = service.create(draft("Deck")).unwrap().id;

    let patch = CollectionPatch {
        name: Some(String::new()),
        description: None,
    };

    assert!(service.update(&id, patch).is_err());
    assert_eq!(service.get(&id).unwrap().unwrap().name, "Deck");
}

#[test]
fn delete_removes_collection() {
    let service = test_service();
    let keep = service.create(draft("Keep")).unwrap().id;
    let gone = service.create(draft("Gone")).unwrap().id;

    assert!(service.delete(&gone).unwrap());
    assert!(!service.delete(&gone).unwrap());

    let ids: Vec<String> = service.list().unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![keep]);
}

#[test]
fn stats_count_entries_and_copies() {
    let service = test_service();
    let id = service.create(draft("Deck")).unwrap().id;
    service.add_card(&id, "card_a", 4).unwrap();
    service.add_card(&id, "card_b", 2).unwrap();

    let stats = service.stats(&id).unwrap().unwrap();

    assert_eq!(stats.total_cards, 2);
    assert_eq!(stats.total_quantity, 6);
    assert_eq!(service.stats("nope").unwrap(), None);
}

#[test]
fn concurrent_adds_are_not_lost() {
    let service = test_service();
    let id = service.create(draft("Deck")).unwrap().id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let id = id.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    service.add_card(&id, "card_a", 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let collection = service.get(&id).unwrap().unwrap();
    assert_eq!(collection.line_item("card_a").unwrap().quantity, 40);
}
