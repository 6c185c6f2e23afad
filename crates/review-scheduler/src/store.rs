//! Record store contracts and an in-memory implementation.

use crate::error::{StoreError, StoreResult};
use crate::models::{CardId, Flashcard, ReviewLog};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Persistence for flashcards.
///
/// `save` enforces optimistic concurrency: an existing card is only
/// overwritten when the incoming `version` matches the stored one, and the
/// returned copy carries the bumped version.
pub trait FlashcardStore {
    fn find_by_id(&self, id: CardId) -> StoreResult<Option<Flashcard>>;

    fn save(&self, card: &Flashcard) -> StoreResult<Flashcard>;

    /// Cards owned by `owner_id` with `next_review_at <= as_of`, earliest first.
    fn list_due(&self, owner_id: &str, as_of: DateTime<Utc>) -> StoreResult<Vec<Flashcard>>;

    /// All cards owned by `owner_id`, earliest due first.
    fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Flashcard>>;

    /// Returns whether a card was removed.
    fn delete(&self, id: CardId) -> StoreResult<bool>;
}

/// Append-only review history, written together with the reviewed card.
pub trait ReviewHistory: FlashcardStore {
    /// Save `card` and append `review` as one unit: either both are stored
    /// or neither is. The version check is the same as [`FlashcardStore::save`].
    fn save_review(&self, card: &Flashcard, review: &ReviewLog) -> StoreResult<Flashcard>;

    /// Reviews by `owner_id`, newest first.
    fn list_reviews(&self, owner_id: &str) -> StoreResult<Vec<ReviewLog>>;
}

impl<T: FlashcardStore + ?Sized> FlashcardStore for Arc<T> {
    fn find_by_id(&self, id: CardId) -> StoreResult<Option<Flashcard>> {
        (**self).find_by_id(id)
    }

    fn save(&self, card: &Flashcard) -> StoreResult<Flashcard> {
        (**self).save(card)
    }

    fn list_due(&self, owner_id: &str, as_of: DateTime<Utc>) -> StoreResult<Vec<Flashcard>> {
        (**self).list_due(owner_id, as_of)
    }

    fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Flashcard>> {
        (**self).list_by_owner(owner_id)
    }

    fn delete(&self, id: CardId) -> StoreResult<bool> {
        (**self).delete(id)
    }
}

impl<T: ReviewHistory + ?Sized> ReviewHistory for Arc<T> {
    fn save_review(&self, card: &Flashcard, review: &ReviewLog) -> StoreResult<Flashcard> {
        (**self).save_review(card, review)
    }

    fn list_reviews(&self, owner_id: &str) -> StoreResult<Vec<ReviewLog>> {
        (**self).list_reviews(owner_id)
    }
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    cards: RwLock<HashMap<CardId, Flashcard>>,
    reviews: RwLock<Vec<ReviewLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

fn save_into(cards: &mut HashMap<CardId, Flashcard>, card: &Flashcard) -> StoreResult<Flashcard> {
    if let Some(existing) = cards.get(&card.id) {
        if existing.version != card.version {
            return Err(StoreError::Conflict {
                id: card.id,
                expected: card.version,
                found: existing.version,
            });
        }
    }
    let mut stored = card.clone();
    stored.version = card.version + 1;
    cards.insert(stored.id, stored.clone());
    Ok(stored)
}

fn sort_by_due(cards: &mut [Flashcard]) {
    cards.sort_by(|a, b| a.next_review_at.cmp(&b.next_review_at).then(a.id.cmp(&b.id)));
}

impl FlashcardStore for InMemoryStore {
    fn find_by_id(&self, id: CardId) -> StoreResult<Option<Flashcard>> {
        let cards = self.cards.read().map_err(poisoned)?;
        Ok(cards.get(&id).cloned())
    }

    fn save(&self, card: &Flashcard) -> StoreResult<Flashcard> {
        let mut cards = self.cards.write().map_err(poisoned)?;
        save_into(&mut cards, card)
    }

    fn list_due(&self, owner_id: &str, as_of: DateTime<Utc>) -> StoreResult<Vec<Flashcard>> {
        let cards = self.cards.read().map_err(poisoned)?;
        let mut due: Vec<Flashcard> = cards
            .values()
            .filter(|c| c.owner_id == owner_id && c.is_due(as_of))
            .cloned()
            .collect();
        sort_by_due(&mut due);
        Ok(due)
    }

    fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Flashcard>> {
        let cards = self.cards.read().map_err(poisoned)?;
        let mut owned: Vec<Flashcard> = cards
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        sort_by_due(&mut owned);
        Ok(owned)
    }

    fn delete(&self, id: CardId) -> StoreResult<bool> {
        let mut cards = self.cards.write().map_err(poisoned)?;
        let removed = cards.remove(&id).is_some();
        if removed {
            self.reviews.write().map_err(poisoned)?.retain(|r| r.card_id != id);
        }
        Ok(removed)
    }
}

impl ReviewHistory for InMemoryStore {
    fn save_review(&self, card: &Flashcard, review: &ReviewLog) -> StoreResult<Flashcard> {
        // Same lock order as `delete`.
        let mut cards = self.cards.write().map_err(poisoned)?;
        let mut reviews = self.reviews.write().map_err(poisoned)?;
        let stored = save_into(&mut cards, card)?;
        reviews.push(review.clone());
        Ok(stored)
    }

    fn list_reviews(&self, owner_id: &str) -> StoreResult<Vec<ReviewLog>> {
        let reviews = self.reviews.read().map_err(poisoned)?;
        let mut owned: Vec<ReviewLog> = reviews
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.reviewed_at.cmp(&a.reviewed_at));
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quality;
    use chrono::{Duration, TimeZone};

    fn jan_15() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    fn card_due(owner: &str, due: DateTime<Utc>) -> Flashcard {
        let mut card = Flashcard::new(owner, "Q", "A", jan_15());
        card.next_review_at = due;
        card
    }

    #[test]
    fn test_save_and_find() {
        let store = InMemoryStore::new();
        let card = Flashcard::new("alice", "What is a virtual interface?", "A handle to an interface", jan_15());
        let saved = store.save(&card).unwrap();
        assert_eq!(saved.version, 1);

        let loaded = store.find_by_id(card.id).unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(store.find_by_id(uuid::Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_stale_save_conflicts() {
        let store = InMemoryStore::new();
        let card = Flashcard::new("alice", "Q", "A", jan_15());
        let first = store.save(&card).unwrap();

        // Two writers read version 1; the second save must fail.
        let mut a = first.clone();
        a.interval = 6;
        let mut b = first.clone();
        b.interval = 15;
        store.save(&a).unwrap();

        let err = store.save(&b).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, found: 2, .. }));
        assert_eq!(store.find_by_id(card.id).unwrap().unwrap().interval, 6);
    }

    #[test]
    fn test_list_due_filters_and_orders() {
        let store = InMemoryStore::new();
        let later = store.save(&card_due("alice", jan_15() - Duration::hours(1))).unwrap();
        let earlier = store.save(&card_due("alice", jan_15() - Duration::days(2))).unwrap();
        let boundary = store.save(&card_due("alice", jan_15())).unwrap();
        store.save(&card_due("alice", jan_15() + Duration::seconds(1))).unwrap();
        store.save(&card_due("bob", jan_15() - Duration::days(5))).unwrap();

        let due = store.list_due("alice", jan_15()).unwrap();
        let ids: Vec<_> = due.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id, boundary.id]);
    }

    #[test]
    fn test_delete_removes_history() {
        let store = InMemoryStore::new();
        let card = store.save(&Flashcard::new("alice", "Q", "A", jan_15())).unwrap();
        let log = ReviewLog::new(&card, &card, Quality::new(4).unwrap(), jan_15());
        store.save_review(&card, &log).unwrap();

        assert!(store.delete(card.id).unwrap());
        assert!(!store.delete(card.id).unwrap());
        assert!(store.list_reviews("alice").unwrap().is_empty());
    }

    #[test]
    fn test_reviews_newest_first() {
        let store = InMemoryStore::new();
        let card = store.save(&Flashcard::new("alice", "Q", "A", jan_15())).unwrap();
        let q = Quality::new(3).unwrap();
        let card = store.save_review(&card, &ReviewLog::new(&card, &card, q, jan_15())).unwrap();
        store
            .save_review(&card, &ReviewLog::new(&card, &card, q, jan_15() + Duration::days(1)))
            .unwrap();

        let reviews = store.list_reviews("alice").unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(reviews[0].reviewed_at > reviews[1].reviewed_at);
        assert!(store.list_reviews("bob").unwrap().is_empty());
    }

    #[test]
    fn test_stale_review_writes_nothing() {
        let store = InMemoryStore::new();
        let card = store.save(&Flashcard::new("alice", "Q", "A", jan_15())).unwrap();
        let q = Quality::new(4).unwrap();
        store.save_review(&card, &ReviewLog::new(&card, &card, q, jan_15())).unwrap();

        // `card` still carries version 1.
        let err = store
            .save_review(&card, &ReviewLog::new(&card, &card, q, jan_15()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, found: 2, .. }));
        assert_eq!(store.list_reviews("alice").unwrap().len(), 1);
    }
}
