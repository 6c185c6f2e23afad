//! Review workflow: session check, ownership, scheduling, persistence.

use crate::auth::{AuthError, SessionProvider};
use review_scheduler::{
    CardId, Flashcard, FlashcardStore, OwnerId, Quality, ReviewHistory, ReviewLog, ReviewScheduler,
    SchedulerError, StoreError,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Card not found: {0}")]
    NotFound(CardId),
    #[error("Card {card_id} does not belong to {owner}")]
    PermissionDenied { card_id: CardId, owner: OwnerId },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Review statistics for one learner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewStats {
    pub total_cards: usize,
    pub due_now: usize,
    pub average_easiness: f64,
    pub total_reviews: usize,
    /// Share of reviews rated 3 or higher.
    pub retention_rate: f64,
}

pub struct ReviewService<S, P> {
    store: S,
    session: P,
    scheduler: ReviewScheduler,
}

impl<S, P> ReviewService<S, P>
where
    S: ReviewHistory,
    P: SessionProvider,
{
    pub fn new(store: S, session: P, scheduler: ReviewScheduler) -> Self {
        Self {
            store,
            session,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &ReviewScheduler {
        &self.scheduler
    }

    /// Load a card owned by the current learner.
    pub fn card(&self, card_id: CardId) -> ServiceResult<Flashcard> {
        let owner = self.session.require_session()?;
        self.owned_card(&owner, card_id)
    }

    fn owned_card(&self, owner: &str, card_id: CardId) -> ServiceResult<Flashcard> {
        let card = self
            .store
            .find_by_id(card_id)?
            .ok_or(ServiceError::NotFound(card_id))?;
        if card.owner_id != owner {
            warn!(%card_id, owner, "review attempted on another learner's card");
            return Err(ServiceError::PermissionDenied {
                card_id,
                owner: owner.to_string(),
            });
        }
        Ok(card)
    }

    /// Create a card for the current learner, due immediately.
    pub fn add_card(&self, front: &str, back: &str, topic: Option<&str>) -> ServiceResult<Flashcard> {
        let owner = self.session.require_session()?;
        let initial = self.scheduler.algorithm().initial_state();
        let mut card = Flashcard::new(owner, front, back, self.scheduler.now())
            .with_easiness_factor(initial.easiness_factor);
        card.topic = topic.map(str::to_string);

        let saved = self.store.save(&card)?;
        info!(card_id = %saved.id, owner = %saved.owner_id, "added card");
        Ok(saved)
    }

    /// Apply a review rating to one of the current learner's cards.
    pub fn submit_review(&self, card_id: CardId, quality: i64) -> ServiceResult<Flashcard> {
        let owner = self.session.require_session()?;
        let card = self.owned_card(&owner, card_id)?;
        let rating = Quality::new(quality)?;

        let next = self.scheduler.review(&card, rating)?;
        let log = ReviewLog::new(&card, &next, rating, next.updated_at);
        let saved = match self.store.save_review(&next, &log) {
            Ok(saved) => saved,
            Err(e @ StoreError::Conflict { .. }) => {
                warn!(%card_id, "card changed during review: {e}");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            %card_id,
            quality,
            interval = saved.interval,
            repetitions = saved.repetitions,
            next_review_at = %saved.next_review_at,
            "recorded review"
        );
        Ok(saved)
    }

    /// Current learner's due cards, earliest first.
    pub fn due_cards(&self) -> ServiceResult<Vec<Flashcard>> {
        let owner = self.session.require_session()?;
        Ok(self.store.list_due(&owner, self.scheduler.now())?)
    }

    /// All of the current learner's cards, optionally narrowed to a topic.
    pub fn cards(&self, topic: Option<&str>) -> ServiceResult<Vec<Flashcard>> {
        let owner = self.session.require_session()?;
        let mut cards = self.store.list_by_owner(&owner)?;
        if let Some(topic) = topic {
            cards.retain(|c| c.topic.as_deref() == Some(topic));
        }
        Ok(cards)
    }

    /// Interval each rating would give a card.
    pub fn preview(&self, card_id: CardId) -> ServiceResult<Vec<(Quality, u32)>> {
        let card = self.card(card_id)?;
        Ok(self.scheduler.preview(&card.scheduling_state())?)
    }

    pub fn delete_card(&self, card_id: CardId) -> ServiceResult<()> {
        let owner = self.session.require_session()?;
        self.owned_card(&owner, card_id)?;
        self.store.delete(card_id)?;
        info!(%card_id, "deleted card");
        Ok(())
    }

    pub fn stats(&self) -> ServiceResult<ReviewStats> {
        let owner = self.session.require_session()?;
        let now = self.scheduler.now();
        let cards = self.store.list_by_owner(&owner)?;
        let reviews = self.store.list_reviews(&owner)?;

        let mut stats = ReviewStats {
            total_cards: cards.len(),
            due_now: cards.iter().filter(|c| c.is_due(now)).count(),
            total_reviews: reviews.len(),
            ..Default::default()
        };
        if !cards.is_empty() {
            stats.average_easiness =
                cards.iter().map(|c| c.easiness_factor).sum::<f64>() / cards.len() as f64;
        }
        if !reviews.is_empty() {
            let recalled = reviews.iter().filter(|r| r.quality.is_success()).count();
            stats.retention_rate = recalled as f64 / reviews.len() as f64;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticSession;
    use crate::db::Database;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use review_scheduler::{FixedClock, InMemoryStore, Sm2, StoreResult};
    use std::sync::Arc;

    fn jan_15() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    fn service_for<S: ReviewHistory>(
        store: S,
        user: Option<&str>,
    ) -> (ReviewService<S, StaticSession>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(jan_15()));
        let scheduler = ReviewScheduler::new(Sm2::default(), clock.clone());
        (ReviewService::new(store, StaticSession::new(user), scheduler), clock)
    }

    #[test]
    fn test_review_cycle() {
        let (service, clock) = service_for(Database::in_memory().unwrap(), Some("alice"));
        let card = service
            .add_card("What does `uvm_component_utils` register?", "The type with the factory", Some("uvm-factory"))
            .unwrap();
        assert_eq!(service.due_cards().unwrap().len(), 1);

        let reviewed = service.submit_review(card.id, 4).unwrap();
        assert_eq!(reviewed.interval, 1);
        assert_eq!(reviewed.repetitions, 1);
        assert_eq!(reviewed.next_review_at, jan_15() + Duration::days(1));
        assert!(service.due_cards().unwrap().is_empty());

        clock.advance(Duration::days(1));
        let reviewed = service.submit_review(card.id, 5).unwrap();
        assert_eq!(reviewed.interval, 6);
        assert_eq!(reviewed.repetitions, 2);

        let stats = service.stats().unwrap();
        assert_eq!(stats.total_cards, 1);
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.due_now, 0);
        assert!((stats.retention_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_review_resets() {
        let (service, _) = service_for(InMemoryStore::new(), Some("alice"));
        let card = service.add_card("Q", "A", None).unwrap();
        service.submit_review(card.id, 5).unwrap();
        let reviewed = service.submit_review(card.id, 1).unwrap();
        assert_eq!(reviewed.repetitions, 0);
        assert_eq!(reviewed.interval, 1);

        let stats = service.stats().unwrap();
        assert!((stats.retention_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_quality_changes_nothing() {
        let (service, _) = service_for(InMemoryStore::new(), Some("alice"));
        let card = service.add_card("Q", "A", None).unwrap();

        let err = service.submit_review(card.id, 7).unwrap_err();
        assert!(matches!(err, ServiceError::Scheduler(SchedulerError::InvalidInput(_))));
        assert_eq!(service.card(card.id).unwrap(), card);
        assert_eq!(service.stats().unwrap().total_reviews, 0);
    }

    #[test]
    fn test_other_learners_card_is_denied() {
        let store = Arc::new(InMemoryStore::new());
        let bobs = store.save(&Flashcard::new("bob", "Q", "A", jan_15())).unwrap();

        let (service, _) = service_for(store.clone(), Some("alice"));
        let err = service.submit_review(bobs.id, 4).unwrap_err();
        assert!(matches!(err, ServiceError::PermissionDenied { .. }));
        assert_eq!(store.find_by_id(bobs.id).unwrap().unwrap().version, 1);
        assert!(matches!(
            service.delete_card(bobs.id).unwrap_err(),
            ServiceError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn test_missing_card_and_session() {
        let (service, _) = service_for(InMemoryStore::new(), Some("alice"));
        let missing = uuid::Uuid::new_v4();
        assert!(matches!(
            service.submit_review(missing, 4).unwrap_err(),
            ServiceError::NotFound(id) if id == missing
        ));

        let (anonymous, _) = service_for(InMemoryStore::new(), None);
        assert!(matches!(
            anonymous.due_cards().unwrap_err(),
            ServiceError::Auth(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn test_topic_filter_and_preview() {
        let (service, _) = service_for(InMemoryStore::new(), Some("alice"));
        let card = service.add_card("Q1", "A1", Some("sv-assertions")).unwrap();
        service.add_card("Q2", "A2", Some("uvm-phases")).unwrap();

        let filtered = service.cards(Some("sv-assertions")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, card.id);
        assert_eq!(service.cards(None).unwrap().len(), 2);

        let preview = service.preview(card.id).unwrap();
        assert_eq!(preview.len(), 6);
        assert!(preview.iter().all(|(_, interval)| *interval == 1));
    }

    /// Store whose history writes always fail.
    struct FullDisk(InMemoryStore);

    impl FlashcardStore for FullDisk {
        fn find_by_id(&self, id: CardId) -> StoreResult<Option<Flashcard>> {
            self.0.find_by_id(id)
        }

        fn save(&self, card: &Flashcard) -> StoreResult<Flashcard> {
            self.0.save(card)
        }

        fn list_due(&self, owner_id: &str, as_of: DateTime<Utc>) -> StoreResult<Vec<Flashcard>> {
            self.0.list_due(owner_id, as_of)
        }

        fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Flashcard>> {
            self.0.list_by_owner(owner_id)
        }

        fn delete(&self, id: CardId) -> StoreResult<bool> {
            self.0.delete(id)
        }
    }

    impl ReviewHistory for FullDisk {
        fn save_review(&self, _card: &Flashcard, _review: &ReviewLog) -> StoreResult<Flashcard> {
            Err(StoreError::Backend("disk full".to_string()))
        }

        fn list_reviews(&self, owner_id: &str) -> StoreResult<Vec<ReviewLog>> {
            self.0.list_reviews(owner_id)
        }
    }

    #[test]
    fn test_failed_write_leaves_card_unreviewed() {
        let (service, _) = service_for(FullDisk(InMemoryStore::new()), Some("alice"));
        let card = service.add_card("Q", "A", None).unwrap();

        let err = service.submit_review(card.id, 4).unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Backend(_))));
        assert_eq!(service.card(card.id).unwrap(), card);
        assert_eq!(service.stats().unwrap().total_reviews, 0);
    }
}
