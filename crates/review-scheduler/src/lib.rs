//! Spaced repetition scheduling for flashcard reviews.
//!
//! This crate holds the pure parts of the review flow:
//!
//! - **Scheduler**: SM-2 interval and easiness updates, driven by an injected [`Clock`]
//! - **Models**: flashcards, quality ratings, review outcomes and logs
//! - **Stores**: the [`FlashcardStore`] and [`ReviewHistory`] contracts, plus
//!   [`InMemoryStore`] for tests and embedding
//!
//! The scheduler never touches a store. Callers load a card, ask the scheduler
//! for its next state, and persist the result themselves.

pub mod clock;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod store;

// Re-exports
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{SchedulerError, SchedulerResult, StoreError, StoreResult};
pub use models::{
    CardId, Flashcard, OwnerId, Quality, ReviewId, ReviewLog, ReviewOutcome, SchedulingState,
    DEFAULT_EASINESS_FACTOR,
};
pub use scheduler::{ReviewScheduler, Sm2, MIN_EASINESS_FACTOR};
pub use store::{FlashcardStore, InMemoryStore, ReviewHistory};
