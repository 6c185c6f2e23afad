//! Data models for flashcard review scheduling.

use crate::error::{SchedulerError, SchedulerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifiers.
pub type CardId = Uuid;
pub type ReviewId = Uuid;

/// Learner identifier, as handed out by the session layer.
pub type OwnerId = String;

/// Easiness factor given to cards that have never been reviewed.
pub const DEFAULT_EASINESS_FACTOR: f64 = 2.5;

/// A learner's flashcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Unique identifier.
    pub id: CardId,
    /// Owning learner. Never changes after creation.
    pub owner_id: OwnerId,
    /// Prompt side.
    pub front: String,
    /// Answer side.
    pub back: String,
    /// Curriculum topic, e.g. "uvm-phases".
    pub topic: Option<String>,
    /// Days until the next review.
    pub interval: u32,
    /// Consecutive successful recalls.
    pub repetitions: u32,
    /// Interval growth multiplier.
    pub easiness_factor: f64,
    /// When the card becomes due.
    pub next_review_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by the store on every save.
    pub version: u64,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last updated.
    pub updated_at: DateTime<Utc>,
}

impl Flashcard {
    /// Create a new card, due immediately.
    pub fn new(
        owner_id: impl Into<OwnerId>,
        front: impl Into<String>,
        back: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            front: front.into(),
            back: back.into(),
            topic: None,
            interval: 1,
            repetitions: 0,
            easiness_factor: DEFAULT_EASINESS_FACTOR,
            next_review_at: now,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Override the starting easiness factor.
    pub fn with_easiness_factor(mut self, easiness_factor: f64) -> Self {
        self.easiness_factor = easiness_factor;
        self
    }

    /// Scheduling fields only.
    pub fn scheduling_state(&self) -> SchedulingState {
        SchedulingState {
            interval: self.interval,
            repetitions: self.repetitions,
            easiness_factor: self.easiness_factor,
        }
    }

    /// Check if due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }

    /// Copy of this card with a computed outcome applied.
    pub fn apply(&self, outcome: &ReviewOutcome, now: DateTime<Utc>) -> Self {
        Self {
            interval: outcome.interval,
            repetitions: outcome.repetitions,
            easiness_factor: outcome.easiness_factor,
            next_review_at: outcome.next_review_at,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// The part of a card the scheduler reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub interval: u32,
    pub repetitions: u32,
    pub easiness_factor: f64,
}

impl Default for SchedulingState {
    fn default() -> Self {
        Self {
            interval: 1,
            repetitions: 0,
            easiness_factor: DEFAULT_EASINESS_FACTOR,
        }
    }
}

impl SchedulingState {
    /// Reject states the scheduler cannot work from.
    pub fn validate(&self) -> SchedulerResult<()> {
        if !self.easiness_factor.is_finite() {
            return Err(SchedulerError::InvalidInput(format!(
                "easiness factor must be finite, got {}",
                self.easiness_factor
            )));
        }
        if self.interval == 0 {
            return Err(SchedulerError::InvalidInput(
                "interval must be at least 1 day".to_string(),
            ));
        }
        Ok(())
    }
}

/// Self-reported recall quality, 0 (blackout) to 5 (perfect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 5;
    /// Lowest quality that counts as a successful recall.
    pub const SUCCESS_THRESHOLD: u8 = 3;

    /// Validate a raw rating.
    pub fn new(value: i64) -> SchedulerResult<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(SchedulerError::InvalidInput(format!(
                "quality must be an integer in [{}, {}], got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    /// All valid ratings, lowest first.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }

    /// Raw value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether this rating keeps the streak going.
    pub fn is_success(self) -> bool {
        self.0 >= Self::SUCCESS_THRESHOLD
    }

    /// Short label for display.
    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "Blackout",
            1 => "Wrong",
            2 => "Almost",
            3 => "Hard",
            4 => "Good",
            _ => "Perfect",
        }
    }
}

impl TryFrom<i64> for Quality {
    type Error = SchedulerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schedule returned by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// Days until the next review.
    pub interval: u32,
    /// Updated streak.
    pub repetitions: u32,
    /// Updated easiness factor.
    pub easiness_factor: f64,
    /// Next review date.
    pub next_review_at: DateTime<Utc>,
}

/// A review record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    /// Unique identifier.
    pub id: ReviewId,
    /// Card that was reviewed.
    pub card_id: CardId,
    /// Learner who reviewed it.
    pub owner_id: OwnerId,
    /// Submitted rating.
    pub quality: Quality,
    /// When the review occurred.
    pub reviewed_at: DateTime<Utc>,
    pub previous_interval: u32,
    pub interval: u32,
    pub previous_easiness_factor: f64,
    pub easiness_factor: f64,
}

impl ReviewLog {
    /// Record the transition from `before` to `after`.
    pub fn new(before: &Flashcard, after: &Flashcard, quality: Quality, reviewed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id: before.id,
            owner_id: before.owner_id.clone(),
            quality,
            reviewed_at,
            previous_interval: before.interval,
            interval: after.interval,
            previous_easiness_factor: before.easiness_factor,
            easiness_factor: after.easiness_factor,
        }
    }
}
