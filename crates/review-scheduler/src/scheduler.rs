//! SM-2 spaced repetition scheduling.
//!
//! Quality ratings (0-5):
//! - 0: Complete blackout
//! - 1: Wrong, answer recognised once shown
//! - 2: Wrong, answer felt familiar
//! - 3: Correct with serious difficulty
//! - 4: Correct after hesitation
//! - 5: Perfect recall

use crate::clock::{Clock, SystemClock};
use crate::error::{SchedulerError, SchedulerResult};
use crate::models::{Flashcard, Quality, ReviewOutcome, SchedulingState, DEFAULT_EASINESS_FACTOR};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

/// Floor applied to every easiness factor update.
pub const MIN_EASINESS_FACTOR: f64 = 1.3;

/// SM-2 algorithm (SuperMemo 2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sm2 {
    /// Easiness factor for cards that have never been reviewed.
    pub initial_ease: f64,
}

impl Default for Sm2 {
    fn default() -> Self {
        Self {
            initial_ease: DEFAULT_EASINESS_FACTOR,
        }
    }
}

impl Sm2 {
    /// Create with a custom initial easiness factor.
    pub fn new(initial_ease: f64) -> SchedulerResult<Self> {
        if !initial_ease.is_finite() || initial_ease < MIN_EASINESS_FACTOR {
            return Err(SchedulerError::InvalidInput(format!(
                "initial ease must be a finite number >= {MIN_EASINESS_FACTOR}, got {initial_ease}"
            )));
        }
        Ok(Self { initial_ease })
    }

    /// Algorithm name.
    pub fn name(&self) -> &str {
        "SM-2"
    }

    /// Starting state for new cards.
    pub fn initial_state(&self) -> SchedulingState {
        SchedulingState {
            interval: 1,
            repetitions: 0,
            easiness_factor: self.initial_ease,
        }
    }

    /// Compute the state after one review at `now`.
    ///
    /// Interval growth uses the easiness factor from *before* this review.
    pub fn next_state(
        &self,
        current: &SchedulingState,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> SchedulerResult<ReviewOutcome> {
        current.validate()?;

        let (interval, repetitions) = if quality.is_success() {
            let interval = match current.repetitions {
                0 => 1,
                1 => 6,
                _ => grow_interval(current.interval, current.easiness_factor)?,
            };
            let repetitions = current.repetitions.checked_add(1).ok_or_else(|| {
                SchedulerError::InvalidInput("repetition count overflow".to_string())
            })?;
            (interval, repetitions)
        } else {
            (1, 0)
        };

        let easiness_factor = next_easiness_factor(current.easiness_factor, quality);

        let next_review_at = now
            .checked_add_signed(Duration::days(i64::from(interval)))
            .ok_or_else(|| {
                SchedulerError::InvalidInput(format!(
                    "next review date out of range for interval of {interval} days"
                ))
            })?;

        Ok(ReviewOutcome {
            interval,
            repetitions,
            easiness_factor,
            next_review_at,
        })
    }
}

/// EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), floored at 1.3.
fn next_easiness_factor(easiness_factor: f64, quality: Quality) -> f64 {
    let miss = f64::from(Quality::MAX - quality.value());
    (easiness_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASINESS_FACTOR)
}

fn grow_interval(interval: u32, easiness_factor: f64) -> SchedulerResult<u32> {
    let grown = (f64::from(interval) * easiness_factor).round();
    if grown > f64::from(u32::MAX) {
        return Err(SchedulerError::InvalidInput(format!(
            "interval of {interval} days grown by {easiness_factor} does not fit"
        )));
    }
    // Easiness below 1.3 can only come from a caller-supplied state.
    Ok((grown as u32).max(1))
}

/// SM-2 bound to a clock.
#[derive(Clone)]
pub struct ReviewScheduler {
    algorithm: Sm2,
    clock: Arc<dyn Clock>,
}

impl ReviewScheduler {
    pub fn new(algorithm: Sm2, clock: Arc<dyn Clock>) -> Self {
        Self { algorithm, clock }
    }

    /// Scheduler reading the wall clock.
    pub fn with_system_clock(algorithm: Sm2) -> Self {
        Self::new(algorithm, Arc::new(SystemClock))
    }

    pub fn algorithm(&self) -> &Sm2 {
        &self.algorithm
    }

    /// Current instant according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Next scheduling state for a raw quality rating.
    ///
    /// Fails with [`SchedulerError::InvalidInput`] before computing anything
    /// if `quality` is outside `[0, 5]` or `current` is malformed.
    pub fn compute_next_review_state(
        &self,
        current: &SchedulingState,
        quality: i64,
    ) -> SchedulerResult<ReviewOutcome> {
        let quality = Quality::new(quality)?;
        let outcome = self.algorithm.next_state(current, quality, self.clock.now())?;
        debug!(
            quality = quality.value(),
            interval = outcome.interval,
            repetitions = outcome.repetitions,
            easiness_factor = outcome.easiness_factor,
            "computed next review state"
        );
        Ok(outcome)
    }

    /// Updated copy of `card` after a review.
    pub fn review(&self, card: &Flashcard, quality: Quality) -> SchedulerResult<Flashcard> {
        let now = self.clock.now();
        let outcome = self.algorithm.next_state(&card.scheduling_state(), quality, now)?;
        debug!(card_id = %card.id, quality = quality.value(), interval = outcome.interval, "scheduled card");
        Ok(card.apply(&outcome, now))
    }

    /// Interval each rating would produce, lowest rating first.
    pub fn preview(&self, current: &SchedulingState) -> SchedulerResult<Vec<(Quality, u32)>> {
        let now = self.clock.now();
        Quality::all()
            .map(|q| Ok((q, self.algorithm.next_state(current, q, now)?.interval)))
            .collect()
    }
}
