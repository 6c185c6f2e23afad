//! Learner sessions.

use review_scheduler::OwnerId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No learner session; pass --user or set FLASHCARD_USER")]
    Unauthenticated,
}

/// Resolves the learner on whose behalf a request runs.
pub trait SessionProvider {
    fn require_session(&self) -> Result<OwnerId, AuthError>;
}

/// Session fixed at startup, e.g. from the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    owner: Option<OwnerId>,
}

impl StaticSession {
    pub fn new(owner: Option<impl Into<OwnerId>>) -> Self {
        let owner = owner
            .map(Into::into)
            .map(|o: OwnerId| o.trim().to_string())
            .filter(|o| !o.is_empty());
        Self { owner }
    }
}

impl SessionProvider for StaticSession {
    fn require_session(&self) -> Result<OwnerId, AuthError> {
        self.owner.clone().ok_or(AuthError::Unauthenticated)
    }
}
