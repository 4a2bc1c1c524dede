//! Error taxonomy for the combat core
//!
//! Only [`CombatError`] crosses the public `advance()` boundary. Validation and
//! resolution failures are absorbed by the state machine (re-prompt or
//! zero-effect), provider failures degrade to fallbacks.

use std::time::Duration;

use thiserror::Error;

use crate::combat::EntityId;

/// Errors surfaced to the caller driving the state machine
#[derive(Debug, Error)]
pub enum CombatError {
    /// An invariant was violated; combat must be aborted
    #[error("fatal state corruption: {0}")]
    FatalStateCorruption(String),

    /// Snapshot requested while display events are still pending
    #[error("not at a step boundary ({pending} display events still queued)")]
    NotAtStepBoundary { pending: usize },

    /// Combat cannot start with the given participants
    #[error("invalid roster: {0}")]
    InvalidRoster(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<figment::Error> for CombatError {
    fn from(err: figment::Error) -> Self {
        CombatError::Config(err.to_string())
    }
}

/// An intent that cannot be carried out as proposed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed intent: {0}")]
    Malformed(String),

    #[error("{actor} does not know how to use {name}")]
    UnknownAction { actor: EntityId, name: String },

    #[error("no such target: {0}")]
    UnknownTarget(EntityId),

    #[error("{0} is already defeated")]
    TargetDefeated(EntityId),

    #[error("{actor} has no {item} left")]
    OutOfItem { actor: EntityId, item: String },

    #[error("it is not {0}'s turn")]
    NotYourTurn(EntityId),

    #[error("{0}")]
    Illegal(String),
}

/// Unexpected data met while resolving an action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("bad dice notation {notation:?}: {reason}")]
    BadNotation { notation: String, reason: String },

    #[error("effect atom {index} has no damage type")]
    MissingDamageType { index: usize },

    #[error("effect atom {index} has no status template")]
    MissingStatus { index: usize },

    #[error("effect atom {index} has no resource")]
    MissingResource { index: usize },

    #[error("no definition for {0}")]
    UnknownDefinition(String),
}

/// Failure of an external intent provider or narrator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider returned an invalid payload: {0}")]
    Malformed(#[from] ValidationError),
}

/// Ledger access errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger has no entity {0}")]
    UnknownEntity(EntityId),
}

impl From<LedgerError> for ResolutionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UnknownEntity(id) => ResolutionError::UnknownEntity(id),
        }
    }
}

pub type Result<T> = std::result::Result<T, CombatError>;
