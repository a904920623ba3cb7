use std::fmt;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Item,
    Location,
    Quest,
    Objective,
    Message,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Item => "item",
            Self::Location => "location",
            Self::Quest => "quest",
            Self::Objective => "objective",
            Self::Message => "message",
        })
    }
}

/// Recoverable rejection of a gameplay operation. State is never mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("unknown {kind} '{id}'")]
    NotFound { kind: EntityKind, id: String },
    #[error("{0}")]
    InvalidState(String),
    #[error("inventory full: holding {held} of {capacity}, cannot add {requested} x '{item}'")]
    CapacityExceeded {
        item: String,
        requested: u32,
        held: u32,
        capacity: u32,
    },
    #[error("{kind} '{id}' was already {action}")]
    AlreadyDone {
        kind: EntityKind,
        id: String,
        action: &'static str,
    },
}

impl GameError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::AlreadyDone { .. } => "already_done",
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;

/// Collapses a `try_*` result into the boolean contract, logging the rejection.
pub(crate) fn accepted<T>(operation: &'static str, result: GameResult<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(error) => {
            debug!(operation, reason = error.reason(), error = %error, "operation_rejected");
            false
        }
    }
}
