use thiserror::Error;
use ulid::Ulid;

use crate::model::{ConflictReport, EntityKind, SessionStatus};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("schedule conflicts: {0}")]
    Conflict(ConflictReport),
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Ulid },
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("time slot {0} is referenced by a schedule and cannot change")]
    TimeSlotInUse(Ulid),
    #[error("session cannot move from {from} to {to}")]
    InvalidTransition { from: SessionStatus, to: SessionStatus },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    WalError(String),
}

impl EngineError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: EntityKind, id: Ulid) -> Self {
        EngineError::NotFound { kind, id }
    }
}
