//! Error types for sequencing and task lifecycle operations.

use thiserror::Error;

use crate::lifecycle::{AssignmentStatus, TaskStatus};

pub type Result<T> = std::result::Result<T, SequencingError>;

/// Errors surfaced by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The record was saved by someone else since it was read.
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },
}

/// Errors returned by the sequencer, the lifecycle and the task service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequencingError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid task transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("invalid assignment transition from {from} to {to}")]
    InvalidAssignmentTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("time window start {start} is after end {end}")]
    InvalidWindow {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    #[error("invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("coordinates out of range: lat {lat}, lon {lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SequencingError {
    pub(crate) fn task_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "task",
            id: id.to_string(),
        }
    }

    pub(crate) fn assignment_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "assignment",
            id: id.to_string(),
        }
    }
}
