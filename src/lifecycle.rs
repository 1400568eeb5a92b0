//! Task and assignment state machines.
//!
//! Task transitions:
//! - Pending -> InProgress | Cancelled
//! - InProgress -> Completed | Failed | Delayed | Cancelled | Arrived
//! - Arrived -> Completed | Failed | Cancelled
//! - Delayed -> InProgress | Failed | Cancelled
//!
//! Completed, Failed and Cancelled are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencingError};
use crate::model::Task;

/// Status of a single pickup/delivery stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    /// Courier is on site; used by task kinds that need a hand-off step.
    Arrived,
    /// Recoverable detour from InProgress.
    Delayed,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        Self::Pending,
        Self::InProgress,
        Self::Arrived,
        Self::Delayed,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// No transition out of a terminal state is permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Candidates for resequencing: everything except Completed and Cancelled.
    /// Failed tasks remain in the active set.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn allowed_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[
                Self::Completed,
                Self::Failed,
                Self::Delayed,
                Self::Cancelled,
                Self::Arrived,
            ],
            Self::Arrived => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Delayed => &[Self::InProgress, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Arrived => write!(f, "arrived"),
            Self::Delayed => write!(f, "delayed"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "arrived" => Ok(Self::Arrived),
            "delayed" => Ok(Self::Delayed),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

/// Status of a courier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn can_transition_to(&self, to: AssignmentStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Cancelled)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Cancelled)
        )
    }

    pub fn transition(&self, to: AssignmentStatus) -> Result<AssignmentStatus> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(SequencingError::InvalidAssignmentTransition { from: *self, to })
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Move `task` to `to`, stamping the timestamp that belongs to the new state.
///
/// `reason` is appended to the task notes when entering Failed. On error the
/// task is left untouched.
pub fn transition(
    task: &mut Task,
    to: TaskStatus,
    at: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<()> {
    let from = task.status;
    if !from.can_transition_to(to) {
        return Err(SequencingError::InvalidTransition { from, to });
    }

    task.status = to;
    match to {
        TaskStatus::InProgress => task.started_at = Some(at),
        TaskStatus::Completed => {
            task.completed_at = Some(at);
            if let Some(scheduled) = task.scheduled_time {
                task.actual_duration_minutes = Some((at - scheduled).num_minutes());
            }
        }
        TaskStatus::Failed => {
            task.failed_at = Some(at);
            if let Some(reason) = reason {
                append_note(task, reason);
            }
        }
        _ => {}
    }
    task.updated_at = at;

    Ok(())
}

/// Deletion is refused while the courier is working the task or after it was
/// delivered.
pub fn ensure_deletable(task: &Task) -> Result<()> {
    match task.status {
        TaskStatus::InProgress | TaskStatus::Completed => Err(SequencingError::InvalidState(
            format!("task {} cannot be deleted while {}", task.id, task.status),
        )),
        _ => Ok(()),
    }
}

fn append_note(task: &mut Task, note: &str) {
    match task.notes.as_mut() {
        Some(notes) if !notes.is_empty() => {
            notes.push('\n');
            notes.push_str(note);
        }
        _ => task.notes = Some(note.to_string()),
    }
}
