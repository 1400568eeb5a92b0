//! Task and assignment records.
//!
//! Tasks reference their assignment by id only. "The tasks of an assignment"
//! is a repository query, materialized as [`AssignmentTasks`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::haversine::GeoPoint;
use crate::lifecycle::{AssignmentStatus, TaskStatus};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_type!(
    /// Identifier of a single stop.
    TaskId
);
id_type!(
    /// Identifier of a courier run.
    AssignmentId
);
id_type!(CourierId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Pickup,
    Delivery,
    Other,
}

/// A pickup or delivery stop within an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub assignment_id: AssignmentId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub location: Option<GeoPoint>,
    pub start_time_window: Option<DateTime<Utc>>,
    pub end_time_window: Option<DateTime<Utc>>,
    pub estimated_duration_minutes: Option<u32>,
    /// 1-based position in the assignment's visiting order.
    pub sequence: u32,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub actual_duration_minutes: Option<i64>,
    /// Newline-separated; failure reasons are appended.
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every save.
    pub version: u64,
}

impl Task {
    /// Estimated service time, 0 when unknown.
    pub fn duration_minutes(&self) -> i64 {
        self.estimated_duration_minutes.map(i64::from).unwrap_or(0)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Sort key for visiting order. Terminal tasks may share a number with an
    /// active one after the active set is resequenced, so ties fall back to
    /// creation time and then id.
    pub fn sequence_key(&self) -> (u32, DateTime<Utc>, TaskId) {
        (self.sequence, self.created_at, self.id)
    }
}

impl AsRef<Task> for Task {
    fn as_ref(&self) -> &Task {
        self
    }
}

/// Input for creating a task. Unset fields are defaulted by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub kind: TaskKind,
    pub status: Option<TaskStatus>,
    pub location: Option<GeoPoint>,
    pub start_time_window: Option<DateTime<Utc>>,
    pub end_time_window: Option<DateTime<Utc>>,
    pub estimated_duration_minutes: Option<u32>,
    pub sequence: Option<u32>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl NewTask {
    pub fn new(kind: TaskKind, location: Option<GeoPoint>) -> Self {
        Self {
            kind,
            status: None,
            location,
            start_time_window: None,
            end_time_window: None,
            estimated_duration_minutes: None,
            sequence: None,
            scheduled_time: None,
            notes: None,
        }
    }

    pub fn delivery(location: Option<GeoPoint>) -> Self {
        Self::new(TaskKind::Delivery, location)
    }

    pub fn pickup(location: Option<GeoPoint>) -> Self {
        Self::new(TaskKind::Pickup, location)
    }

    pub fn window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time_window = Some(start);
        self.end_time_window = Some(end);
        self
    }

    pub fn window_start(mut self, start: DateTime<Utc>) -> Self {
        self.start_time_window = Some(start);
        self
    }

    pub fn window_end(mut self, end: DateTime<Utc>) -> Self {
        self.end_time_window = Some(end);
        self
    }

    pub fn duration(mut self, minutes: u32) -> Self {
        self.estimated_duration_minutes = Some(minutes);
        self
    }

    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(at);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Materialize a task; an explicit `sequence` on the input wins over
    /// `default_sequence`.
    pub fn into_task(
        self,
        assignment_id: AssignmentId,
        default_sequence: u32,
        now: DateTime<Utc>,
    ) -> Task {
        Task {
            id: TaskId::new(),
            assignment_id,
            kind: self.kind,
            status: self.status.unwrap_or(TaskStatus::Pending),
            location: self.location,
            start_time_window: self.start_time_window,
            end_time_window: self.end_time_window,
            estimated_duration_minutes: self.estimated_duration_minutes,
            sequence: self.sequence.unwrap_or(default_sequence),
            scheduled_time: self.scheduled_time,
            started_at: None,
            completed_at: None,
            failed_at: None,
            actual_duration_minutes: None,
            notes: self.notes,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

/// One courier's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub courier_id: CourierId,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Assignment {
    pub fn new(courier_id: CourierId, now: DateTime<Utc>) -> Self {
        Self {
            id: AssignmentId::new(),
            courier_id,
            status: AssignmentStatus::Pending,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

/// An assignment together with every task that references it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentTasks {
    pub assignment: Assignment,
    pub tasks: Vec<Task>,
}

impl AssignmentTasks {
    pub fn new(assignment: Assignment, mut tasks: Vec<Task>) -> Self {
        tasks.sort_by_key(Task::sequence_key);
        Self { assignment, tasks }
    }

    pub fn id(&self) -> AssignmentId {
        self.assignment.id
    }

    /// Tasks that are neither Completed nor Cancelled, in sequence order.
    pub fn active_tasks(&self) -> Vec<&Task> {
        let mut active: Vec<&Task> = self.tasks.iter().filter(|t| t.is_active()).collect();
        active.sort_by_key(|task| task.sequence_key());
        active
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == *id)
    }
}
