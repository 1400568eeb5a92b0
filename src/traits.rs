//! Collaborator seams for the sequencing core.
//!
//! The core does no I/O of its own. Persistence and the notion of "now" are
//! supplied by the host through these traits.

use chrono::{DateTime, Utc};

use crate::error::RepositoryError;
use crate::model::{Assignment, AssignmentId, Task, TaskId};

/// Storage for tasks and assignments.
///
/// Implementations must reject stale writes (a `version` that no longer
/// matches the stored record) with [`RepositoryError::VersionConflict`] so two
/// resequencing runs on the same assignment cannot silently overwrite each
/// other. Writes touching several tasks of one assignment go through
/// [`TaskRepository::save_tasks`], which must apply all of them or none.
pub trait TaskRepository {
    fn find_assignment_by_id(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<Assignment>, RepositoryError>;

    fn find_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError>;

    /// Every task referencing the assignment, terminal ones included, in no
    /// particular order.
    fn find_tasks_by_assignment(&self, id: &AssignmentId) -> Result<Vec<Task>, RepositoryError>;

    /// Highest sequence number in the assignment, `None` when it has no tasks.
    fn max_sequence_number_in_assignment(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<u32>, RepositoryError>;

    /// Persist and return the stored copy (with its new version).
    fn save_task(&mut self, task: Task) -> Result<Task, RepositoryError>;

    fn save_assignment(&mut self, assignment: Assignment) -> Result<Assignment, RepositoryError>;

    fn delete_task(&mut self, id: &TaskId) -> Result<(), RepositoryError>;

    /// Save `tasks` and delete `deleted` as one unit, together with
    /// `assignment`.
    ///
    /// The assignment's version and every task's version are checked before
    /// anything is written; on error the store is left untouched. The
    /// assignment is always written back with a new version, so two writers
    /// working from the same read of an assignment conflict even when they
    /// touch different tasks. Returns the stored assignment and the stored
    /// tasks in input order.
    fn save_tasks(
        &mut self,
        assignment: Assignment,
        tasks: Vec<Task>,
        deleted: &[TaskId],
    ) -> Result<(Assignment, Vec<Task>), RepositoryError>;
}

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
