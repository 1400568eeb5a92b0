//! In-memory task repository.
//!
//! Tasks and assignments live in flat maps keyed by id; tasks point at their
//! assignment through `assignment_id`. Writes are checked against the stored
//! version, so a caller working from a stale read gets a conflict instead of
//! overwriting a newer record.

use std::collections::HashMap;

use crate::error::RepositoryError;
use crate::model::{Assignment, AssignmentId, Task, TaskId};
use crate::traits::TaskRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    assignments: HashMap<AssignmentId, Assignment>,
    tasks: HashMap<TaskId, Task>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

fn check_version(
    entity: &'static str,
    id: impl ToString,
    stored: Option<u64>,
    incoming: u64,
) -> Result<(), RepositoryError> {
    match stored {
        Some(found) if found != incoming => Err(RepositoryError::VersionConflict {
            entity,
            id: id.to_string(),
            expected: incoming,
            found,
        }),
        _ => Ok(()),
    }
}

impl TaskRepository for InMemoryStore {
    fn find_assignment_by_id(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<Assignment>, RepositoryError> {
        Ok(self.assignments.get(id).cloned())
    }

    fn find_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.tasks.get(id).cloned())
    }

    fn find_tasks_by_assignment(&self, id: &AssignmentId) -> Result<Vec<Task>, RepositoryError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|task| task.assignment_id == *id)
            .cloned()
            .collect();
        tasks.sort_by_key(Task::sequence_key);
        Ok(tasks)
    }

    fn max_sequence_number_in_assignment(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<u32>, RepositoryError> {
        Ok(self
            .tasks
            .values()
            .filter(|task| task.assignment_id == *id)
            .map(|task| task.sequence)
            .max())
    }

    fn save_task(&mut self, mut task: Task) -> Result<Task, RepositoryError> {
        let stored = self.tasks.get(&task.id).map(|t| t.version);
        check_version("task", task.id, stored, task.version)?;

        task.version += 1;
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    fn save_assignment(
        &mut self,
        mut assignment: Assignment,
    ) -> Result<Assignment, RepositoryError> {
        let stored = self.assignments.get(&assignment.id).map(|a| a.version);
        check_version("assignment", assignment.id, stored, assignment.version)?;

        assignment.version += 1;
        self.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    fn delete_task(&mut self, id: &TaskId) -> Result<(), RepositoryError> {
        self.tasks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "task",
                id: id.to_string(),
            })
    }

    fn save_tasks(
        &mut self,
        mut assignment: Assignment,
        tasks: Vec<Task>,
        deleted: &[TaskId],
    ) -> Result<(Assignment, Vec<Task>), RepositoryError> {
        let stored = self.assignments.get(&assignment.id).map(|a| a.version);
        check_version("assignment", assignment.id, stored, assignment.version)?;
        for task in &tasks {
            let stored = self.tasks.get(&task.id).map(|t| t.version);
            check_version("task", task.id, stored, task.version)?;
        }
        if let Some(missing) = deleted.iter().find(|id| !self.tasks.contains_key(*id)) {
            return Err(RepositoryError::NotFound {
                entity: "task",
                id: missing.to_string(),
            });
        }

        for id in deleted {
            self.tasks.remove(id);
        }
        let saved = tasks
            .into_iter()
            .map(|mut task| {
                task.version += 1;
                self.tasks.insert(task.id, task.clone());
                task
            })
            .collect();

        assignment.version += 1;
        self.assignments.insert(assignment.id, assignment.clone());
        Ok((assignment, saved))
    }
}
