//! Task orchestration for courier assignments.
//!
//! Loads records from the repository, runs lifecycle checks or the sequencer
//! on owned copies, then saves the results back. Anything that touches more
//! than one record of an assignment is written through a single
//! [`TaskRepository::save_tasks`] call, so the repository's version check
//! rejects interleaved writers before any of it lands.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Result, SequencingError};
use crate::lifecycle::{self, AssignmentStatus, TaskStatus};
use crate::model::{Assignment, AssignmentId, AssignmentTasks, CourierId, NewTask, Task, TaskId};
use crate::sequencer::{Sequencer, SequencerOptions, ensure_permutation};
use crate::traits::{Clock, SystemClock, TaskRepository};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    /// Reject task locations outside lat [-90, 90] / lon [-180, 180].
    pub validate_coordinates: bool,
    pub sequencer: SequencerOptions,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            validate_coordinates: true,
            sequencer: SequencerOptions::default(),
        }
    }
}

/// Result of re-sequencing an assignment.
#[derive(Debug, Clone)]
pub struct SequencePlan {
    /// Active tasks in their new visiting order.
    pub tasks: Vec<Task>,
    pub total_distance_km: f64,
    pub total_minutes: i64,
    /// Whether every end window is met when starting at the plan's start time.
    pub feasible: bool,
}

pub struct AssignmentTaskService<R, C = SystemClock> {
    repository: R,
    sequencer: Sequencer<C>,
    clock: C,
    options: ServiceOptions,
}

impl<R: TaskRepository> AssignmentTaskService<R, SystemClock> {
    pub fn new(repository: R, options: ServiceOptions) -> Self {
        Self::with_clock(repository, options, SystemClock)
    }
}

impl<R: TaskRepository, C: Clock + Clone> AssignmentTaskService<R, C> {
    pub fn with_clock(repository: R, options: ServiceOptions, clock: C) -> Self {
        let sequencer = Sequencer::with_clock(options.sequencer.clone(), clock.clone());
        Self {
            repository,
            sequencer,
            clock,
            options,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn sequencer(&self) -> &Sequencer<C> {
        &self.sequencer
    }

    pub fn into_repository(self) -> R {
        self.repository
    }

    pub fn create_assignment(&mut self, courier_id: CourierId) -> Result<Assignment> {
        let assignment = Assignment::new(courier_id, self.clock.now());
        let saved = self.repository.save_assignment(assignment)?;
        info!(assignment_id = %saved.id, courier_id = %courier_id, "assignment created");
        Ok(saved)
    }

    /// The assignment with all of its tasks, ordered by sequence number.
    pub fn load_assignment(&self, assignment_id: AssignmentId) -> Result<AssignmentTasks> {
        let assignment = self.assignment(assignment_id)?;
        let tasks = self.repository.find_tasks_by_assignment(&assignment_id)?;
        Ok(AssignmentTasks::new(assignment, tasks))
    }

    /// Add a stop to an assignment.
    ///
    /// Status defaults to Pending and sequence to one past the highest
    /// sequence already in the assignment.
    pub fn create_task(&mut self, assignment_id: AssignmentId, new_task: NewTask) -> Result<Task> {
        let assignment = self.assignment(assignment_id)?;
        if assignment.status.is_terminal() {
            return Err(SequencingError::InvalidState(format!(
                "assignment {} is {} and accepts no new tasks",
                assignment.id, assignment.status
            )));
        }

        validate_window(new_task.start_time_window, new_task.end_time_window)?;
        if self.options.validate_coordinates {
            if let Some(location) = &new_task.location {
                location.validate()?;
            }
        }

        let next_sequence = self
            .repository
            .max_sequence_number_in_assignment(&assignment_id)?
            .map(|max| max + 1)
            .unwrap_or(1);

        let task = new_task.into_task(assignment_id, next_sequence, self.clock.now());
        let saved = self.commit_task(assignment, task)?;
        info!(
            task_id = %saved.id,
            assignment_id = %assignment_id,
            sequence = saved.sequence,
            "task created"
        );
        Ok(saved)
    }

    pub fn update_task_window(
        &mut self,
        task_id: TaskId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Task> {
        validate_window(start, end)?;

        let mut task = self.task(task_id)?;
        if task.status.is_terminal() {
            return Err(SequencingError::InvalidState(format!(
                "task {} is {}",
                task.id, task.status
            )));
        }
        task.start_time_window = start;
        task.end_time_window = end;
        task.updated_at = self.clock.now();

        Ok(self.repository.save_task(task)?)
    }

    /// Move a task to `new_status`, stamping the matching timestamp.
    pub fn update_task_status(&mut self, task_id: TaskId, new_status: TaskStatus) -> Result<Task> {
        self.transition_task(task_id, new_status, None)
    }

    pub fn start_task(&mut self, task_id: TaskId) -> Result<Task> {
        self.update_task_status(task_id, TaskStatus::InProgress)
    }

    pub fn mark_arrived(&mut self, task_id: TaskId) -> Result<Task> {
        self.update_task_status(task_id, TaskStatus::Arrived)
    }

    pub fn mark_delayed(&mut self, task_id: TaskId) -> Result<Task> {
        self.update_task_status(task_id, TaskStatus::Delayed)
    }

    pub fn cancel_task(&mut self, task_id: TaskId) -> Result<Task> {
        self.update_task_status(task_id, TaskStatus::Cancelled)
    }

    /// Complete a task that is InProgress or Arrived.
    pub fn complete_task(&mut self, task_id: TaskId) -> Result<Task> {
        let task = self.task(task_id)?;
        if !task.status.can_transition_to(TaskStatus::Completed) {
            return Err(SequencingError::InvalidState(format!(
                "task {} cannot be completed while {}",
                task.id, task.status
            )));
        }
        self.transition_task(task_id, TaskStatus::Completed, None)
    }

    /// Fail a task that is InProgress, Arrived or Delayed, recording `reason`.
    pub fn fail_task(&mut self, task_id: TaskId, reason: &str) -> Result<Task> {
        let task = self.task(task_id)?;
        if !task.status.can_transition_to(TaskStatus::Failed) {
            return Err(SequencingError::InvalidState(format!(
                "task {} cannot be failed while {}",
                task.id, task.status
            )));
        }
        self.transition_task(task_id, TaskStatus::Failed, Some(reason))
    }

    /// The task and the assignment status it implies are saved together.
    fn transition_task(
        &mut self,
        task_id: TaskId,
        to: TaskStatus,
        reason: Option<&str>,
    ) -> Result<Task> {
        let assignment_id = self.task(task_id)?.assignment_id;
        let AssignmentTasks {
            mut assignment,
            mut tasks,
        } = self.load_assignment(assignment_id)?;

        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| SequencingError::task_not_found(task_id))?;
        let from = task.status;
        lifecycle::transition(task, to, self.clock.now(), reason)?;
        let updated = task.clone();

        let change = self.follow_tasks(&mut assignment, &tasks)?;
        let saved = self.commit_task(assignment, updated)?;
        info!(task_id = %task_id, %from, %to, "task status changed");
        log_status_change(assignment_id, change);
        Ok(saved)
    }

    /// Remove a task and close the gap it leaves in the sequence.
    ///
    /// Remaining tasks are renumbered 1..N in their existing order. The
    /// deletion and the renumbering are written as one unit.
    pub fn delete_task(&mut self, task_id: TaskId) -> Result<()> {
        let task = self.task(task_id)?;
        lifecycle::ensure_deletable(&task)?;

        let AssignmentTasks {
            mut assignment,
            tasks,
        } = self.load_assignment(task.assignment_id)?;
        let mut remaining: Vec<Task> = tasks.into_iter().filter(|t| t.id != task_id).collect();

        let now = self.clock.now();
        let mut renumbered = Vec::new();
        for (position, remaining_task) in remaining.iter_mut().enumerate() {
            let sequence = position as u32 + 1;
            if remaining_task.sequence != sequence {
                remaining_task.sequence = sequence;
                remaining_task.updated_at = now;
                renumbered.push(remaining_task.clone());
            }
        }

        let change = self.follow_tasks(&mut assignment, &remaining)?;
        self.commit(assignment, renumbered, &[task_id])?;
        info!(
            task_id = %task_id,
            assignment_id = %task.assignment_id,
            remaining = remaining.len(),
            "task deleted"
        );
        log_status_change(task.assignment_id, change);
        Ok(())
    }

    /// Reorder every task in the assignment, terminal ones included.
    ///
    /// `ordered_ids` must name each task of the assignment exactly once.
    pub fn resequence_all_tasks(
        &mut self,
        assignment_id: AssignmentId,
        ordered_ids: &[TaskId],
    ) -> Result<Vec<Task>> {
        let loaded = self.load_assignment(assignment_id)?;
        let ordered = self.pick_tasks(&loaded, ordered_ids)?;
        ensure_permutation(ordered_ids, loaded.tasks.iter().map(|task| task.id))?;

        let now = self.clock.now();
        let renumbered = ordered
            .into_iter()
            .enumerate()
            .map(|(position, mut task)| {
                task.sequence = position as u32 + 1;
                task.updated_at = now;
                task
            })
            .collect();
        let (_, saved) = self.commit(loaded.assignment, renumbered, &[])?;

        info!(assignment_id = %assignment_id, tasks = saved.len(), "assignment resequenced");
        Ok(saved)
    }

    /// Reorder the assignment's active tasks (not Completed or Cancelled).
    ///
    /// Terminal tasks keep their sequence numbers.
    pub fn resequence_active_tasks(
        &mut self,
        assignment_id: AssignmentId,
        ordered_ids: &[TaskId],
    ) -> Result<Vec<Task>> {
        let mut loaded = self.load_assignment(assignment_id)?;
        let ordered = self.pick_tasks(&loaded, ordered_ids)?;

        let applied = self.sequencer.apply_sequence(&mut loaded, &ordered)?;
        let (_, saved) = self.commit(loaded.assignment, applied, &[])?;

        info!(assignment_id = %assignment_id, tasks = saved.len(), "active tasks resequenced");
        Ok(saved)
    }

    /// Run the sequencer over the assignment's active tasks and persist the
    /// order it finds.
    ///
    /// Feasibility is evaluated from `start_time`, or now when absent. An
    /// infeasible plan is still applied; check [`SequencePlan::feasible`].
    pub fn optimize_assignment(
        &mut self,
        assignment_id: AssignmentId,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<SequencePlan> {
        let mut loaded = self.load_assignment(assignment_id)?;

        let proposed = self.sequencer.determine_optimal_sequence_for_assignment(&loaded);
        let applied = self.sequencer.apply_sequence(&mut loaded, &proposed)?;
        let (_, tasks) = self.commit(loaded.assignment, applied, &[])?;

        let start_time = start_time.unwrap_or_else(|| self.clock.now());
        let plan = SequencePlan {
            total_distance_km: self.sequencer.estimate_distance(&tasks),
            total_minutes: self.sequencer.estimate_travel_time(&tasks),
            feasible: self.sequencer.can_complete_within_time_windows(&tasks, start_time),
            tasks,
        };

        info!(
            assignment_id = %assignment_id,
            tasks = plan.tasks.len(),
            km = plan.total_distance_km,
            minutes = plan.total_minutes,
            feasible = plan.feasible,
            "assignment optimized"
        );
        Ok(plan)
    }

    /// Cancel the assignment and every task that has not reached a terminal
    /// state.
    pub fn cancel_assignment(&mut self, assignment_id: AssignmentId) -> Result<Assignment> {
        let AssignmentTasks {
            mut assignment,
            tasks,
        } = self.load_assignment(assignment_id)?;
        assignment.status = assignment.status.transition(AssignmentStatus::Cancelled)?;

        let now = self.clock.now();
        let mut cancelled = Vec::new();
        for mut task in tasks {
            if task.status.is_terminal() {
                continue;
            }
            lifecycle::transition(&mut task, TaskStatus::Cancelled, now, None)?;
            cancelled.push(task);
        }

        assignment.updated_at = now;
        let (saved, tasks) = self.commit(assignment, cancelled, &[])?;
        info!(assignment_id = %assignment_id, tasks = tasks.len(), "assignment cancelled");
        Ok(saved)
    }

    /// Bring the assignment's status in line with `tasks`: InProgress once any
    /// task has been started, and once every task is terminal, Completed if at
    /// least one was completed or Cancelled otherwise.
    ///
    /// Returns the `(from, to)` pair when the status changed.
    fn follow_tasks(
        &self,
        assignment: &mut Assignment,
        tasks: &[Task],
    ) -> Result<Option<(AssignmentStatus, AssignmentStatus)>> {
        if assignment.status.is_terminal() {
            return Ok(None);
        }

        let started = tasks
            .iter()
            .any(|task| !matches!(task.status, TaskStatus::Pending | TaskStatus::Cancelled));
        let finished = !tasks.is_empty() && tasks.iter().all(|task| task.status.is_terminal());
        let completed = tasks.iter().any(|task| task.status == TaskStatus::Completed);

        let mut status = assignment.status;
        if status == AssignmentStatus::Pending && started {
            status = status.transition(AssignmentStatus::InProgress)?;
        }
        if finished {
            let target = if completed {
                AssignmentStatus::Completed
            } else {
                AssignmentStatus::Cancelled
            };
            status = status.transition(target)?;
        }

        if status == assignment.status {
            return Ok(None);
        }
        let from = assignment.status;
        assignment.status = status;
        assignment.updated_at = self.clock.now();
        Ok(Some((from, status)))
    }

    /// Tasks of `loaded` in the order of `ids`. Ids from another assignment
    /// are an invalid sequence; unknown ids are not found.
    fn pick_tasks(&self, loaded: &AssignmentTasks, ids: &[TaskId]) -> Result<Vec<Task>> {
        let mut picked = Vec::with_capacity(ids.len());
        for id in ids {
            match loaded.task(id) {
                Some(task) => picked.push(task.clone()),
                None => {
                    let task = self.task(*id)?;
                    return Err(SequencingError::InvalidSequence(format!(
                        "task {} belongs to assignment {}, not {}",
                        task.id,
                        task.assignment_id,
                        loaded.id()
                    )));
                }
            }
        }
        Ok(picked)
    }

    /// Write the assignment and its changed tasks in one repository call.
    fn commit(
        &mut self,
        assignment: Assignment,
        tasks: Vec<Task>,
        deleted: &[TaskId],
    ) -> Result<(Assignment, Vec<Task>)> {
        let assignment_id = assignment.id;
        let count = tasks.len();
        self.repository
            .save_tasks(assignment, tasks, deleted)
            .map_err(|err| {
                warn!(%assignment_id, tasks = count, error = %err, "assignment write rejected");
                SequencingError::from(err)
            })
    }

    fn commit_task(&mut self, assignment: Assignment, task: Task) -> Result<Task> {
        let task_id = task.id;
        let (_, mut saved) = self.commit(assignment, vec![task], &[])?;
        saved.pop().ok_or_else(|| SequencingError::task_not_found(task_id))
    }

    fn task(&self, id: TaskId) -> Result<Task> {
        self.repository
            .find_task_by_id(&id)?
            .ok_or_else(|| SequencingError::task_not_found(id))
    }

    fn assignment(&self, id: AssignmentId) -> Result<Assignment> {
        self.repository
            .find_assignment_by_id(&id)?
            .ok_or_else(|| SequencingError::assignment_not_found(id))
    }
}

fn log_status_change(
    assignment_id: AssignmentId,
    change: Option<(AssignmentStatus, AssignmentStatus)>,
) {
    if let Some((from, to)) = change {
        info!(%assignment_id, %from, %to, "assignment status changed");
    }
}

fn validate_window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => {
            Err(SequencingError::InvalidWindow { start, end })
        }
        _ => Ok(()),
    }
}
