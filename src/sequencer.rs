//! Visiting-order construction for a courier's stops.
//!
//! Nearest neighbor with a deadline-urgency pre-filter: a stop whose time
//! window opens soon and can still be reached before it opens is visited
//! ahead of closer stops. This is a heuristic; use
//! [`Sequencer::can_complete_within_time_windows`] to check a result before
//! committing to it.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, SequencingError};
use crate::estimate::{DEFAULT_SPEED_KMH, Estimator};
use crate::haversine::distance_between;
use crate::model::{AssignmentTasks, Task, TaskId};
use crate::traits::{Clock, SystemClock};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequencerOptions {
    /// Average courier speed used for every travel-time estimate.
    pub speed_kmh: f64,
    /// A stop reachable this many minutes (or fewer) before its window opens
    /// is urgent.
    pub urgency_horizon_minutes: i64,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
            urgency_horizon_minutes: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sequencer<C = SystemClock> {
    options: SequencerOptions,
    estimator: Estimator,
    clock: C,
}

impl Sequencer<SystemClock> {
    pub fn new(options: SequencerOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }
}

impl Default for Sequencer<SystemClock> {
    fn default() -> Self {
        Self::new(SequencerOptions::default())
    }
}

impl<C: Clock> Sequencer<C> {
    pub fn with_clock(options: SequencerOptions, clock: C) -> Self {
        let estimator = Estimator::new(options.speed_kmh);
        Self {
            options,
            estimator,
            clock,
        }
    }

    pub fn options(&self) -> &SequencerOptions {
        &self.options
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    /// Order `tasks` for visiting. The result is a permutation of the input.
    ///
    /// The first stop is the task whose window opens earliest, or the first
    /// task when none has a window. Callers are expected to pass only active
    /// tasks; see [`Self::determine_optimal_sequence_for_assignment`].
    pub fn determine_optimal_sequence(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        if tasks.len() <= 1 {
            return tasks;
        }

        let seed = tasks
            .iter()
            .enumerate()
            .filter_map(|(index, task)| task.start_time_window.map(|start| (index, start)))
            .min_by_key(|(_, start)| *start)
            .map(|(index, _)| index)
            .unwrap_or(0);

        let first = tasks.remove(seed);
        self.sequence_from(first, tasks, self.clock.now())
    }

    /// Order the assignment's active tasks (everything not Completed or
    /// Cancelled).
    pub fn determine_optimal_sequence_for_assignment(
        &self,
        assignment: &AssignmentTasks,
    ) -> Vec<Task> {
        let active = assignment.active_tasks().into_iter().cloned().collect();
        self.determine_optimal_sequence(active)
    }

    /// Order `tasks` after a fixed first stop, typically where the courier is
    /// right now. The anchor is the first element of the result.
    pub fn determine_sequence_from(&self, anchor: Task, tasks: Vec<Task>) -> Vec<Task> {
        self.sequence_from(anchor, tasks, self.clock.now())
    }

    /// Sequence independent task sets (one per courier run) in parallel.
    pub fn sequence_many(&self, task_sets: Vec<Vec<Task>>) -> Vec<Vec<Task>>
    where
        C: Sync,
    {
        task_sets
            .into_par_iter()
            .map(|tasks| self.determine_optimal_sequence(tasks))
            .collect()
    }

    fn sequence_from(
        &self,
        first: Task,
        mut remaining: Vec<Task>,
        now: DateTime<Utc>,
    ) -> Vec<Task> {
        let mut ordered = Vec::with_capacity(remaining.len() + 1);
        let mut clock = now + Duration::minutes(first.duration_minutes());
        let mut current = first;

        while !remaining.is_empty() {
            let index = self.pick_next(&current, &remaining, clock);
            let next = remaining.remove(index);
            clock += Duration::minutes(next.duration_minutes());
            ordered.push(std::mem::replace(&mut current, next));
        }
        ordered.push(current);

        ordered
    }

    /// Index into `remaining` of the stop to visit after `current`.
    fn pick_next(&self, current: &Task, remaining: &[Task], clock: DateTime<Utc>) -> usize {
        let horizon = Duration::minutes(self.options.urgency_horizon_minutes);
        let distance =
            |task: &Task| distance_between(current.location.as_ref(), task.location.as_ref());

        let urgent = remaining
            .iter()
            .enumerate()
            .filter_map(|(index, task)| {
                let window_start = task.start_time_window?;
                let arrival = clock + Duration::minutes(self.estimator.leg_minutes(current, task));
                (arrival <= window_start && window_start - arrival < horizon)
                    .then_some((index, window_start))
            })
            .min_by(|(a, a_start), (b, b_start)| {
                a_start
                    .cmp(b_start)
                    .then_with(|| distance(&remaining[*a]).total_cmp(&distance(&remaining[*b])))
            });

        if let Some((index, window_start)) = urgent {
            debug!(
                from = %current.id,
                to = %remaining[index].id,
                %window_start,
                "picked urgent stop"
            );
            return index;
        }

        let nearest = remaining
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| distance(*a).total_cmp(&distance(*b)))
            .map(|(index, _)| index)
            .unwrap_or(0);

        debug!(
            from = %current.id,
            to = %remaining[nearest].id,
            km = distance(&remaining[nearest]),
            "picked nearest stop"
        );
        nearest
    }

    /// True iff `ordered` is exactly the assignment's active task set, each
    /// task once, in any order.
    pub fn is_valid_sequence(&self, assignment: &AssignmentTasks, ordered: &[Task]) -> bool {
        self.validate_sequence(assignment, ordered).is_ok()
    }

    /// Like [`Self::is_valid_sequence`] but says what is wrong.
    pub fn validate_sequence(&self, assignment: &AssignmentTasks, ordered: &[Task]) -> Result<()> {
        let ids: Vec<TaskId> = ordered.iter().map(|task| task.id).collect();
        if let Some(foreign) = ordered.iter().find(|task| task.assignment_id != assignment.id()) {
            return Err(SequencingError::InvalidSequence(format!(
                "task {} belongs to assignment {}, not {}",
                foreign.id,
                foreign.assignment_id,
                assignment.id()
            )));
        }
        ensure_permutation(&ids, assignment.active_tasks().iter().map(|task| task.id))
    }

    /// Number the proposed order 1..N and write it into `assignment`.
    ///
    /// Nothing is changed when the order is not a valid sequence. Returns the
    /// renumbered tasks in visiting order.
    pub fn apply_sequence(
        &self,
        assignment: &mut AssignmentTasks,
        ordered: &[Task],
    ) -> Result<Vec<Task>> {
        self.validate_sequence(assignment, ordered)?;

        let order: Vec<TaskId> = ordered.iter().map(|task| task.id).collect();
        let now = self.clock.now();
        for task in assignment.tasks.iter_mut() {
            if let Some(position) = order.iter().position(|id| *id == task.id) {
                task.sequence = position as u32 + 1;
                task.updated_at = now;
            }
        }
        assignment.tasks.sort_by_key(Task::sequence_key);

        let applied = order
            .iter()
            .filter_map(|id| assignment.task(id).cloned())
            .collect();
        Ok(applied)
    }

    pub fn estimate_travel_time<T: AsRef<Task>>(&self, tasks: &[T]) -> i64 {
        self.estimator.estimate_travel_time(tasks)
    }

    pub fn estimate_distance<T: AsRef<Task>>(&self, tasks: &[T]) -> f64 {
        self.estimator.estimate_distance(tasks)
    }

    pub fn can_complete_within_time_windows<T: AsRef<Task>>(
        &self,
        tasks: &[T],
        start_time: DateTime<Utc>,
    ) -> bool {
        let violation = self.estimator.first_violation(tasks, start_time);
        if let Some(index) = violation {
            warn!(
                task_id = %tasks[index].as_ref().id,
                position = index + 1,
                "sequence misses a time window"
            );
        }
        violation.is_none()
    }
}

/// Check that `ids` names every member of `expected` exactly once.
pub(crate) fn ensure_permutation(
    ids: &[TaskId],
    expected: impl IntoIterator<Item = TaskId>,
) -> Result<()> {
    let expected: HashSet<TaskId> = expected.into_iter().collect();
    if ids.len() != expected.len() {
        return Err(SequencingError::InvalidSequence(format!(
            "expected {} tasks, got {}",
            expected.len(),
            ids.len()
        )));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !expected.contains(id) {
            return Err(SequencingError::InvalidSequence(format!(
                "task {id} is not part of the sequence being reordered"
            )));
        }
        if !seen.insert(*id) {
            return Err(SequencingError::InvalidSequence(format!(
                "task {id} appears more than once"
            )));
        }
    }

    Ok(())
}
