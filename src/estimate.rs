//! Distance, duration and time-window feasibility of an ordered task list.

use chrono::{DateTime, Duration, Utc};

use crate::haversine::leg_minutes;
use crate::model::Task;

/// Average courier speed assumption for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 30.0;

/// Estimates travel over a fixed visiting order.
///
/// Legs that involve a task without a location contribute nothing.
#[derive(Debug, Clone, Copy)]
pub struct Estimator {
    /// Assumed average speed in km/h.
    pub speed_kmh: f64,
}

impl Default for Estimator {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl Estimator {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Travel minutes between two consecutive stops, rounded up per leg.
    pub fn leg_minutes(&self, from: &Task, to: &Task) -> i64 {
        leg_minutes(from.location.as_ref(), to.location.as_ref(), self.speed_kmh)
    }

    /// Total minutes: travel between consecutive stops plus each stop's
    /// service time. Fewer than two tasks is 0.
    pub fn estimate_travel_time<T: AsRef<Task>>(&self, tasks: &[T]) -> i64 {
        if tasks.len() < 2 {
            return 0;
        }

        let travel: i64 = tasks
            .windows(2)
            .map(|pair| self.leg_minutes(pair[0].as_ref(), pair[1].as_ref()))
            .sum();
        let service: i64 = tasks.iter().map(|t| t.as_ref().duration_minutes()).sum();

        travel + service
    }

    /// Total kilometers between consecutive stops. Fewer than two tasks is 0.
    pub fn estimate_distance<T: AsRef<Task>>(&self, tasks: &[T]) -> f64 {
        tasks
            .windows(2)
            .filter_map(|pair| {
                let from = pair[0].as_ref().location?;
                let to = pair[1].as_ref().location?;
                Some(from.distance_km(&to))
            })
            .sum()
    }

    /// Walk the list once from `start_time` and check every end window.
    ///
    /// Arriving before a window opens waits until it opens. Arriving exactly
    /// at the window end is on time.
    pub fn can_complete_within_time_windows<T: AsRef<Task>>(
        &self,
        tasks: &[T],
        start_time: DateTime<Utc>,
    ) -> bool {
        self.first_violation(tasks, start_time).is_none()
    }

    /// Index of the first task reached after its end window, if any.
    pub fn first_violation<T: AsRef<Task>>(
        &self,
        tasks: &[T],
        start_time: DateTime<Utc>,
    ) -> Option<usize> {
        let mut clock = start_time;
        let mut previous: Option<&Task> = None;

        for (index, task) in tasks.iter().enumerate() {
            let task = task.as_ref();
            if let Some(prev) = previous {
                clock += Duration::minutes(self.leg_minutes(prev, task));
            }

            if let Some(end) = task.end_time_window {
                if clock > end {
                    return Some(index);
                }
            }
            if let Some(start) = task.start_time_window {
                if clock < start {
                    clock = start;
                }
            }

            clock += Duration::minutes(task.duration_minutes());
            previous = Some(task);
        }

        None
    }
}
