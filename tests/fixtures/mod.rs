//! Test fixtures for courier-sequencer.
//!
//! Provides:
//! - Real Las Vegas drop-off points (from OpenStreetMap)
//! - A fixed test clock and task builders

#![allow(dead_code, unused_imports)]

pub mod las_vegas_stops;

pub use las_vegas_stops::*;

use chrono::{DateTime, Duration, TimeZone, Utc};
use courier_sequencer::{AssignmentId, FixedClock, GeoPoint, NewTask, Task};

/// 09:00 UTC on a fixed service day.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

pub fn minutes(m: i64) -> Duration {
    Duration::minutes(m)
}

pub fn clock() -> FixedClock {
    FixedClock(t0())
}

pub fn point(lat: f64, lon: f64) -> Option<GeoPoint> {
    Some(GeoPoint::new(lat, lon))
}

/// Materialize a task outside of any store.
pub fn task(assignment_id: AssignmentId, new_task: NewTask) -> Task {
    new_task.into_task(assignment_id, 1, t0())
}

/// Build tasks at the given points, numbered 1..N in input order.
pub fn tasks_at(assignment_id: AssignmentId, points: &[(f64, f64)]) -> Vec<Task> {
    points
        .iter()
        .enumerate()
        .map(|(i, (lat, lon))| {
            NewTask::delivery(point(*lat, *lon)).into_task(assignment_id, i as u32 + 1, t0())
        })
        .collect()
}
