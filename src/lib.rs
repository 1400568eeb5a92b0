//! courier-sequencer
//!
//! Visiting-order construction and task lifecycle for courier delivery runs.

pub mod error;
pub mod haversine;
pub mod model;
pub mod lifecycle;
pub mod estimate;
pub mod sequencer;
pub mod traits;
pub mod store;
pub mod service;

pub use error::{RepositoryError, Result, SequencingError};
pub use haversine::{GeoPoint, haversine_km};
pub use lifecycle::{AssignmentStatus, TaskStatus};
pub use model::{
    Assignment, AssignmentId, AssignmentTasks, CourierId, NewTask, Task, TaskId, TaskKind,
};
pub use sequencer::{Sequencer, SequencerOptions};
pub use service::{AssignmentTaskService, SequencePlan, ServiceOptions};
pub use store::InMemoryStore;
pub use traits::{Clock, FixedClock, SystemClock, TaskRepository};
