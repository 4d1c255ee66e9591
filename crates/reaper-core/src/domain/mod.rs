//! Domain model (IDs, resources, candidates, tasks, outcomes, errors, events).

pub mod candidate;
pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod resource;
pub mod task;

pub use candidate::{Candidate, Metadata};
pub use errors::{
    CommandError, ConfigError, DeletionError, EvaluationError, QueryError, ReapError,
};
pub use events::ReapEvent;
pub use ids::{BatchId, TaskId};
pub use outcome::{BatchResult, BatchSummary, Failure, Outcome, OutcomeKind};
pub use resource::{Location, ResourceKind, ResourceRef};
pub use task::{DeletionTask, TaskState, TransitionError};
