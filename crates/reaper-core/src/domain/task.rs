//! Deletion task and its state machine.
//!
//! ```text
//! Pending -> Running -> Succeeded | Failed
//! Pending -> Cancelled
//! ```
//! 終端状態からの遷移はすべて `TransitionError`。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::candidate::Candidate;
use super::ids::TaskId;

/// Task state.
///
/// State transitions:
/// - Pending -> Running -> Succeeded
/// - Pending -> Running -> Failed
/// - Pending -> Cancelled (never admitted after a cancellation signal)
///
/// No transition leaves a terminal state. There are no retries: running the
/// whole batch again is the retry mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting for a free executor slot.
    Pending,

    /// A worker is issuing the delete call(s).
    Running,

    Succeeded,

    Failed,

    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: TaskState,
    pub to: TaskState,
}

/// A pending deletion bound to one Candidate.
///
/// `dependents` are deleted in order before the candidate itself (e.g. the
/// forwarding rule that points at a target pool).
#[derive(Debug, Clone)]
pub struct DeletionTask {
    id: TaskId,
    candidate: Candidate,
    dependents: Vec<Candidate>,
    state: TaskState,
}

impl DeletionTask {
    pub fn new(id: TaskId, candidate: Candidate) -> Self {
        Self {
            id,
            candidate,
            dependents: Vec::new(),
            state: TaskState::Pending,
        }
    }

    pub fn with_dependent(mut self, dependent: Candidate) -> Self {
        self.dependents.push(dependent);
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn dependents(&self) -> &[Candidate] {
        &self.dependents
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Pending -> Running.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskState::Pending, TaskState::Running)
    }

    /// Running -> Succeeded.
    pub fn succeed(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskState::Running, TaskState::Succeeded)
    }

    /// Running -> Failed.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskState::Running, TaskState::Failed)
    }

    /// Pending -> Cancelled.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskState::Pending, TaskState::Cancelled)
    }

    fn transition(&mut self, from: TaskState, to: TaskState) -> Result<(), TransitionError> {
        if self.state != from {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{Location, ResourceKind};
    use ulid::Ulid;

    fn task() -> DeletionTask {
        DeletionTask::new(
            TaskId::from_ulid(Ulid::new()),
            Candidate::bare(ResourceKind::Disk, Location::Zone("z".into()), "d"),
        )
    }

    #[test]
    fn happy_path_reaches_succeeded() {
        let mut t = task();
        assert_eq!(t.state(), TaskState::Pending);
        t.start().unwrap();
        t.succeed().unwrap();
        assert_eq!(t.state(), TaskState::Succeeded);
        assert!(t.state().is_terminal());
    }

    #[test]
    fn terminal_states_do_not_move() {
        let mut t = task();
        t.start().unwrap();
        t.fail().unwrap();

        let err = t.succeed().unwrap_err();
        assert_eq!(err.from, TaskState::Failed);
        assert_eq!(t.state(), TaskState::Failed);
        assert!(t.start().is_err());
    }

    #[test]
    fn running_tasks_cannot_be_cancelled() {
        let mut t = task();
        t.start().unwrap();
        assert!(t.cancel().is_err());
        assert_eq!(t.state(), TaskState::Running);
    }

    #[test]
    fn dependents_keep_insertion_order() {
        let t = task()
            .with_dependent(Candidate::bare(ResourceKind::ForwardingRule, Location::Global, "a"))
            .with_dependent(Candidate::bare(ResourceKind::ForwardingRule, Location::Global, "b"));
        let names: Vec<_> = t.dependents().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
