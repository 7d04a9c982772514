use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Received,
    Validating,
    Planning,
    /// `chunk` is 1-based.
    Invoking { chunk: usize, total: usize },
    Assembling,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Received => write!(f, "received"),
            JobState::Validating => write!(f, "validating"),
            JobState::Planning => write!(f, "planning"),
            JobState::Invoking { chunk, total } => write!(f, "invoking({chunk}/{total})"),
            JobState::Assembling => write!(f, "assembling"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Forward-only state machine of a single job.
#[derive(Debug, Clone)]
pub struct JobLifecycle {
    current: JobState,
    history: Vec<JobState>,
}

impl Default for JobLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl JobLifecycle {
    pub fn new() -> Self {
        Self {
            current: JobState::Received,
            history: vec![JobState::Received],
        }
    }

    pub fn current(&self) -> JobState {
        self.current
    }

    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn advance(&mut self, next: JobState) -> Result<(), DomainError> {
        if !is_allowed(self.current, next) {
            return Err(DomainError::internal_error(&format!(
                "invalid job state transition {} -> {}",
                self.current, next
            )));
        }
        self.current = next;
        self.history.push(next);
        Ok(())
    }

    /// Moves to `Failed` unless the job already reached a terminal state.
    pub fn fail(&mut self) -> bool {
        if self.current.is_terminal() {
            return false;
        }
        self.current = JobState::Failed;
        self.history.push(JobState::Failed);
        true
    }
}

fn is_allowed(from: JobState, to: JobState) -> bool {
    use JobState::*;

    if from.is_terminal() {
        return false;
    }
    match (from, to) {
        (_, Failed) => true,
        (Received, Validating) => true,
        (Validating, Planning) => true,
        (Planning, Invoking { chunk: 1, total }) => total >= 1,
        (
            Invoking { chunk, total },
            Invoking {
                chunk: next,
                total: next_total,
            },
        ) => total == next_total && next == chunk + 1 && next <= total,
        (Invoking { chunk, total }, Assembling) => chunk == total,
        (Assembling, Completed) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk_to_assembling(lifecycle: &mut JobLifecycle, total: usize) {
        lifecycle.advance(JobState::Validating).expect("validating");
        lifecycle.advance(JobState::Planning).expect("planning");
        for chunk in 1..=total {
            lifecycle
                .advance(JobState::Invoking { chunk, total })
                .expect("invoking");
        }
        lifecycle.advance(JobState::Assembling).expect("assembling");
    }

    #[test]
    fn happy_path_reaches_completed() {
        let mut lifecycle = JobLifecycle::new();
        walk_to_assembling(&mut lifecycle, 3);
        lifecycle.advance(JobState::Completed).expect("completed");

        assert_eq!(lifecycle.current(), JobState::Completed);
        assert_eq!(lifecycle.history().len(), 8);
    }

    #[test]
    fn chunks_cannot_be_skipped() {
        let mut lifecycle = JobLifecycle::new();
        lifecycle.advance(JobState::Validating).unwrap();
        lifecycle.advance(JobState::Planning).unwrap();
        lifecycle
            .advance(JobState::Invoking { chunk: 1, total: 3 })
            .unwrap();

        assert!(lifecycle
            .advance(JobState::Invoking { chunk: 3, total: 3 })
            .is_err());
        assert!(lifecycle.advance(JobState::Assembling).is_err());
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        let mut lifecycle = JobLifecycle::new();
        lifecycle.advance(JobState::Validating).unwrap();
        assert!(lifecycle.fail());
        assert_eq!(lifecycle.current(), JobState::Failed);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut lifecycle = JobLifecycle::new();
        walk_to_assembling(&mut lifecycle, 1);
        lifecycle.advance(JobState::Completed).unwrap();

        assert!(!lifecycle.fail());
        assert!(lifecycle.advance(JobState::Validating).is_err());
        assert_eq!(lifecycle.current(), JobState::Completed);
    }

    #[test]
    fn prior_states_cannot_be_reentered() {
        let mut lifecycle = JobLifecycle::new();
        lifecycle.advance(JobState::Validating).unwrap();
        lifecycle.advance(JobState::Planning).unwrap();

        assert!(lifecycle.advance(JobState::Validating).is_err());
    }
}
