//! Task lifecycle state machine

use crate::error::{Result, ValidationError};
use crate::models::{Task, TaskStatus};

impl TaskStatus {
    /// Whether this status permits a transition to `to`.
    ///
    /// Pending -> Ready -> InProgress -> Done is the happy path. Any
    /// non-terminal status may become Blocked; Blocked returns to Ready
    /// once the blocking condition clears. Done and Cancelled are terminal.
    pub fn can_transition(&self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, to) {
            (Pending, Ready) => true,
            (Ready, InProgress) => true,
            (InProgress, Done) => true,
            (Blocked, Ready) => true,
            (Pending | Ready | InProgress | Blocked, Blocked) => true,
            (Pending | Ready | InProgress | Blocked, Cancelled) => true,
            _ => false,
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

impl Task {
    /// Applies a status transition, rejecting illegal ones
    pub fn transition(&mut self, to: TaskStatus) -> Result<()> {
        if !self.status.can_transition(to) {
            return Err(ValidationError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
