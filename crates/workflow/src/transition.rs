// Task status state machine.
//
//   backlog      -> in_progress | done
//   in_progress  -> blocked | done
//   blocked      -> in_progress
//   done         -> (terminal)
//
// Same-state requests are rejected like any other disallowed move.

use crate::error::{Result, WorkflowError};
use chrono::{DateTime, Utc};
use taskhub_models::{Task, TaskStatus};

/// Statuses a task may legally move to from `current`.
pub fn allowed_transitions(current: TaskStatus) -> &'static [TaskStatus] {
    match current {
        TaskStatus::Backlog => &[TaskStatus::InProgress, TaskStatus::Done],
        TaskStatus::InProgress => &[TaskStatus::Blocked, TaskStatus::Done],
        TaskStatus::Blocked => &[TaskStatus::InProgress],
        TaskStatus::Done => &[],
    }
}

pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Apply a status move. On entry into `done` the completion timestamp is
/// stamped with `now`; it is never cleared by later moves, even when a task
/// is reopened. That asymmetry is intentional: the completion time stays
/// visible to the audit trail.
pub fn transition(task: &Task, requested: TaskStatus, now: DateTime<Utc>) -> Result<Task> {
    if !can_transition(task.status, requested) {
        return Err(WorkflowError::InvalidTransition {
            from: task.status,
            to: requested,
        });
    }

    let mut updated = task.clone();
    updated.status = requested;
    if requested == TaskStatus::Done {
        updated.completed_at = Some(now);
    }
    Ok(updated)
}
