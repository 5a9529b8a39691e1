//! Hard failures of the task engine.
//!
//! Recoverable conditions (a denied claim, a hazard, a missing target) are
//! never reported here: tasks encode them as phase transitions or as an early
//! end. A `TaskError` means a concrete task broke the step contract and has
//! been force-ended.

/// Contract violations raised by [`crate::task::Task`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    /// A transition targeted a phase the task never registered.
    #[error("phase '{phase}' is not registered for task '{task}'")]
    InvalidPhase { task: String, phase: String },

    /// `step` was called on a live task with no current phase.
    #[error("task '{task}' has no active phase")]
    NoActivePhase { task: String },

    /// Phases can only be registered before the first step.
    #[error("task '{task}' already started, cannot register phase '{phase}'")]
    RegistrationClosed { task: String, phase: String },

    /// Offered time was negative or not finite.
    #[error("task '{task}' was offered invalid time {time}")]
    InvalidTime { task: String, time: f64 },

    /// A phase handler returned more time than it was given, or a bad value.
    #[error("phase '{phase}' of task '{task}' returned {returned} msol out of {offered} offered")]
    TimeOverrun {
        task: String,
        phase: String,
        offered: f64,
        returned: f64,
    },

    /// A saved task could not be rebuilt.
    #[error("cannot restore task snapshot: {0}")]
    Snapshot(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_task() {
        let err = TaskError::NoActivePhase {
            task: "Dig Regolith".into(),
        };
        assert_eq!(err.to_string(), "task 'Dig Regolith' has no active phase");

        let err = TaskError::TimeOverrun {
            task: "Maintenance".into(),
            phase: "Maintaining".into(),
            offered: 1.0,
            returned: 2.0,
        };
        assert!(err.to_string().contains("returned 2 msol out of 1 offered"));
    }
}
