//! Saved form of a task.
//!
//! A snapshot holds the phase by name, the time counters and the task's own
//! fields as JSON text. Handlers are not saved: they are rebuilt from the
//! task type's phase table when the snapshot is restored.

use serde::{Deserialize, Serialize};

use crate::experience::Teacher;
use crate::task::TaskDuration;

/// Concrete task types known to the restore path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Maintenance,
    AnalyzeMap,
    DigRegolith,
    Converse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub kind: TaskKind,
    pub name: String,
    pub phase: Option<String>,
    pub elapsed: f64,
    pub duration: TaskDuration,
    pub started: bool,
    pub done: bool,
    pub teacher: Option<Teacher>,
    /// Task-specific fields, JSON encoded.
    pub behavior: String,
}
