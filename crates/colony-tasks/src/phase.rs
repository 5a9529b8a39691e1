//! Phase tags for task state machines.
//!
//! A phase is a value tag scoped to a task type. Tasks declare their phases
//! as `const` items and register them with a handler when they are built:
//!
//! ```
//! use colony_tasks::phase::Phase;
//!
//! const SURVEYING: Phase = Phase::new("Surveying");
//! assert_eq!(SURVEYING.name(), "Surveying");
//! assert_eq!(SURVEYING, Phase::new("Surveying"));
//! ```

use serde::{Serialize, Serializer};
use std::fmt;

/// Named sub-state of a task's state machine. Compared by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Phase(&'static str);

impl Phase {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// Phases are written by name only. Restoring goes through the owning task's
// registry, see `Task::from_snapshot`.
impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_compare_by_name() {
        const A: Phase = Phase::new("Walking");
        let b = Phase::new("Walking");
        assert_eq!(A, b);
        assert_ne!(A, Phase::new("Digging"));
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(Phase::new("Ingress").to_string(), "Ingress");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Phase::new("Egress")).unwrap();
        assert_eq!(json, "\"Egress\"");
    }
}
