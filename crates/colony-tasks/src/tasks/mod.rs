//! Concrete tasks.
//!
//! | Task | Where | Bound by |
//! |------|-------|----------|
//! | [`maintenance::Maintenance`] | inside | structure reservation |
//! | [`analyze_map::AnalyzeMap`] | inside | compute nodes |
//! | [`dig_regolith::DigRegolith`] | outside (EVA) | airlocks, cargo |
//! | [`converse::Converse`] | inside | another colonist |

pub mod analyze_map;
pub mod converse;
pub mod dig_regolith;
pub mod maintenance;

use crate::config::TaskConfig;
use crate::error::TaskError;
use crate::eva::Eva;
use crate::snapshot::{TaskKind, TaskSnapshot};
use crate::task::{ColonyTask, Task};

/// Rebuild a boxed task from its snapshot.
pub fn restore(snapshot: &TaskSnapshot, config: &TaskConfig) -> Result<Box<dyn ColonyTask>, TaskError> {
    let task: Box<dyn ColonyTask> = match snapshot.kind {
        TaskKind::Maintenance => Box::new(Task::<maintenance::Maintenance>::from_snapshot(snapshot, config)?),
        TaskKind::AnalyzeMap => Box::new(Task::<analyze_map::AnalyzeMap>::from_snapshot(snapshot, config)?),
        TaskKind::DigRegolith => {
            Box::new(Task::<Eva<dig_regolith::DigRegolith>>::from_snapshot(snapshot, config)?)
        }
        TaskKind::Converse => Box::new(Task::<converse::Converse>::from_snapshot(snapshot, config)?),
    };
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use crate::world::Position;

    #[test]
    fn restores_each_kind() {
        let mut h = Harness::new();
        h.colony.add_airlock(1, Position::new(5.0, 0.0));
        h.colony.add_node(1, 10.0);

        let mut dig = dig_regolith::DigRegolith::begin(Position::new(20.0, 0.0), &mut h.ctx()).unwrap();
        dig.step(&mut h.ctx(), 1.0).unwrap();
        let snap = dig.snapshot().unwrap();
        let restored = restore(&snap, &h.config).unwrap();
        assert_eq!(restored.kind(), TaskKind::DigRegolith);
        assert_eq!(restored.phase(), dig.phase());
        assert!((restored.elapsed() - dig.state().elapsed()).abs() < 1e-12);

        let analyze = analyze_map::AnalyzeMap::begin(
            3.0,
            0.5,
            1.0,
            crate::task::TaskDuration::Unbounded,
            &mut h.ctx(),
        )
        .unwrap();
        let restored = restore(&analyze.snapshot().unwrap(), &h.config).unwrap();
        assert_eq!(restored.name(), "Analyze Map");
    }

    #[test]
    fn born_dead_task_restores_done() {
        let mut h = Harness::new();
        let task = maintenance::Maintenance::begin(&mut h.ctx()).unwrap();
        let restored = restore(&task.snapshot().unwrap(), &h.config).unwrap();
        assert!(restored.is_done());
        assert_eq!(restored.phase(), None);
    }
}
