//! Digging regolith just outside the settlement.

use serde::{Deserialize, Serialize};

use crate::config::TaskConfig;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::eva::{Eva, SiteWork};
use crate::phase::Phase;
use crate::snapshot::TaskKind;
use crate::task::{PhaseHandler, Task, TaskState};
use crate::world::{Position, ResourceKind, SkillType};

pub const COLLECT_REGOLITH: Phase = Phase::new("Collect Regolith");

const SITE_PHASES: &[Phase] = &[COLLECT_REGOLITH];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigRegolith {
    collected: f64,
}

impl DigRegolith {
    /// Head out to `site` and dig until the site time runs out or the
    /// performer can carry no more.
    pub fn begin(site: Position, ctx: &mut TaskContext<'_>) -> Result<Task<Eva<Self>>, TaskError> {
        let site_duration = ctx.config.regolith.site_duration;
        Eva::begin(Self::default(), site, Some(site_duration), ctx)
    }

    /// Kilograms dug so far.
    pub fn collected(&self) -> f64 {
        self.collected
    }
}

/// Kilograms dug in `time` millisols at an areology level.
pub fn dig_rate(base_rate: f64, time: f64, skill: u32) -> f64 {
    base_rate * time * (1.0 + 0.25 * f64::from(skill))
}

fn collect_regolith(
    eva: &mut Eva<DigRegolith>,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    if ctx.performer.cargo_capacity(ResourceKind::Regolith) <= 0.0 {
        eva.request_return();
    }
    if eva.check_readiness(state, ctx, time, true)? {
        return Ok(time);
    }

    let skill = ctx.performer.effective_skill_level(SkillType::Areology);
    let dug = dig_rate(ctx.config.regolith.base_rate, time, skill);
    let stored = ctx.performer.store(ResourceKind::Regolith, dug);
    eva.work.collected += stored;
    eva.check_for_accident(ctx, time);

    if ctx.performer.cargo_capacity(ResourceKind::Regolith) <= 0.0 {
        log::info!(
            "{} is full after digging {:.1} kg",
            ctx.performer.name(),
            eva.work.collected
        );
        eva.request_return();
    }
    Ok(0.0)
}

impl SiteWork for DigRegolith {
    const KIND: TaskKind = TaskKind::DigRegolith;
    const NAME: &'static str = "Dig Regolith";
    const SITE_PHASES: &'static [Phase] = SITE_PHASES;

    fn site_handlers() -> Vec<(Phase, PhaseHandler<Eva<Self>>)> {
        vec![(COLLECT_REGOLITH, collect_regolith as PhaseHandler<Eva<Self>>)]
    }

    fn outside_skill(&self) -> SkillType {
        SkillType::Areology
    }

    fn stress_modifier(&self, config: &TaskConfig) -> f64 {
        config.regolith.stress_modifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eva::EvaOutcome;
    use crate::testing::Harness;
    use crate::world::WorkerLocation;

    fn harness() -> Harness {
        let mut h = Harness::new();
        h.config.eva.airlock_cycle_time = 1.0;
        h.config.eva.walk_speed = 10.0;
        h.config.eva.base_accident_chance = 0.0;
        h.colony.add_airlock(1, Position::new(10.0, 0.0));
        h
    }

    #[test]
    fn skill_speeds_up_digging() {
        assert!((dig_rate(0.5, 2.0, 0) - 1.0).abs() < 1e-12);
        assert!((dig_rate(0.5, 2.0, 4) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn full_cargo_brings_worker_home() {
        let mut h = harness();
        h.performer.cargo_limit = 2.0;
        let mut task = DigRegolith::begin(Position::new(20.0, 0.0), &mut h.ctx()).unwrap();
        for _ in 0..30 {
            if task.is_done() {
                break;
            }
            task.step(&mut h.ctx(), 1.0).unwrap();
            h.msol += 1;
        }
        assert!(task.behavior().return_requested());
        assert!(task.is_done());
        assert_eq!(task.behavior().outcome(), EvaOutcome::Completed);
        assert_eq!(h.performer.location, WorkerLocation::Inside);
        assert!((task.behavior().work.collected() - 2.0).abs() < 1e-9);
        assert!((h.performer.carried(ResourceKind::Regolith) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn darkness_cuts_digging_short() {
        let mut h = harness();
        let mut task = DigRegolith::begin(Position::new(11.0, 0.0), &mut h.ctx()).unwrap();
        while task.phase() != Some(COLLECT_REGOLITH) {
            task.step(&mut h.ctx(), 1.0).unwrap();
        }
        h.environment.sun_setting = true;
        task.step(&mut h.ctx(), 1.0).unwrap();
        assert_ne!(task.phase(), Some(COLLECT_REGOLITH));
        let before = task.behavior().work.collected();
        for _ in 0..10 {
            task.step(&mut h.ctx(), 1.0).unwrap();
        }
        assert!((task.behavior().work.collected() - before).abs() < f64::EPSILON);
        assert_eq!(task.behavior().outcome(), EvaOutcome::Completed);
    }
}
