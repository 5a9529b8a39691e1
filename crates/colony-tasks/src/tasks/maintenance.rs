//! Preventive maintenance on a worn building or vehicle.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::TaskConfig;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::experience::{self, SkillGain};
use crate::phase::Phase;
use crate::snapshot::TaskKind;
use crate::task::{PhaseHandler, Task, TaskBehavior, TaskDuration, TaskProfile, TaskState};
use crate::world::{MaintenanceCandidate, SkillType, StructureId};

pub const MAINTAINING: Phase = Phase::new("Maintaining");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Maintenance {
    structure: Option<StructureId>,
    work_done: f64,
}

impl Maintenance {
    /// Pick a worn structure in the performer's settlement and start on it.
    ///
    /// Ends before returning if nothing needs maintenance or the chosen
    /// structure has no parts in stock.
    pub fn begin(ctx: &mut TaskContext<'_>) -> Result<Task<Self>, TaskError> {
        let candidates = ctx
            .performer
            .settlement()
            .map(|s| ctx.colony.maintenance_candidates(s))
            .unwrap_or_default();
        let target = pick_candidate(&candidates, &mut *ctx.rng);
        Self::begin_on(target, ctx)
    }

    /// Start maintenance on a chosen structure.
    pub fn begin_on(
        structure: Option<StructureId>,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Task<Self>, TaskError> {
        let duration = TaskDuration::Bounded(ctx.config.maintenance.duration);
        let ready = structure.filter(|s| {
            ctx.colony.parts_available(*s)
                && !ctx.colony.has_malfunction(*s)
                && !ctx.colony.is_reserved_for_maintenance(*s)
        });
        let Some(structure) = ready else {
            log::warn!(
                "{} found nothing to maintain (target {:?})",
                ctx.performer.name(),
                structure
            );
            let mut task = Task::new(Self::default(), duration, ctx.config);
            task.end(ctx);
            return Ok(task);
        };

        ctx.colony.set_reserved_for_maintenance(structure, true);
        let behavior = Self {
            structure: Some(structure),
            work_done: 0.0,
        };
        let mut task = Task::new(behavior, duration, ctx.config);
        task.register_phase_table()?;
        task.set_phase(MAINTAINING)?;
        log::info!("{} starting maintenance on {:?}", ctx.performer.name(), structure);
        Ok(task)
    }

    pub fn structure(&self) -> Option<StructureId> {
        self.structure
    }

    pub fn work_done(&self) -> f64 {
        self.work_done
    }
}

/// Weighted random choice, more wear means more likely.
pub fn pick_candidate<R: Rng + ?Sized>(
    candidates: &[MaintenanceCandidate],
    rng: &mut R,
) -> Option<StructureId> {
    candidates
        .choose_weighted(rng, |c| c.wear.max(0.0))
        .ok()
        .map(|c| c.structure)
}

/// Maintenance work produced by `time` millisols at a mechanics level.
pub fn maintenance_work(time: f64, skill: u32) -> f64 {
    if skill == 0 {
        time / 2.0
    } else {
        time + time * 0.2 * f64::from(skill)
    }
}

fn maintaining(
    m: &mut Maintenance,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    let Some(structure) = m.structure else {
        state.end();
        return Ok(time);
    };
    if ctx.colony.has_malfunction(structure) || state.duration_reached() {
        state.end();
        return Ok(time);
    }

    let used = time.min(state.remaining_duration());
    let skill = ctx.performer.effective_skill_level(SkillType::Mechanics);
    let work = maintenance_work(used, skill);
    m.work_done += work;
    if ctx.colony.add_maintenance_work(structure, work) {
        log::info!("{} finished maintenance on {:?}", ctx.performer.name(), structure);
        state.end();
        return Ok(time - used);
    }

    let wear = ctx.colony.wear(structure);
    let chance = experience::accident_chance(
        ctx.config.maintenance.base_accident_chance,
        used,
        skill,
        wear,
    );
    if chance > 0.0 && ctx.rng.gen::<f64>() < chance {
        log::warn!("{} caused a malfunction in {:?}", ctx.performer.name(), structure);
        ctx.colony.trigger_malfunction(structure);
        state.end();
    }
    Ok(time - used)
}

impl TaskBehavior for Maintenance {
    const KIND: TaskKind = TaskKind::Maintenance;

    fn phase_table() -> Vec<(Phase, PhaseHandler<Self>)> {
        vec![(MAINTAINING, maintaining as PhaseHandler<Self>)]
    }

    fn profile(&self, config: &TaskConfig) -> TaskProfile {
        let mut profile = TaskProfile::new("Maintenance");
        profile.stress_modifier = config.maintenance.stress_modifier;
        profile.primary_skill = Some(SkillType::Mechanics);
        profile.experience = vec![SkillGain::always(SkillType::Mechanics, 100.0)];
        profile
    }

    fn on_end(&mut self, _state: &TaskState, ctx: &mut TaskContext<'_>) {
        if let Some(structure) = self.structure {
            ctx.colony.set_reserved_for_maintenance(structure, false);
        }
    }
}
