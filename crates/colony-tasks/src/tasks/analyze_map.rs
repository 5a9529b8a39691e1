//! Map analysis, a computing-bound task.
//!
//! The analyst needs a fixed amount of computing. Every tick it asks a
//! computing node for a slice of it; a refused request costs the tick but
//! not the demand. The analyst keeps trying through contention until its
//! patience or the task duration runs out, and stops at once when the node
//! is out of service.

use serde::{Deserialize, Serialize};

use crate::claim::{ClaimPatience, Denial, PatienceVerdict};
use crate::compute::{ComputeAccess, ComputeDemand};
use crate::config::TaskConfig;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::experience::SkillGain;
use crate::phase::Phase;
use crate::snapshot::TaskKind;
use crate::task::{PhaseHandler, Task, TaskBehavior, TaskDuration, TaskProfile, TaskState};
use crate::world::SkillType;

pub const ANALYZING: Phase = Phase::new("Analyzing");

const STRESS_MODIFIER: f64 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeMap {
    demand: ComputeDemand,
    refusals: u32,
    patience: ClaimPatience,
}

impl AnalyzeMap {
    /// `computing_needed` units at `seed` per millisol, requested in windows
    /// of `window` millisols.
    pub fn begin(
        computing_needed: f64,
        seed: f64,
        window: f64,
        duration: TaskDuration,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Task<Self>, TaskError> {
        let behavior = Self {
            demand: ComputeDemand::new(computing_needed, seed, window),
            refusals: 0,
            patience: ClaimPatience::new(ctx.config.compute.patience),
        };
        let mut task = Task::new(behavior, duration, ctx.config);
        task.register_phase_table()?;
        task.set_phase(ANALYZING)?;
        Ok(task)
    }

    pub fn computing_needed(&self) -> f64 {
        self.demand.remaining
    }

    pub fn refusals(&self) -> u32 {
        self.refusals
    }

    /// Denial record, including the computing asked for and not granted.
    pub fn patience(&self) -> &ClaimPatience {
        &self.patience
    }
}

fn analyzing(
    a: &mut AnalyzeMap,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    if a.demand.is_satisfied() {
        log::info!("{} finished the map analysis", ctx.performer.name());
        state.end();
        return Ok(time);
    }
    if state.duration_reached() {
        log::warn!(
            "{} ran out of time with {:.2} computing units still needed",
            ctx.performer.name(),
            a.demand.remaining
        );
        state.end();
        return Ok(time);
    }

    let used = time.min(state.remaining_duration());
    let requester = ctx.performer.id();
    let access = a.demand.access(
        &mut *ctx.colony,
        &mut *ctx.rng,
        &ctx.config.compute,
        requester,
        used,
        ctx.msol,
    );
    match access {
        ComputeAccess::Granted { .. } => a.patience.record_grant(),
        ComputeAccess::Denied {
            work,
            denial: Denial::Unavailable,
        } => {
            a.refusals += 1;
            a.patience.record_denial(work);
            log::warn!(
                "{} lost access to computing with {:.2} units still needed",
                ctx.performer.name(),
                a.demand.remaining
            );
            state.end();
        }
        ComputeAccess::NoNode { work } | ComputeAccess::Denied { work, .. } => {
            a.refusals += 1;
            if a.patience.record_denial(work) == PatienceVerdict::GiveUp {
                log::warn!(
                    "{} gave up on the map analysis after {} refusals",
                    ctx.performer.name(),
                    a.patience.consecutive_denials()
                );
                state.end();
            }
        }
    }
    Ok(time - used)
}

impl TaskBehavior for AnalyzeMap {
    const KIND: TaskKind = TaskKind::AnalyzeMap;

    fn phase_table() -> Vec<(Phase, PhaseHandler<Self>)> {
        vec![(ANALYZING, analyzing as PhaseHandler<Self>)]
    }

    fn profile(&self, _config: &TaskConfig) -> TaskProfile {
        let mut profile = TaskProfile::new("Analyze Map");
        profile.stress_modifier = STRESS_MODIFIER;
        profile.primary_skill = Some(SkillType::Computing);
        profile.experience = vec![
            SkillGain::always(SkillType::Computing, 50.0),
            SkillGain::always(SkillType::Mathematics, 100.0),
        ];
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::CapacityLedger;
    use crate::testing::Harness;

    fn harness() -> Harness {
        let mut h = Harness::new();
        h.config.compute.jitter_min = 1.0;
        h.config.compute.jitter_max = 1.0;
        h
    }

    #[test]
    fn refused_requests_keep_demand() {
        let mut h = harness();
        h.colony.add_node(1, 0.1);
        let mut task =
            AnalyzeMap::begin(5.0, 0.5, 1.0, TaskDuration::Bounded(3.0), &mut h.ctx()).unwrap();
        for _ in 0..3 {
            let left = task.step(&mut h.ctx(), 1.0).unwrap();
            assert_eq!(left, 0.0);
        }
        assert!((task.behavior().computing_needed() - 5.0).abs() < f64::EPSILON);
        assert_eq!(task.behavior().refusals(), 3);
        task.step(&mut h.ctx(), 1.0).unwrap();
        assert!(task.is_done());
    }

    #[test]
    fn no_node_gives_up_after_patience() {
        let mut h = harness();
        h.config.compute.patience = 4;
        let mut task =
            AnalyzeMap::begin(5.0, 0.5, 1.0, TaskDuration::Unbounded, &mut h.ctx()).unwrap();
        for _ in 0..3 {
            task.step(&mut h.ctx(), 1.0).unwrap();
            h.msol += 1;
        }
        assert!(!task.is_done());
        task.step(&mut h.ctx(), 1.0).unwrap();
        assert!(task.is_done());
        assert_eq!(task.behavior().refusals(), 4);
        assert!((task.behavior().patience().unmet_demand() - 2.0).abs() < 1e-9);
        assert!((task.behavior().computing_needed() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn grant_resets_patience() {
        let mut h = harness();
        h.config.compute.patience = 2;
        let node = h.colony.add_node(1, 0.1);
        let mut task =
            AnalyzeMap::begin(5.0, 0.5, 1.0, TaskDuration::Unbounded, &mut h.ctx()).unwrap();
        task.step(&mut h.ctx(), 1.0).unwrap();
        h.msol += 1;
        assert_eq!(task.behavior().patience().consecutive_denials(), 1);

        h.colony.nodes.insert(node, CapacityLedger::new(10.0));
        task.step(&mut h.ctx(), 1.0).unwrap();
        h.msol += 1;
        assert_eq!(task.behavior().patience().consecutive_denials(), 0);
        assert!(!task.is_done());
    }

    #[test]
    fn out_of_service_node_ends_at_once() {
        let mut h = harness();
        let node = h.colony.add_node(1, 10.0);
        h.colony.offline_nodes.insert(node);
        let mut task =
            AnalyzeMap::begin(5.0, 0.5, 1.0, TaskDuration::Unbounded, &mut h.ctx()).unwrap();
        let left = task.step(&mut h.ctx(), 1.0).unwrap();
        assert!(task.is_done());
        assert_eq!(left, 0.0);
        assert_eq!(task.behavior().refusals(), 1);
    }

    #[test]
    fn steady_progress_until_done() {
        let mut h = harness();
        h.colony.add_node(1, 10.0);
        let mut task =
            AnalyzeMap::begin(1.2, 0.5, 1.0, TaskDuration::Unbounded, &mut h.ctx()).unwrap();
        for _ in 0..5 {
            task.step(&mut h.ctx(), 1.0).unwrap();
            h.msol += 1;
        }
        assert!(task.is_done());
        assert_eq!(task.behavior().computing_needed(), 0.0);
    }
}
