//! The task phase execution engine.
//!
//! A [`Task`] pairs the generic [`TaskState`] (phase registry, current
//! phase, elapsed time, done flag) with a task-specific behavior `B`. Each
//! phase maps to a [`PhaseHandler`]; the scheduler calls [`Task::step`] once
//! per tick with the time it can spare and gets back whatever the task did
//! not use.
//!
//! # Step contract
//!
//! * A done task returns the offered time untouched.
//! * A live task with no phase is a construction bug: it is logged,
//!   force-ended and reported as [`TaskError::NoActivePhase`].
//! * Handlers run until the time is used up, the task ends, or a handler
//!   neither consumes time nor changes phase (it is waiting).
//! * The remainder is always within `[0, offered]` and elapsed time grows by
//!   exactly what was consumed.
//! * Consumed time earns experience for the phase that consumed it and adds
//!   stress once per step.
//! * Ending fires the behavior's `on_end` exactly once, however many times
//!   `end` is called.

use std::collections::{BTreeSet, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::TaskConfig;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::experience::{self, SkillGain, Teacher};
use crate::phase::Phase;
use crate::snapshot::{TaskKind, TaskSnapshot};
use crate::world::{NaturalAttribute, SkillType};

/// Handles one tick of one phase: `(time offered) -> time left`.
pub type PhaseHandler<B> =
    fn(&mut B, &mut TaskState, &mut TaskContext<'_>, f64) -> Result<f64, TaskError>;

/// How long a task intends to run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TaskDuration {
    /// Millisols.
    Bounded(f64),
    /// Runs until a domain condition ends it.
    Unbounded,
}

/// Fixed traits of a task, derived from its behavior and the config.
#[derive(Debug, Clone)]
pub struct TaskProfile {
    pub name: String,
    /// Stress per millisol; negative relaxes.
    pub stress_modifier: f64,
    /// Effort-driven tasks end when the performer is incapacitated, or wrap
    /// up if the behavior asks to.
    pub effort_driven: bool,
    /// Non-interruptible tasks turn cancellation into a request to wrap up.
    pub interruptible: bool,
    /// Skill that relieves stress.
    pub primary_skill: Option<SkillType>,
    /// Attribute scaling experience gain.
    pub experience_attribute: NaturalAttribute,
    pub experience: Vec<SkillGain>,
}

impl TaskProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stress_modifier: 0.0,
            effort_driven: true,
            interruptible: true,
            primary_skill: None,
            experience_attribute: NaturalAttribute::ExperienceAptitude,
            experience: Vec::new(),
        }
    }
}

/// Phase state of one task instance.
#[derive(Debug, Clone)]
pub struct TaskState {
    profile: TaskProfile,
    duration: TaskDuration,
    phases: BTreeSet<Phase>,
    phase: Option<Phase>,
    elapsed: f64,
    started: bool,
    done: bool,
    teacher: Option<Teacher>,
}

impl TaskState {
    pub fn new(profile: TaskProfile, duration: TaskDuration) -> Self {
        Self {
            profile,
            duration,
            phases: BTreeSet::new(),
            phase: None,
            elapsed: 0.0,
            started: false,
            done: false,
            teacher: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn profile(&self) -> &TaskProfile {
        &self.profile
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn is_registered(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    pub fn registered_phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases.iter().copied()
    }

    /// Move to a registered phase. Entry logic is the caller's business.
    pub fn set_phase(&mut self, phase: Phase) -> Result<(), TaskError> {
        if !self.phases.contains(&phase) {
            return Err(TaskError::InvalidPhase {
                task: self.profile.name.clone(),
                phase: phase.name().to_string(),
            });
        }
        self.phase = Some(phase);
        Ok(())
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn duration(&self) -> TaskDuration {
        self.duration
    }

    pub fn duration_reached(&self) -> bool {
        match self.duration {
            TaskDuration::Bounded(d) => self.elapsed >= d,
            TaskDuration::Unbounded => false,
        }
    }

    /// Millisols left before the duration is reached.
    pub fn remaining_duration(&self) -> f64 {
        match self.duration {
            TaskDuration::Bounded(d) => (d - self.elapsed).max(0.0),
            TaskDuration::Unbounded => f64::INFINITY,
        }
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Mark the task done. The owning [`Task`] runs the end hook.
    pub fn end(&mut self) {
        self.done = true;
    }

    pub fn teacher(&self) -> Option<&Teacher> {
        self.teacher.as_ref()
    }

    pub fn set_teacher(&mut self, teacher: Option<Teacher>) {
        self.teacher = teacher;
    }
}

/// Task-specific data and hooks.
pub trait TaskBehavior: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    const KIND: TaskKind;

    /// Every phase this task type can enter, with its handler.
    fn phase_table() -> Vec<(Phase, PhaseHandler<Self>)>;

    fn profile(&self, config: &TaskConfig) -> TaskProfile;

    /// Runs once per step before any handler.
    fn before_step(
        &mut self,
        _state: &mut TaskState,
        _ctx: &mut TaskContext<'_>,
    ) -> Result<(), TaskError> {
        Ok(())
    }

    /// Runs once per step with the total time consumed.
    fn after_step(&mut self, _state: &TaskState, _ctx: &mut TaskContext<'_>, _consumed: f64) {}

    /// Release claims and restore world state. Called exactly once.
    fn on_end(&mut self, _state: &TaskState, _ctx: &mut TaskContext<'_>) {}

    /// Asked when a non-interruptible task is cancelled, and when an
    /// effort-driven task's performer is incapacitated. Return true if the
    /// task will wrap up on its own; false ends it immediately.
    fn request_wrap_up(&mut self, _state: &mut TaskState, _ctx: &mut TaskContext<'_>) -> bool {
        false
    }
}

/// A runnable task: state, handler map and behavior.
pub struct Task<B: TaskBehavior> {
    state: TaskState,
    handlers: HashMap<Phase, PhaseHandler<B>>,
    behavior: B,
    end_hook_fired: bool,
}

impl<B: TaskBehavior> Task<B> {
    /// A task with no phases registered yet.
    pub fn new(behavior: B, duration: TaskDuration, config: &TaskConfig) -> Self {
        let profile = behavior.profile(config);
        Self {
            state: TaskState::new(profile, duration),
            handlers: HashMap::new(),
            behavior,
            end_hook_fired: false,
        }
    }

    /// Add a phase and its handler. Only allowed before the first step.
    pub fn register_phase(&mut self, phase: Phase, handler: PhaseHandler<B>) -> Result<(), TaskError> {
        if self.state.started {
            return Err(TaskError::RegistrationClosed {
                task: self.state.profile.name.clone(),
                phase: phase.name().to_string(),
            });
        }
        if self.state.phases.insert(phase) {
            self.handlers.insert(phase, handler);
        }
        Ok(())
    }

    /// Register every phase of `B::phase_table`.
    pub fn register_phase_table(&mut self) -> Result<(), TaskError> {
        for (phase, handler) in B::phase_table() {
            self.register_phase(phase, handler)?;
        }
        Ok(())
    }

    pub fn set_phase(&mut self, phase: Phase) -> Result<(), TaskError> {
        self.state.set_phase(phase)
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut TaskState {
        &mut self.state
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub fn is_done(&self) -> bool {
        self.state.done
    }

    pub fn phase(&self) -> Option<Phase> {
        self.state.phase
    }

    /// Perform the task for up to `time` millisols; returns the time left.
    pub fn step(&mut self, ctx: &mut TaskContext<'_>, time: f64) -> Result<f64, TaskError> {
        if !time.is_finite() || time < 0.0 {
            return Err(TaskError::InvalidTime {
                task: self.state.profile.name.clone(),
                time,
            });
        }
        if self.state.done {
            return Ok(time);
        }
        self.state.started = true;

        if self.state.phase.is_none() {
            let err = TaskError::NoActivePhase {
                task: self.state.profile.name.clone(),
            };
            return self.fail(ctx, err);
        }

        // An incapacitated worker stops, unless the task has to bring them
        // somewhere safe first.
        if self.state.profile.effort_driven && ctx.performer.performance_rating() <= 0.0 {
            if !self.behavior.request_wrap_up(&mut self.state, ctx) {
                log::info!(
                    "{} is incapacitated and stopped '{}'",
                    ctx.performer.name(),
                    self.state.profile.name
                );
                self.end(ctx);
                return Ok(time);
            }
            log::warn!(
                "{} is incapacitated, wrapping up '{}'",
                ctx.performer.name(),
                self.state.profile.name
            );
        }

        if let Err(err) = self.behavior.before_step(&mut self.state, ctx) {
            return self.fail(ctx, err);
        }

        let mut remaining = time;
        while remaining > 0.0 && !self.state.done {
            let Some(phase) = self.state.phase else {
                let err = TaskError::NoActivePhase {
                    task: self.state.profile.name.clone(),
                };
                return self.fail(ctx, err);
            };
            let Some(handler) = self.handlers.get(&phase).copied() else {
                let err = TaskError::InvalidPhase {
                    task: self.state.profile.name.clone(),
                    phase: phase.name().to_string(),
                };
                return self.fail(ctx, err);
            };

            let left = match handler(&mut self.behavior, &mut self.state, ctx, remaining) {
                Ok(left) => left,
                Err(err) => return self.fail(ctx, err),
            };
            if !left.is_finite() || left < 0.0 || left > remaining {
                let err = TaskError::TimeOverrun {
                    task: self.state.profile.name.clone(),
                    phase: phase.name().to_string(),
                    offered: remaining,
                    returned: left,
                };
                return self.fail(ctx, err);
            }

            let consumed = remaining - left;
            remaining = left;
            if consumed > 0.0 {
                self.state.elapsed += consumed;
                self.add_experience(ctx, phase, consumed);
            } else if self.state.phase == Some(phase) {
                // Waiting on something; try again next tick.
                break;
            }
        }

        let consumed = time - remaining;
        if consumed > 0.0 {
            self.modify_stress(ctx, consumed);
            self.behavior.after_step(&self.state, ctx, consumed);
        }
        self.fire_end_hook(ctx);
        Ok(remaining)
    }

    /// End the task now, whatever its phase. Idempotent.
    pub fn end(&mut self, ctx: &mut TaskContext<'_>) {
        self.state.end();
        self.fire_end_hook(ctx);
    }

    /// External cancellation: interruptible tasks end, others are asked to
    /// wrap up and end only if they decline.
    pub fn cancel(&mut self, ctx: &mut TaskContext<'_>) {
        if self.state.done {
            return;
        }
        if !self.state.profile.interruptible && self.behavior.request_wrap_up(&mut self.state, ctx) {
            log::info!(
                "{} is wrapping up '{}' before stopping",
                ctx.performer.name(),
                self.state.profile.name
            );
            return;
        }
        self.end(ctx);
    }

    pub fn snapshot(&self) -> Result<TaskSnapshot, TaskError> {
        let behavior = serde_json::to_string(&self.behavior)
            .map_err(|e| TaskError::Snapshot(e.to_string()))?;
        Ok(TaskSnapshot {
            kind: B::KIND,
            name: self.state.profile.name.clone(),
            phase: self.state.phase.map(|p| p.name().to_string()),
            elapsed: self.state.elapsed,
            duration: self.state.duration,
            started: self.state.started,
            done: self.state.done,
            teacher: self.state.teacher,
            behavior,
        })
    }

    /// Rebuild a task from a snapshot of the same kind.
    pub fn from_snapshot(snapshot: &TaskSnapshot, config: &TaskConfig) -> Result<Self, TaskError> {
        if snapshot.kind != B::KIND {
            return Err(TaskError::Snapshot(format!(
                "expected a {:?} snapshot, found {:?}",
                B::KIND,
                snapshot.kind
            )));
        }
        let behavior: B = serde_json::from_str(&snapshot.behavior)
            .map_err(|e| TaskError::Snapshot(e.to_string()))?;
        let mut task = Self::new(behavior, snapshot.duration, config);

        if let Some(name) = &snapshot.phase {
            task.register_phase_table()?;
            let phase = task
                .state
                .phases
                .iter()
                .copied()
                .find(|p| p.name() == name)
                .ok_or_else(|| {
                    TaskError::Snapshot(format!(
                        "'{}' has no phase named '{}'",
                        task.state.profile.name, name
                    ))
                })?;
            task.state.phase = Some(phase);
        }

        task.state.elapsed = snapshot.elapsed;
        task.state.started = snapshot.started;
        task.state.done = snapshot.done;
        task.state.teacher = snapshot.teacher;
        task.end_hook_fired = snapshot.done;
        Ok(task)
    }

    fn fail(&mut self, ctx: &mut TaskContext<'_>, err: TaskError) -> Result<f64, TaskError> {
        log::error!(
            "{}: '{}' force-ended: {}",
            ctx.performer.name(),
            self.state.profile.name,
            err
        );
        self.end(ctx);
        Err(err)
    }

    fn fire_end_hook(&mut self, ctx: &mut TaskContext<'_>) {
        if self.state.done && !self.end_hook_fired {
            self.end_hook_fired = true;
            self.behavior.on_end(&self.state, ctx);
            log::debug!(
                "{} ended '{}' after {:.2} msol",
                ctx.performer.name(),
                self.state.profile.name,
                self.state.elapsed
            );
        }
    }

    fn add_experience(&self, ctx: &mut TaskContext<'_>, phase: Phase, time: f64) {
        let profile = &self.state.profile;
        if profile.experience.is_empty() {
            return;
        }
        let aptitude = ctx.performer.attribute(profile.experience_attribute);
        let academic = ctx.performer.attribute(NaturalAttribute::AcademicAptitude);
        let teaching = experience::teaching_modifier(self.state.teacher.as_ref(), academic);
        for gain in profile.experience.iter().filter(|g| g.applies_in(phase)) {
            let points = experience::experience_points(time, gain.divisor, aptitude, teaching);
            ctx.performer.add_experience(gain.skill, points, time);
        }
    }

    fn modify_stress(&self, ctx: &mut TaskContext<'_>, time: f64) {
        let profile = &self.state.profile;
        let skill = profile
            .primary_skill
            .map_or(0, |s| ctx.performer.effective_skill_level(s));
        let per_msol =
            experience::effective_stress(profile.stress_modifier, skill, ctx.config.stress.skill_relief);
        if per_msol != 0.0 {
            ctx.performer.add_stress(per_msol * time);
        }
    }
}

/// Scheduler-facing view of any task.
pub trait ColonyTask: Send + Sync {
    fn kind(&self) -> TaskKind;
    fn name(&self) -> &str;
    /// Current phase, for diagnostics and display.
    fn phase(&self) -> Option<Phase>;
    fn is_done(&self) -> bool;
    fn elapsed(&self) -> f64;
    fn step(&mut self, ctx: &mut TaskContext<'_>, time: f64) -> Result<f64, TaskError>;
    fn end(&mut self, ctx: &mut TaskContext<'_>);
    fn cancel(&mut self, ctx: &mut TaskContext<'_>);
    fn set_teacher(&mut self, teacher: Option<Teacher>);
    fn snapshot(&self) -> Result<TaskSnapshot, TaskError>;
}

impl<B: TaskBehavior> ColonyTask for Task<B> {
    fn kind(&self) -> TaskKind {
        B::KIND
    }

    fn name(&self) -> &str {
        self.state.name()
    }

    fn phase(&self) -> Option<Phase> {
        self.state.phase
    }

    fn is_done(&self) -> bool {
        self.state.done
    }

    fn elapsed(&self) -> f64 {
        self.state.elapsed
    }

    fn step(&mut self, ctx: &mut TaskContext<'_>, time: f64) -> Result<f64, TaskError> {
        Task::step(self, ctx, time)
    }

    fn end(&mut self, ctx: &mut TaskContext<'_>) {
        Task::end(self, ctx)
    }

    fn cancel(&mut self, ctx: &mut TaskContext<'_>) {
        Task::cancel(self, ctx)
    }

    fn set_teacher(&mut self, teacher: Option<Teacher>) {
        self.state.set_teacher(teacher)
    }

    fn snapshot(&self) -> Result<TaskSnapshot, TaskError> {
        Task::snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    const FIRST: Phase = Phase::new("First");
    const SECOND: Phase = Phase::new("Second");
    const STRAY: Phase = Phase::new("Stray");
    const FIRST_ONLY: &[Phase] = &[FIRST];

    /// Works `per_tick` in FIRST, then moves to SECOND and waits there.
    #[derive(Debug, Default, Serialize, Deserialize)]
    struct TwoStep {
        per_tick: f64,
        first_left: f64,
        ends_seen: u32,
        overrun: bool,
        jump_to_stray: bool,
    }

    fn first(p: &mut TwoStep, state: &mut TaskState, _: &mut TaskContext<'_>, time: f64) -> Result<f64, TaskError> {
        if p.overrun {
            return Ok(time + 1.0);
        }
        if p.jump_to_stray {
            state.set_phase(STRAY)?;
        }
        let work = time.min(p.per_tick).min(p.first_left);
        p.first_left -= work;
        if p.first_left <= 0.0 {
            state.set_phase(SECOND)?;
        }
        Ok(time - work)
    }

    fn second(_: &mut TwoStep, state: &mut TaskState, _: &mut TaskContext<'_>, time: f64) -> Result<f64, TaskError> {
        if state.duration_reached() {
            state.end();
        }
        Ok(time)
    }

    impl TaskBehavior for TwoStep {
        const KIND: TaskKind = TaskKind::Maintenance;

        fn phase_table() -> Vec<(Phase, PhaseHandler<Self>)> {
            vec![
                (FIRST, first as PhaseHandler<Self>),
                (SECOND, second as PhaseHandler<Self>),
            ]
        }

        fn profile(&self, _: &TaskConfig) -> TaskProfile {
            let mut profile = TaskProfile::new("Two Step");
            profile.stress_modifier = 0.2;
            profile.primary_skill = Some(SkillType::Mechanics);
            profile.experience = vec![
                SkillGain::always(SkillType::Mechanics, 10.0),
                SkillGain::during(SkillType::Areology, 100.0, FIRST_ONLY),
            ];
            profile
        }

        fn on_end(&mut self, _: &TaskState, _: &mut TaskContext<'_>) {
            self.ends_seen += 1;
        }
    }

    fn two_step(per_tick: f64, first_left: f64) -> Task<TwoStep> {
        let config = TaskConfig::default();
        let mut task = Task::new(
            TwoStep {
                per_tick,
                first_left,
                ..Default::default()
            },
            TaskDuration::Bounded(100.0),
            &config,
        );
        task.register_phase_table().unwrap();
        task.set_phase(FIRST).unwrap();
        task
    }

    #[test]
    fn step_returns_unused_time() {
        let mut h = Harness::new();
        let mut task = two_step(0.4, 10.0);
        let left = task.step(&mut h.ctx(), 1.0).unwrap();
        assert!((left - 0.6).abs() < 1e-12);
        assert!((task.state().elapsed() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn transition_carries_leftover_into_next_phase() {
        let mut h = Harness::new();
        let mut task = two_step(5.0, 0.3);
        let left = task.step(&mut h.ctx(), 1.0).unwrap();
        assert_eq!(task.phase(), Some(SECOND));
        // SECOND waits, so 0.7 comes back
        assert!((left - 0.7).abs() < 1e-12);
    }

    #[test]
    fn unregistered_phase_rejected() {
        let mut task = two_step(1.0, 1.0);
        let err = task.set_phase(STRAY).unwrap_err();
        assert!(matches!(err, TaskError::InvalidPhase { .. }));
        assert_eq!(task.phase(), Some(FIRST));
    }

    #[test]
    fn registration_closes_after_first_step() {
        let mut h = Harness::new();
        let mut task = two_step(1.0, 10.0);
        // Re-registering before start is a no-op
        task.register_phase(FIRST, first).unwrap();
        task.step(&mut h.ctx(), 1.0).unwrap();
        let err = task.register_phase(STRAY, second).unwrap_err();
        assert!(matches!(err, TaskError::RegistrationClosed { .. }));
    }

    #[test]
    fn missing_phase_is_fatal_for_the_task() {
        let mut h = Harness::new();
        let config = TaskConfig::default();
        let mut task = Task::new(TwoStep::default(), TaskDuration::Unbounded, &config);
        task.register_phase_table().unwrap();
        let err = task.step(&mut h.ctx(), 1.0).unwrap_err();
        assert!(matches!(err, TaskError::NoActivePhase { .. }));
        assert!(task.is_done());
        assert_eq!(task.behavior().ends_seen, 1);
    }

    #[test]
    fn handler_moving_to_unknown_phase_force_ends() {
        let mut h = Harness::new();
        let mut task = two_step(1.0, 10.0);
        task.behavior_mut().jump_to_stray = true;
        let err = task.step(&mut h.ctx(), 1.0).unwrap_err();
        assert!(matches!(err, TaskError::InvalidPhase { .. }));
        assert!(task.is_done());
    }

    #[test]
    fn overrun_is_a_contract_violation() {
        let mut h = Harness::new();
        let mut task = two_step(1.0, 10.0);
        task.behavior_mut().overrun = true;
        let err = task.step(&mut h.ctx(), 1.0).unwrap_err();
        assert!(matches!(err, TaskError::TimeOverrun { .. }));
        assert!(task.is_done());
    }

    #[test]
    fn invalid_time_rejected_without_ending() {
        let mut h = Harness::new();
        let mut task = two_step(1.0, 10.0);
        assert!(task.step(&mut h.ctx(), -1.0).is_err());
        assert!(task.step(&mut h.ctx(), f64::NAN).is_err());
        assert!(!task.is_done());
    }

    #[test]
    fn done_task_returns_time_untouched() {
        let mut h = Harness::new();
        let mut task = two_step(1.0, 10.0);
        task.end(&mut h.ctx());
        let left = task.step(&mut h.ctx(), 3.0).unwrap();
        assert!((left - 3.0).abs() < f64::EPSILON);
        assert_eq!(task.state().elapsed(), 0.0);
    }

    #[test]
    fn end_hook_fires_once() {
        let mut h = Harness::new();
        let mut task = two_step(1.0, 10.0);
        task.end(&mut h.ctx());
        task.end(&mut h.ctx());
        task.cancel(&mut h.ctx());
        assert_eq!(task.behavior().ends_seen, 1);
    }

    #[test]
    fn incapacitated_performer_ends_effort_task() {
        let mut h = Harness::new();
        h.performer.performance = 0.0;
        let mut task = two_step(1.0, 10.0);
        let left = task.step(&mut h.ctx(), 1.0).unwrap();
        assert!((left - 1.0).abs() < f64::EPSILON);
        assert!(task.is_done());
    }

    #[test]
    fn experience_follows_phase_filter() {
        let mut h = Harness::new();
        h.performer.set_attribute(NaturalAttribute::ExperienceAptitude, 50);
        let mut task = two_step(5.0, 2.0);
        task.step(&mut h.ctx(), 10.0).unwrap();
        // 2 msol consumed in FIRST: mechanics 2/10, areology 2/100
        assert!((h.performer.experience(SkillType::Mechanics) - 0.2).abs() < 1e-12);
        assert!((h.performer.experience(SkillType::Areology) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn teacher_boosts_experience() {
        let mut h = Harness::new();
        h.performer.set_attribute(NaturalAttribute::ExperienceAptitude, 50);
        h.performer.set_attribute(NaturalAttribute::AcademicAptitude, 50);
        let mut task = two_step(1.0, 10.0);
        task.state_mut().set_teacher(Some(Teacher { teaching: 50 }));
        task.step(&mut h.ctx(), 1.0).unwrap();
        // 1/10 * 2.0
        assert!((h.performer.experience(SkillType::Mechanics) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn stress_scaled_by_primary_skill() {
        let mut h = Harness::new();
        h.performer.set_skill(SkillType::Mechanics, 5);
        let mut task = two_step(1.0, 10.0);
        task.step(&mut h.ctx(), 1.0).unwrap();
        // 0.2 - 0.2 * 5 * 0.1 = 0.1 per msol
        assert!((h.performer.stress - 0.1).abs() < 1e-12);
    }

    #[test]
    fn snapshot_restores_phase_and_counters() {
        let mut h = Harness::new();
        let config = TaskConfig::default();
        let mut task = two_step(5.0, 0.5);
        task.step(&mut h.ctx(), 1.0).unwrap();
        let snap = task.snapshot().unwrap();
        assert_eq!(snap.phase.as_deref(), Some("Second"));

        let restored = Task::<TwoStep>::from_snapshot(&snap, &config).unwrap();
        assert_eq!(restored.phase(), Some(SECOND));
        assert!((restored.state().elapsed() - task.state().elapsed()).abs() < 1e-12);
        assert!(restored.state().has_started());
    }

    #[test]
    fn snapshot_with_unknown_phase_rejected() {
        let config = TaskConfig::default();
        let mut snap = two_step(1.0, 1.0).snapshot().unwrap();
        snap.phase = Some("Nowhere".into());
        assert!(matches!(
            Task::<TwoStep>::from_snapshot(&snap, &config),
            Err(TaskError::Snapshot(_))
        ));
        snap.kind = TaskKind::Converse;
        assert!(Task::<TwoStep>::from_snapshot(&snap, &config).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Remainder stays within the offer and elapsed grows by exactly
            /// what was consumed; the phase is always a registered one.
            #[test]
            fn prop_time_conservation(
                per_tick in 0.0f64..3.0,
                first_left in 0.0f64..20.0,
                offers in prop::collection::vec(0.0f64..5.0, 1..30),
            ) {
                let mut h = Harness::new();
                let mut task = two_step(per_tick, first_left);
                for offer in offers {
                    let before = task.state().elapsed();
                    let left = task.step(&mut h.ctx(), offer).unwrap();
                    prop_assert!(left >= 0.0 && left <= offer);
                    prop_assert!((task.state().elapsed() - (before + offer - left)).abs() < 1e-9);
                    if let Some(phase) = task.phase() {
                        prop_assert!(task.state().is_registered(phase));
                    }
                }
            }

            #[test]
            fn prop_end_is_idempotent(calls in 1usize..6) {
                let mut h = Harness::new();
                let mut task = two_step(1.0, 5.0);
                for _ in 0..calls {
                    task.end(&mut h.ctx());
                }
                prop_assert!(task.is_done());
                prop_assert_eq!(task.behavior().ends_seen, 1);
            }
        }
    }
}
