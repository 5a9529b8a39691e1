//! Extravehicular activity: leave the habitat, work outside, come back.
//!
//! [`Eva<S>`] wraps a [`SiteWork`] with the shared outdoor sequence:
//!
//! ```text
//! WALK_TO_AIRLOCK -> EGRESS -> WALK_TO_SITE -> <site phases>
//!     -> WALK_BACK_INSIDE -> INGRESS -> done
//! ```
//!
//! Airlock slots are claimed every tick the worker is cycling. A busy airlock
//! is retried until the configured patience runs out; a missing or broken
//! one ends the EVA at egress, or sends the worker to the next closest
//! airlock at ingress. Site phases call [`Eva::check_readiness`] each tick,
//! which sends the worker back inside the moment a hazard appears or the
//! site time is used up.
//!
//! An EVA is not interruptible. Cancelling it while outside asks the worker
//! to come back in through the airlock.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::claim::{ClaimOutcome, ClaimPatience, ClaimRequest, ClaimWindow, PatienceVerdict};
use crate::config::TaskConfig;
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::experience::{self, SkillGain};
use crate::phase::Phase;
use crate::snapshot::TaskKind;
use crate::task::{PhaseHandler, Task, TaskBehavior, TaskDuration, TaskProfile, TaskState};
use crate::world::{AirlockId, Performer, Position, SkillType, WorkerLocation};

pub const WALK_TO_AIRLOCK: Phase = Phase::new("Walk to Airlock");
pub const EGRESS: Phase = Phase::new("Egress");
pub const WALK_TO_SITE: Phase = Phase::new("Walk to Outside Site");
pub const WALK_BACK_INSIDE: Phase = Phase::new("Walk Back Inside");
pub const INGRESS: Phase = Phase::new("Ingress");

/// The outdoor part of an EVA task.
pub trait SiteWork: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    const KIND: TaskKind;
    const NAME: &'static str;
    /// Phases run at the site, first one entered on arrival.
    const SITE_PHASES: &'static [Phase];

    fn site_handlers() -> Vec<(Phase, PhaseHandler<Eva<Self>>)>;

    /// Skill trained while working at the site.
    fn outside_skill(&self) -> SkillType;

    /// Stress per millisol on top of the EVA's own.
    fn stress_modifier(&self, config: &TaskConfig) -> f64;

    fn on_end(&mut self, _state: &TaskState, _ctx: &mut TaskContext<'_>) {}
}

/// Where the work happens and how long the worker may stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaSite {
    pub anchor: Position,
    /// Airlock used to leave; also the first choice to come back through.
    pub airlock: Option<AirlockId>,
    pub time_on_site: f64,
    /// `None` means no cap.
    pub site_duration: Option<f64>,
}

/// How an EVA finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaOutcome {
    Pending,
    /// Back inside through an airlock.
    Completed,
    /// Ended before the worker ever left.
    Aborted,
    /// Ended with the worker outside or stuck in an airlock.
    Stranded,
}

/// Reasons to cut an EVA short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaHazard {
    ReturnRequested,
    Darkness,
    Radiation,
    LowPerformance,
    SuitProblem,
    SiteTimeUp,
}

enum AirlockTick {
    /// Still cycling; all offered time used.
    Cycling,
    /// Cycle complete after using this much time. The slot is released.
    Cycled(f64),
    /// Busy airlock, try again next tick.
    Wait,
    GaveUp,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eva<S> {
    pub work: S,
    site: EvaSite,
    held_slot: Option<AirlockId>,
    cycle_progress: f64,
    patience: ClaimPatience,
    return_requested: bool,
    outcome: EvaOutcome,
}

impl<S: SiteWork> Eva<S> {
    /// Build an EVA task, or a task that is already ended if the performer
    /// cannot go outside right now.
    pub fn begin(
        work: S,
        anchor: Position,
        site_duration: Option<f64>,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Task<Self>, TaskError> {
        let eva = Eva {
            work,
            site: EvaSite {
                anchor,
                airlock: None,
                time_on_site: 0.0,
                site_duration,
            },
            held_slot: None,
            cycle_progress: 0.0,
            patience: ClaimPatience::new(ctx.config.eva.airlock_patience),
            return_requested: false,
            outcome: EvaOutcome::Pending,
        };
        let mut task = Task::new(eva, TaskDuration::Unbounded, ctx.config);

        let airlock = match preflight(ctx) {
            Ok(airlock) => airlock,
            Err(reason) => {
                log::warn!("{} cannot start '{}': {}", ctx.performer.name(), S::NAME, reason);
                task.end(ctx);
                return Ok(task);
            }
        };

        task.behavior_mut().site.airlock = Some(airlock);
        task.register_phase_table()?;
        task.set_phase(WALK_TO_AIRLOCK)?;
        log::info!(
            "{} heading out through airlock {:?} for '{}'",
            ctx.performer.name(),
            airlock,
            S::NAME
        );
        Ok(task)
    }

    pub fn site(&self) -> &EvaSite {
        &self.site
    }

    pub fn outcome(&self) -> EvaOutcome {
        self.outcome
    }

    pub fn held_slot(&self) -> Option<AirlockId> {
        self.held_slot
    }

    pub fn return_requested(&self) -> bool {
        self.return_requested
    }

    pub fn airlock_patience(&self) -> &ClaimPatience {
        &self.patience
    }

    /// Ask the worker to wrap up and come back inside.
    pub fn request_return(&mut self) {
        self.return_requested = true;
    }

    /// First hazard that should end the outdoor work, if any.
    pub fn should_end_eva_operation(&self, ctx: &TaskContext<'_>, check_light: bool) -> Option<EvaHazard> {
        let eva = &ctx.config.eva;
        let at = ctx.performer.position();

        if self.return_requested {
            return Some(EvaHazard::ReturnRequested);
        }
        if check_light
            && (ctx.environment.is_sun_setting(at)
                || ctx.environment.solar_irradiance(at) <= eva.min_sunlight
                || ctx.environment.in_dark_polar_region(at))
        {
            return Some(EvaHazard::Darkness);
        }
        if ctx.environment.radiation_event(at) {
            return Some(EvaHazard::Radiation);
        }
        if ctx.performer.performance_rating() < eva.min_performance {
            return Some(EvaHazard::LowPerformance);
        }
        if ctx.performer.needs_eva_suit() {
            let suit_ok = ctx
                .performer
                .suit()
                .is_some_and(|s| !s.malfunction && s.oxygen_fraction >= eva.min_oxygen_fraction);
            if !suit_ok {
                return Some(EvaHazard::SuitProblem);
            }
        }
        None
    }

    /// Count time at the site. True once the site time cap is reached.
    pub fn add_time_on_site(&mut self, time: f64) -> bool {
        self.site.time_on_site += time;
        self.site
            .site_duration
            .is_some_and(|cap| self.site.time_on_site >= cap)
    }

    /// Hazard and site-time check for a site phase. Returns true if the EVA
    /// was aborted and the handler should hand back its time.
    pub fn check_readiness(
        &mut self,
        state: &mut TaskState,
        ctx: &mut TaskContext<'_>,
        time: f64,
        check_light: bool,
    ) -> Result<bool, TaskError> {
        if let Some(hazard) = self.should_end_eva_operation(ctx, check_light) {
            self.abort_eva(state, ctx, hazard)?;
            return Ok(true);
        }
        if self.add_time_on_site(time) {
            self.abort_eva(state, ctx, EvaHazard::SiteTimeUp)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Outside: head back to the airlock. Inside: just stop.
    pub fn abort_eva(
        &mut self,
        state: &mut TaskState,
        ctx: &mut TaskContext<'_>,
        hazard: EvaHazard,
    ) -> Result<(), TaskError> {
        log::info!(
            "{} cutting '{}' short: {:?}",
            ctx.performer.name(),
            state.name(),
            hazard
        );
        if ctx.performer.location() == WorkerLocation::Outside {
            if !matches!(state.phase(), Some(p) if p == WALK_BACK_INSIDE || p == INGRESS) {
                state.set_phase(WALK_BACK_INSIDE)?;
            }
        } else {
            state.end();
        }
        Ok(())
    }

    /// Roll for a suit accident over `time` millisols of outdoor work.
    pub fn check_for_accident(&self, ctx: &mut TaskContext<'_>, time: f64) {
        use rand::Rng;

        let skill = ctx.performer.effective_skill_level(SkillType::EvaOperations);
        let chance = experience::accident_chance(ctx.config.eva.base_accident_chance, time, skill, 0.0);
        if chance > 0.0 && ctx.rng.gen::<f64>() < chance {
            log::warn!("{} had an accident during '{}'", ctx.performer.name(), S::NAME);
            ctx.performer.suit_accident();
        }
    }

    fn airlock_tick(&mut self, ctx: &mut TaskContext<'_>, airlock: AirlockId, time: f64) -> AirlockTick {
        let requester = ctx.performer.id();
        let request = ClaimRequest {
            requester,
            amount: 1.0,
            window: ClaimWindow::single(ctx.msol),
        };
        match ctx.colony.request_slot(airlock, &request) {
            ClaimOutcome::Granted(_) => {
                self.patience.record_grant();
                if self.held_slot != Some(airlock) {
                    self.held_slot = Some(airlock);
                    self.cycle_progress = 0.0;
                    ctx.performer.set_location(WorkerLocation::InAirlock);
                }
                let cycle_time = ctx.config.eva.airlock_cycle_time;
                let used = (cycle_time - self.cycle_progress).max(0.0).min(time);
                self.cycle_progress += used;
                if self.cycle_progress >= cycle_time {
                    ctx.colony.release_slot(airlock, requester);
                    self.held_slot = None;
                    self.cycle_progress = 0.0;
                    AirlockTick::Cycled(used)
                } else {
                    AirlockTick::Cycling
                }
            }
            ClaimOutcome::Denied(denial) if denial.is_transient() => {
                log::debug!("{} waiting on airlock {:?}", ctx.performer.name(), airlock);
                match self.patience.record_denial(1.0) {
                    PatienceVerdict::Retry => AirlockTick::Wait,
                    PatienceVerdict::GiveUp => AirlockTick::GaveUp,
                }
            }
            ClaimOutcome::Denied(_) => {
                if let Some(held) = self.held_slot.take() {
                    ctx.colony.release_slot(held, requester);
                    self.cycle_progress = 0.0;
                }
                AirlockTick::Unavailable
            }
        }
    }
}

fn preflight(ctx: &TaskContext<'_>) -> Result<AirlockId, &'static str> {
    let performer = &*ctx.performer;
    let eva = &ctx.config.eva;
    if performer.location() != WorkerLocation::Inside {
        return Err("not inside");
    }
    if performer.performance_rating() < eva.fitness_threshold {
        return Err("not fit for EVA");
    }
    if performer.needs_eva_suit() {
        match performer.suit() {
            None => return Err("no EVA suit"),
            Some(s) if s.malfunction || s.oxygen_fraction < eva.min_oxygen_fraction => {
                return Err("EVA suit not ready")
            }
            Some(_) => {}
        }
    }
    let settlement = performer.settlement().ok_or("not in a settlement")?;
    ctx.colony
        .closest_airlock(settlement, performer.position())
        .ok_or("no operational airlock")
}

/// Walk toward `target` for up to `time`. Returns the time used.
pub fn walk_toward(performer: &mut dyn Performer, target: Position, time: f64, speed: f64) -> f64 {
    let from = performer.position();
    let dist = from.distance(target);
    if dist <= f64::EPSILON || speed <= 0.0 {
        performer.set_position(target);
        return 0.0;
    }
    let used = (dist / speed).min(time);
    performer.set_position(from.toward(target, used * speed));
    used
}

fn walk_to_airlock<S: SiteWork>(
    eva: &mut Eva<S>,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    let target = eva
        .site
        .airlock
        .filter(|a| ctx.colony.is_operational(*a))
        .and_then(|a| ctx.colony.airlock_position(a));
    let Some(target) = target else {
        log::warn!("{} lost the way out for '{}'", ctx.performer.name(), S::NAME);
        state.end();
        return Ok(time);
    };

    let used = walk_toward(ctx.performer, target, time, ctx.config.eva.walk_speed);
    if ctx.performer.position().is_close(target) {
        state.set_phase(EGRESS)?;
    }
    Ok(time - used)
}

fn egress<S: SiteWork>(
    eva: &mut Eva<S>,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    if ctx.performer.needs_eva_suit() && ctx.performer.suit().is_none() {
        log::warn!("{} has no EVA suit for '{}'", ctx.performer.name(), S::NAME);
        state.end();
        return Ok(time);
    }
    let Some(airlock) = eva.site.airlock else {
        state.end();
        return Ok(time);
    };

    match eva.airlock_tick(ctx, airlock, time) {
        AirlockTick::Cycling => Ok(0.0),
        AirlockTick::Cycled(used) => {
            ctx.performer.set_location(WorkerLocation::Outside);
            state.set_phase(WALK_TO_SITE)?;
            Ok(time - used)
        }
        // Waiting in line takes the tick.
        AirlockTick::Wait => Ok(0.0),
        AirlockTick::GaveUp => {
            log::warn!(
                "{} gave up waiting on airlock {:?} for '{}'",
                ctx.performer.name(),
                airlock,
                S::NAME
            );
            state.end();
            Ok(time)
        }
        AirlockTick::Unavailable => {
            log::warn!("airlock {:?} is out of service, '{}' called off", airlock, S::NAME);
            ctx.performer.set_location(WorkerLocation::Inside);
            state.end();
            Ok(time)
        }
    }
}

fn walk_to_site<S: SiteWork>(
    eva: &mut Eva<S>,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    if let Some(hazard) = eva.should_end_eva_operation(ctx, false) {
        eva.abort_eva(state, ctx, hazard)?;
        return Ok(time);
    }
    let target = eva.site.anchor;
    let used = walk_toward(ctx.performer, target, time, ctx.config.eva.walk_speed);
    if ctx.performer.position().is_close(target) {
        match S::SITE_PHASES.first() {
            Some(first) => state.set_phase(*first)?,
            None => state.set_phase(WALK_BACK_INSIDE)?,
        }
    }
    Ok(time - used)
}

fn walk_back_inside<S: SiteWork>(
    eva: &mut Eva<S>,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    let usable = eva
        .site
        .airlock
        .filter(|a| ctx.colony.is_operational(*a));
    let airlock = match usable {
        Some(a) => Some(a),
        None => ctx
            .performer
            .settlement()
            .and_then(|s| ctx.colony.closest_airlock(s, ctx.performer.position())),
    };
    let target = airlock.and_then(|a| ctx.colony.airlock_position(a).map(|p| (a, p)));
    let Some((airlock, target)) = target else {
        log::error!(
            "{} has no airlock to return through from '{}'",
            ctx.performer.name(),
            S::NAME
        );
        eva.outcome = EvaOutcome::Stranded;
        state.end();
        return Ok(time);
    };
    eva.site.airlock = Some(airlock);

    let used = walk_toward(ctx.performer, target, time, ctx.config.eva.walk_speed);
    if ctx.performer.position().is_close(target) {
        state.set_phase(INGRESS)?;
    }
    Ok(time - used)
}

fn ingress<S: SiteWork>(
    eva: &mut Eva<S>,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    let Some(airlock) = eva.site.airlock else {
        state.set_phase(WALK_BACK_INSIDE)?;
        return Ok(time);
    };

    match eva.airlock_tick(ctx, airlock, time) {
        AirlockTick::Cycling => Ok(0.0),
        AirlockTick::Cycled(used) => {
            ctx.performer.set_location(WorkerLocation::Inside);
            eva.outcome = EvaOutcome::Completed;
            state.end();
            Ok(time - used)
        }
        AirlockTick::Wait => Ok(0.0),
        AirlockTick::GaveUp => {
            log::error!(
                "{} could not get back in through airlock {:?}",
                ctx.performer.name(),
                airlock
            );
            eva.outcome = EvaOutcome::Stranded;
            state.end();
            Ok(time)
        }
        AirlockTick::Unavailable => {
            log::warn!("airlock {:?} is out of service, finding another", airlock);
            ctx.performer.set_location(WorkerLocation::Outside);
            eva.site.airlock = None;
            state.set_phase(WALK_BACK_INSIDE)?;
            Ok(time)
        }
    }
}

impl<S: SiteWork> TaskBehavior for Eva<S> {
    const KIND: TaskKind = S::KIND;

    fn phase_table() -> Vec<(Phase, PhaseHandler<Self>)> {
        let mut table = vec![
            (WALK_TO_AIRLOCK, walk_to_airlock::<S> as PhaseHandler<Self>),
            (EGRESS, egress::<S> as PhaseHandler<Self>),
            (WALK_TO_SITE, walk_to_site::<S> as PhaseHandler<Self>),
            (WALK_BACK_INSIDE, walk_back_inside::<S> as PhaseHandler<Self>),
            (INGRESS, ingress::<S> as PhaseHandler<Self>),
        ];
        table.extend(S::site_handlers());
        table
    }

    fn profile(&self, config: &TaskConfig) -> TaskProfile {
        let mut profile = TaskProfile::new(S::NAME);
        profile.stress_modifier = config.eva.stress_modifier + self.work.stress_modifier(config);
        profile.effort_driven = true;
        profile.interruptible = false;
        profile.primary_skill = Some(SkillType::EvaOperations);
        profile.experience = vec![
            SkillGain::always(SkillType::EvaOperations, 100.0),
            SkillGain::during(self.work.outside_skill(), 10.0, S::SITE_PHASES),
        ];
        profile
    }

    fn before_step(&mut self, state: &mut TaskState, ctx: &mut TaskContext<'_>) -> Result<(), TaskError> {
        let heading_in = matches!(state.phase(), Some(p) if p == WALK_BACK_INSIDE || p == INGRESS);
        if ctx.performer.location() == WorkerLocation::Outside
            && !heading_in
            && ctx.performer.performance_rating() < ctx.config.eva.super_unfit_performance
        {
            log::warn!("{} is in no shape to stay outside", ctx.performer.name());
            state.set_phase(WALK_BACK_INSIDE)?;
        }
        Ok(())
    }

    fn after_step(&mut self, _state: &TaskState, ctx: &mut TaskContext<'_>, consumed: f64) {
        if ctx.performer.location() != WorkerLocation::Inside {
            ctx.performer.add_eva_time(S::NAME, consumed);
        }
    }

    fn on_end(&mut self, state: &TaskState, ctx: &mut TaskContext<'_>) {
        if let Some(airlock) = self.held_slot.take() {
            ctx.colony.release_slot(airlock, ctx.performer.id());
            self.cycle_progress = 0.0;
            // An interrupted cycle puts the worker back on the side they came from.
            if ctx.performer.location() == WorkerLocation::InAirlock {
                let side = if state.phase() == Some(EGRESS) {
                    WorkerLocation::Inside
                } else {
                    WorkerLocation::Outside
                };
                ctx.performer.set_location(side);
            }
        }
        self.work.on_end(state, ctx);

        if self.outcome == EvaOutcome::Pending {
            self.outcome = if ctx.performer.location() == WorkerLocation::Inside {
                EvaOutcome::Aborted
            } else {
                log::error!(
                    "{} left outside when '{}' ended",
                    ctx.performer.name(),
                    S::NAME
                );
                EvaOutcome::Stranded
            };
        }
    }

    fn request_wrap_up(&mut self, state: &mut TaskState, ctx: &mut TaskContext<'_>) -> bool {
        let coming_in = state.phase() == Some(INGRESS);
        match ctx.performer.location() {
            WorkerLocation::Outside => {
                self.return_requested = true;
                let heading_in = matches!(state.phase(), Some(p) if p == WALK_BACK_INSIDE || p == INGRESS);
                heading_in || state.set_phase(WALK_BACK_INSIDE).is_ok()
            }
            WorkerLocation::InAirlock if coming_in => {
                self.return_requested = true;
                true
            }
            _ => false,
        }
    }
}
