//! Simulation engine - main entry point for running the settlement

use hecs::{Component, Entity, World};
use rand::rngs::StdRng;
use rand::SeedableRng;

use colony_tasks::config::TaskConfig;
use colony_tasks::context::TaskContext;
use colony_tasks::error::TaskError;
use colony_tasks::snapshot::TaskSnapshot;
use colony_tasks::task::{ColonyTask, TaskDuration};
use colony_tasks::tasks::analyze_map::AnalyzeMap;
use colony_tasks::tasks::converse::Converse;
use colony_tasks::tasks::dig_regolith::DigRegolith;
use colony_tasks::tasks::maintenance::Maintenance;
use colony_tasks::world::{
    PerformerKind, Performer, Position, RosterEntry, StructureId, WorkerId, WorkerLocation,
};

use crate::components::*;
use crate::facilities::Facilities;
use crate::performer::{Body, ColonistPerformer, RobotPerformer};
use crate::surface::SurfaceConditions;

/// Millisols of task time each agent gets per tick.
pub const MSOL_PER_TICK: f64 = 1.0;

/// Default carrying limit in kilograms.
const COLONIST_CARGO: f64 = 40.0;
const ROBOT_CARGO: f64 = 100.0;

/// Work the scheduler can hand an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOrder {
    /// Maintain whichever worn structure the worker picks.
    Maintenance,
    MaintainStructure(StructureId),
    AnalyzeMap {
        computing_needed: f64,
        seed: f64,
        window: f64,
        duration: TaskDuration,
    },
    DigRegolith {
        site: Position,
    },
    Converse,
}

impl TaskOrder {
    fn begin(self, ctx: &mut TaskContext<'_>) -> Result<Box<dyn ColonyTask>, TaskError> {
        let task: Box<dyn ColonyTask> = match self {
            TaskOrder::Maintenance => Box::new(Maintenance::begin(ctx)?),
            TaskOrder::MaintainStructure(s) => Box::new(Maintenance::begin_on(Some(s), ctx)?),
            TaskOrder::AnalyzeMap {
                computing_needed,
                seed,
                window,
                duration,
            } => Box::new(AnalyzeMap::begin(computing_needed, seed, window, duration, ctx)?),
            TaskOrder::DigRegolith { site } => Box::new(DigRegolith::begin(site, ctx)?),
            TaskOrder::Converse => Box::new(Converse::begin(ctx)?),
        };
        Ok(task)
    }
}

/// Errors from scheduler calls.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no agent with id {0:?}")]
    UnknownWorker(WorkerId),
    #[error("agent entity {0:?} is missing components")]
    Detached(Entity),
    #[error("{worker} is busy with {task}")]
    Busy { worker: String, task: String },
    #[error(transparent)]
    Task(#[from] TaskError),
}

/// A task in progress, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub name: String,
    pub phase: Option<String>,
    pub elapsed: f64,
}

/// Main simulation engine
pub struct ColonySim {
    /// ECS world containing colonists and robots
    pub world: World,
    pub facilities: Facilities,
    pub surface: SurfaceConditions,
    pub config: TaskConfig,
    rng: StdRng,
    seed: u64,
    next_worker: u32,
}

impl ColonySim {
    pub fn new(config: TaskConfig, seed: u64) -> Self {
        Self {
            world: World::new(),
            facilities: Facilities::new(),
            surface: SurfaceConditions::default(),
            config,
            rng: StdRng::seed_from_u64(seed),
            seed,
            next_worker: 0,
        }
    }

    /// Current mission time in millisols.
    pub fn msol(&self) -> u32 {
        self.surface.msol
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Spawn a colonist with default skills, a fresh suit and empty pockets.
    pub fn spawn_colonist(&mut self, name: impl Into<String>, whereabouts: Whereabouts) -> WorkerId {
        let id = self.allocate_worker();
        self.world.spawn((
            Worker {
                id,
                name: name.into(),
                kind: PerformerKind::Colonist,
            },
            Condition::default(),
            Skills::default(),
            Attributes::default(),
            whereabouts,
            Cargo::new(COLONIST_CARGO),
            EvaSuit::default(),
            TaskManager::default(),
        ));
        id
    }

    pub fn spawn_robot(&mut self, name: impl Into<String>, whereabouts: Whereabouts) -> WorkerId {
        let id = self.allocate_worker();
        self.world.spawn((
            Worker {
                id,
                name: name.into(),
                kind: PerformerKind::Robot,
            },
            Condition::default(),
            Skills::default(),
            Attributes::default(),
            whereabouts,
            Cargo::new(ROBOT_CARGO),
            TaskManager::default(),
        ));
        id
    }

    fn allocate_worker(&mut self) -> WorkerId {
        self.next_worker += 1;
        WorkerId(self.next_worker)
    }

    pub(crate) fn restore_counters(&mut self, seed: u64, next_worker: u32) {
        self.seed = seed;
        self.next_worker = next_worker;
        self.rng = StdRng::seed_from_u64(seed ^ u64::from(self.surface.msol));
    }

    pub(crate) fn next_worker(&self) -> u32 {
        self.next_worker
    }

    pub fn worker_count(&self) -> usize {
        self.world.query::<&Worker>().iter().count()
    }

    pub fn colonist_count(&self) -> usize {
        self.world
            .query::<&Worker>()
            .iter()
            .filter(|(_, w)| w.kind == PerformerKind::Colonist)
            .count()
    }

    pub fn entity_of(&self, worker: WorkerId) -> Option<Entity> {
        self.world
            .query::<&Worker>()
            .iter()
            .find(|(_, w)| w.id == worker)
            .map(|(entity, _)| entity)
    }

    /// Copy of one of an agent's components.
    pub fn component<T: Component + Clone>(&self, worker: WorkerId) -> Option<T> {
        let entity = self.entity_of(worker)?;
        self.world.get::<&T>(entity).ok().map(|c| (*c).clone())
    }

    /// Mutable access to one of an agent's components.
    pub fn component_mut<T: Component>(&self, worker: WorkerId) -> Option<hecs::RefMut<'_, T>> {
        let entity = self.entity_of(worker)?;
        self.world.get::<&mut T>(entity).ok()
    }

    pub fn current_task(&self, worker: WorkerId) -> Option<TaskStatus> {
        let entity = self.entity_of(worker)?;
        let manager = self.world.get::<&TaskManager>(entity).ok()?;
        let task = manager.current.as_deref()?;
        Some(TaskStatus {
            name: task.name().to_string(),
            phase: task.phase().map(|p| p.name().to_string()),
            elapsed: task.elapsed(),
        })
    }

    /// Saved form of the agent's running task.
    pub fn task_snapshot(&self, worker: WorkerId) -> Option<TaskSnapshot> {
        let entity = self.entity_of(worker)?;
        let manager = self.world.get::<&TaskManager>(entity).ok()?;
        let task = manager.current.as_deref()?;
        match task.snapshot() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::error!("Cannot snapshot {}: {}", task.name(), e);
                None
            }
        }
    }

    pub fn last_finished(&self, worker: WorkerId) -> Option<FinishedTask> {
        let entity = self.entity_of(worker)?;
        let manager = self.world.get::<&TaskManager>(entity).ok()?;
        manager.last_finished.clone()
    }

    pub fn is_busy(&self, worker: WorkerId) -> bool {
        self.entity_of(worker)
            .and_then(|e| self.world.get::<&TaskManager>(e).ok().map(|m| m.is_busy()))
            .unwrap_or(false)
    }

    /// Start a task for an idle agent.
    ///
    /// A task that ends before its first step (nothing to do, no partner,
    /// unfit for EVA) is recorded as finished right away.
    pub fn assign(&mut self, worker: WorkerId, order: TaskOrder) -> Result<(), EngineError> {
        let entity = self.entity_of(worker).ok_or(EngineError::UnknownWorker(worker))?;
        self.publish_roster();
        self.with_agent(entity, |manager, ctx| {
            if let Some(task) = manager.current.as_deref().filter(|t| !t.is_done()) {
                return Err(EngineError::Busy {
                    worker: ctx.performer.name().to_string(),
                    task: task.name().to_string(),
                });
            }
            let task = order.begin(ctx)?;
            let born_dead = task.is_done();
            log::info!("{} assigned {}", ctx.performer.name(), task.name());
            manager.current = Some(task);
            if born_dead {
                manager.retire(None);
            }
            Ok(())
        })??;
        self.settle(entity);
        Ok(())
    }

    /// Ask an agent to stop. Returns true if the task ended.
    ///
    /// Uninterruptible tasks decide for themselves; an EVA heads back
    /// inside and ends later.
    pub fn cancel(&mut self, worker: WorkerId) -> Result<bool, EngineError> {
        let entity = self.entity_of(worker).ok_or(EngineError::UnknownWorker(worker))?;
        let ended = self.with_agent(entity, |manager, ctx| {
            let Some(task) = manager.current.as_deref_mut() else {
                return false;
            };
            task.cancel(ctx);
            let done = task.is_done();
            if done {
                manager.retire(None);
            }
            done
        })?;
        self.settle(entity);
        Ok(ended)
    }

    /// Advance the settlement by one millisol.
    ///
    /// The roster is published first; agents then step one at a time in id
    /// order, so every facility reservation is made by a single writer.
    pub fn tick(&mut self) {
        self.publish_roster();
        for entity in self.agents_in_order() {
            if let Err(e) = self.step_agent(entity) {
                log::error!("Skipping agent {:?}: {}", entity, e);
            }
            self.settle(entity);
        }
        self.surface.msol = self.surface.msol.saturating_add(1);
        self.facilities.advance(self.surface.msol, MSOL_PER_TICK);
    }

    pub fn run(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn agents_in_order(&self) -> Vec<Entity> {
        let mut agents: Vec<(WorkerId, Entity)> = self
            .world
            .query::<&Worker>()
            .iter()
            .map(|(entity, w)| (w.id, entity))
            .collect();
        agents.sort_by_key(|(id, _)| *id);
        agents.into_iter().map(|(_, e)| e).collect()
    }

    /// Snapshot of every agent for cross-agent reads during the tick.
    pub fn publish_roster(&mut self) {
        let mut roster: Vec<RosterEntry> = self
            .world
            .query::<(&Worker, &Whereabouts, &TaskManager)>()
            .iter()
            .map(|(_, (w, at, manager))| RosterEntry {
                id: w.id,
                kind: w.kind,
                building: at.building,
                settlement: at.settlement,
                location: at.location,
                busy: manager.is_busy(),
            })
            .collect();
        roster.sort_by_key(|e| e.id);
        self.facilities.roster = roster;
    }

    fn step_agent(&mut self, entity: Entity) -> Result<(), EngineError> {
        self.with_agent(entity, |manager, ctx| {
            let Some(task) = manager.current.as_deref_mut() else {
                return;
            };
            let result = task.step(ctx, MSOL_PER_TICK);
            let done = task.is_done();
            match result {
                Ok(_) if done => {
                    log::info!("{} finished {}", ctx.performer.name(), task.name());
                    manager.retire(None);
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("{} dropped {}: {}", ctx.performer.name(), task.name(), e);
                    manager.retire(Some(e.to_string()));
                }
            }
        })
    }

    /// Idle agents inside unload their cargo and service their suit.
    fn settle(&mut self, entity: Entity) {
        let Ok((at, cargo, suit, manager)) = self
            .world
            .query_one_mut::<(&Whereabouts, &mut Cargo, Option<&mut EvaSuit>, &TaskManager)>(entity)
        else {
            return;
        };
        if manager.is_busy() || at.location != WorkerLocation::Inside {
            return;
        }
        for (resource, amount) in cargo.unload() {
            self.facilities.deposit(resource, amount);
        }
        if let Some(suit) = suit {
            suit.service();
        }
    }

    /// Borrow an agent's components as a `Performer` and build the context
    /// a task step needs.
    fn with_agent<T>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut TaskManager, &mut TaskContext<'_>) -> T,
    ) -> Result<T, EngineError> {
        let Self {
            world,
            facilities,
            surface,
            config,
            rng,
            ..
        } = self;
        let (worker, condition, skills, attributes, whereabouts, cargo, suit, manager) = world
            .query_one_mut::<(
                &Worker,
                &mut Condition,
                &mut Skills,
                &Attributes,
                &mut Whereabouts,
                &mut Cargo,
                Option<&mut EvaSuit>,
                &mut TaskManager,
            )>(entity)
            .map_err(|_| EngineError::Detached(entity))?;

        let body = Body {
            worker,
            condition,
            skills,
            attributes,
            whereabouts,
            cargo,
        };
        let mut colonist;
        let mut robot;
        let performer: &mut dyn Performer = match worker.kind {
            PerformerKind::Colonist => {
                colonist = ColonistPerformer { body, suit };
                &mut colonist
            }
            PerformerKind::Robot => {
                robot = RobotPerformer { body };
                &mut robot
            }
        };
        let mut ctx = TaskContext {
            performer,
            colony: facilities,
            environment: &*surface,
            rng,
            config: &*config,
            msol: surface.msol,
        };
        Ok(f(manager, &mut ctx))
    }
}

impl Default for ColonySim {
    fn default() -> Self {
        Self::new(TaskConfig::default(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facilities::{Airlock, ComputeNode, Structure};
    use colony_tasks::world::{ResourceKind, SettlementId, SkillType};

    const HOME: SettlementId = SettlementId(1);

    fn quiet_config() -> TaskConfig {
        let mut config = TaskConfig::default();
        config.eva.base_accident_chance = 0.0;
        config.maintenance.base_accident_chance = 0.0;
        config.eva.airlock_cycle_time = 2.0;
        config.eva.walk_speed = 10.0;
        config.compute.jitter_min = 1.0;
        config.compute.jitter_max = 1.0;
        config
    }

    fn settlement() -> (ColonySim, StructureId) {
        let mut sim = ColonySim::new(quiet_config(), 42);
        // Start at noon so EVAs have daylight.
        sim.surface.msol = 400;
        let hab = sim.facilities.add_structure(Structure::new("Lander Hab", HOME));
        (sim, hab)
    }

    fn inside(hab: StructureId) -> Whereabouts {
        Whereabouts::inside(HOME, hab, Position::default())
    }

    #[test]
    fn engine_creation() {
        let sim = ColonySim::default();
        assert_eq!(sim.worker_count(), 0);
        assert_eq!(sim.msol(), 0);
    }

    #[test]
    fn spawned_agents_get_ids_in_order() {
        let (mut sim, hab) = settlement();
        let a = sim.spawn_colonist("Ada", inside(hab));
        let b = sim.spawn_robot("Unit 7", inside(hab));
        assert!(a < b);
        assert_eq!(sim.worker_count(), 2);
        assert_eq!(sim.colonist_count(), 1);
        assert!(sim.component::<EvaSuit>(b).is_none());
        assert!(sim.component::<EvaSuit>(a).is_some());
    }

    #[test]
    fn maintenance_runs_to_completion() {
        let (mut sim, hab) = settlement();
        if let Some(s) = sim.facilities.structure_mut(hab) {
            s.wear = 0.5;
            s.maintenance_needed = 3.0;
        }
        let ada = sim.spawn_colonist("Ada", inside(hab));
        if let Some(mut skills) = sim.component_mut::<Skills>(ada) {
            skills.levels.insert(SkillType::Mechanics, 5);
        }

        sim.assign(ada, TaskOrder::Maintenance).unwrap();
        assert!(sim.is_busy(ada));
        assert!(sim.facilities.structure(hab).unwrap().reserved_for_maintenance);

        // Two work units per millisol at Mechanics 5.
        sim.run(2);
        assert!(!sim.is_busy(ada));
        let s = sim.facilities.structure(hab).unwrap();
        assert!(!s.reserved_for_maintenance);
        assert_eq!(s.maintenance_count, 1);
        assert_eq!(sim.last_finished(ada).unwrap().name, "Maintenance");
    }

    #[test]
    fn busy_agents_refuse_new_orders() {
        let (mut sim, hab) = settlement();
        sim.facilities.add_node(ComputeNode::new("Server farm", HOME, 10.0));
        let ada = sim.spawn_colonist("Ada", inside(hab));
        let order = TaskOrder::AnalyzeMap {
            computing_needed: 50.0,
            seed: 0.5,
            window: 1.0,
            duration: TaskDuration::Unbounded,
        };
        sim.assign(ada, order.clone()).unwrap();
        assert!(matches!(
            sim.assign(ada, order),
            Err(EngineError::Busy { .. })
        ));
        assert!(matches!(
            sim.assign(WorkerId(99), TaskOrder::Converse),
            Err(EngineError::UnknownWorker(WorkerId(99)))
        ));
    }

    #[test]
    fn nothing_to_do_is_recorded_at_once() {
        let (mut sim, hab) = settlement();
        let ada = sim.spawn_colonist("Ada", inside(hab));
        sim.assign(ada, TaskOrder::Converse).unwrap();
        assert!(!sim.is_busy(ada));
        let finished = sim.last_finished(ada).unwrap();
        assert_eq!(finished.name, "Converse");
        assert_eq!(finished.elapsed, 0.0);
    }

    #[test]
    fn conversation_finds_the_roommate() {
        let (mut sim, hab) = settlement();
        let ada = sim.spawn_colonist("Ada", inside(hab));
        sim.spawn_colonist("Grace", inside(hab));
        sim.assign(ada, TaskOrder::Converse).unwrap();
        assert!(sim.is_busy(ada));
        assert_eq!(sim.current_task(ada).unwrap().phase.as_deref(), Some("Conversing"));
    }

    #[test]
    fn regolith_ends_up_in_stock() {
        let (mut sim, hab) = settlement();
        let lock = sim
            .facilities
            .add_airlock(Airlock::new("West Lock", HOME, Position::new(10.0, 0.0)));
        let ada = sim.spawn_colonist("Ada", inside(hab));
        if let Some(mut cargo) = sim.component_mut::<Cargo>(ada) {
            cargo.limit = 2.0;
        }

        sim.assign(
            ada,
            TaskOrder::DigRegolith {
                site: Position::new(20.0, 0.0),
            },
        )
        .unwrap();
        for _ in 0..40 {
            if !sim.is_busy(ada) {
                break;
            }
            sim.tick();
        }
        assert!(!sim.is_busy(ada));
        let at = sim.component::<Whereabouts>(ada).unwrap();
        assert_eq!(at.location, WorkerLocation::Inside);
        assert!((sim.facilities.stock(ResourceKind::Regolith) - 2.0).abs() < 1e-9);
        assert_eq!(sim.component::<Cargo>(ada).unwrap().total(), 0.0);
        assert!(sim.facilities.airlock(lock).unwrap().occupants.is_empty());
        assert!(sim.component::<EvaSuit>(ada).unwrap().eva_time > 0.0);
    }

    #[test]
    fn robot_keeps_its_outside_time() {
        let (mut sim, hab) = settlement();
        sim.facilities
            .add_airlock(Airlock::new("West Lock", HOME, Position::new(10.0, 0.0)));
        let unit = sim.spawn_robot("Unit 7", inside(hab));
        if let Some(mut cargo) = sim.component_mut::<Cargo>(unit) {
            cargo.limit = 2.0;
        }

        sim.assign(
            unit,
            TaskOrder::DigRegolith {
                site: Position::new(20.0, 0.0),
            },
        )
        .unwrap();
        for _ in 0..40 {
            if !sim.is_busy(unit) {
                break;
            }
            sim.tick();
        }
        assert!(!sim.is_busy(unit));
        let at = sim.component::<Whereabouts>(unit).unwrap();
        assert_eq!(at.location, WorkerLocation::Inside);
        assert!(at.outside_time > 0.0);
        assert!(sim.component::<EvaSuit>(unit).is_none());
    }

    #[test]
    fn cancel_before_leaving_ends_at_once() {
        let (mut sim, hab) = settlement();
        sim.facilities
            .add_airlock(Airlock::new("West Lock", HOME, Position::new(10.0, 0.0)));
        let ada = sim.spawn_colonist("Ada", inside(hab));
        sim.assign(
            ada,
            TaskOrder::DigRegolith {
                site: Position::new(20.0, 0.0),
            },
        )
        .unwrap();
        assert!(sim.cancel(ada).unwrap());
        assert!(!sim.is_busy(ada));
        assert!(!sim.cancel(ada).unwrap());
    }

    #[test]
    fn clock_advances() {
        let mut sim = ColonySim::default();
        sim.run(25);
        assert_eq!(sim.msol(), 25);
    }
}
