//! Save/Load functionality for persisting the settlement
//!
//! Uses bincode for the whole save. Agents are written component by
//! component; a running task is written as a [`TaskSnapshot`] and rebuilt
//! through `colony_tasks::tasks::restore`.

use std::io::{Read, Write};

use hecs::World;
use serde::{Deserialize, Serialize};

use colony_tasks::config::TaskConfig;
use colony_tasks::error::TaskError;
use colony_tasks::snapshot::TaskSnapshot;

use crate::components::*;
use crate::engine::ColonySim;
use crate::facilities::Facilities;
use crate::surface::SurfaceConditions;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the settlement
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub seed: u64,
    pub next_worker: u32,
    pub config: TaskConfig,
    pub surface: SurfaceConditions,
    pub facilities: Facilities,
    pub agents: Vec<SerializableAgent>,
}

/// One colonist or robot with all of its components.
#[derive(Serialize, Deserialize)]
pub struct SerializableAgent {
    pub worker: Worker,
    pub condition: Condition,
    pub skills: Skills,
    pub attributes: Attributes,
    pub whereabouts: Whereabouts,
    pub cargo: Cargo,
    pub suit: Option<EvaSuit>,
    pub task: Option<TaskSnapshot>,
    pub last_finished: Option<FinishedTask>,
}

/// Errors that can occur during save/load
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

/// Extract every agent from the world, ordered by id.
fn serialize_agents(world: &World) -> Result<Vec<SerializableAgent>, SaveError> {
    let mut agents = Vec::new();
    let mut query = world.query::<(
        &Worker,
        &Condition,
        &Skills,
        &Attributes,
        &Whereabouts,
        &Cargo,
        Option<&EvaSuit>,
        &TaskManager,
    )>();
    for (_, (worker, condition, skills, attributes, whereabouts, cargo, suit, manager)) in query.iter() {
        let task = match manager.current.as_deref() {
            Some(task) if !task.is_done() => Some(task.snapshot()?),
            _ => None,
        };
        agents.push(SerializableAgent {
            worker: worker.clone(),
            condition: *condition,
            skills: skills.clone(),
            attributes: attributes.clone(),
            whereabouts: *whereabouts,
            cargo: cargo.clone(),
            suit: suit.copied(),
            task,
            last_finished: manager.last_finished.clone(),
        });
    }
    agents.sort_by_key(|a| a.worker.id);
    Ok(agents)
}

/// Spawn an agent with all its components and its restored task.
fn spawn_agent(world: &mut World, agent: SerializableAgent, config: &TaskConfig) -> Result<(), SaveError> {
    let SerializableAgent {
        worker,
        condition,
        skills,
        attributes,
        whereabouts,
        cargo,
        suit,
        task,
        last_finished,
    } = agent;
    let current = task
        .as_ref()
        .map(|snapshot| colony_tasks::tasks::restore(snapshot, config))
        .transpose()?;
    let manager = TaskManager {
        current,
        last_finished,
    };
    // Robots have no suit.
    match suit {
        Some(suit) => world.spawn((worker, condition, skills, attributes, whereabouts, cargo, manager, suit)),
        None => world.spawn((worker, condition, skills, attributes, whereabouts, cargo, manager)),
    };
    Ok(())
}

/// Save the complete settlement to a writer
pub fn save_simulation<W: Write>(writer: W, sim: &ColonySim) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        seed: sim.seed(),
        next_worker: sim.next_worker(),
        config: sim.config.clone(),
        surface: sim.surface.clone(),
        facilities: sim.facilities.clone(),
        agents: serialize_agents(&sim.world)?,
    };
    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a settlement from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<ColonySim, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut sim = ColonySim::new(save_data.config, save_data.seed);
    sim.surface = save_data.surface;
    sim.facilities = save_data.facilities;
    for agent in save_data.agents {
        spawn_agent(&mut sim.world, agent, &sim.config)?;
    }
    sim.restore_counters(save_data.seed, save_data.next_worker);
    sim.publish_roster();
    Ok(sim)
}

impl ColonySim {
    /// Save simulation state to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        save_simulation(writer, self)
    }

    /// Replace this simulation with one read from `reader`.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        *self = load_simulation(reader)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TaskOrder;
    use crate::facilities::{Airlock, Structure};
    use colony_tasks::world::{Position, SettlementId, WorkerLocation};

    const HOME: SettlementId = SettlementId(1);

    fn outpost() -> ColonySim {
        let mut config = TaskConfig::default();
        config.eva.base_accident_chance = 0.0;
        config.eva.airlock_cycle_time = 2.0;
        config.eva.walk_speed = 10.0;
        let mut sim = ColonySim::new(config, 9);
        sim.surface.msol = 400;
        let hab = sim.facilities.add_structure(Structure::new("Lander Hab", HOME));
        sim.facilities
            .add_airlock(Airlock::new("West Lock", HOME, Position::new(10.0, 0.0)));
        sim.spawn_colonist("Ada", Whereabouts::inside(HOME, hab, Position::default()));
        sim.spawn_robot("Unit 7", Whereabouts::inside(HOME, hab, Position::default()));
        sim
    }

    #[test]
    fn save_load_roundtrip() {
        let mut sim = outpost();
        let ada = colony_tasks::world::WorkerId(1);
        sim.assign(
            ada,
            TaskOrder::DigRegolith {
                site: Position::new(20.0, 0.0),
            },
        )
        .expect("assign failed");
        // Out through the airlock and on the way to the site.
        sim.run(3);
        let before = sim.current_task(ada).expect("task running");

        let mut buffer = Vec::new();
        sim.save(&mut buffer).expect("Save failed");

        let mut loaded = ColonySim::default();
        loaded.load(&buffer[..]).expect("Load failed");

        assert_eq!(loaded.msol(), sim.msol());
        assert_eq!(loaded.worker_count(), 2);
        assert_eq!(loaded.colonist_count(), 1);
        assert!(loaded.component::<EvaSuit>(ada).is_some());
        assert!(loaded
            .component::<EvaSuit>(colony_tasks::world::WorkerId(2))
            .is_none());
        assert_eq!(loaded.current_task(ada), Some(before));
        assert_eq!(
            loaded.component::<Whereabouts>(ada).map(|w| w.location),
            Some(WorkerLocation::Outside)
        );

        // The restored task carries on to completion.
        for _ in 0..300 {
            if !loaded.is_busy(ada) {
                break;
            }
            loaded.tick();
        }
        assert!(!loaded.is_busy(ada));
        assert_eq!(
            loaded.component::<Whereabouts>(ada).map(|w| w.location),
            Some(WorkerLocation::Inside)
        );
    }

    #[test]
    fn new_agents_do_not_reuse_ids() {
        let sim = outpost();
        let mut buffer = Vec::new();
        sim.save(&mut buffer).unwrap();
        let mut loaded = load_simulation(&buffer[..]).unwrap();
        let id = loaded.spawn_colonist(
            "Grace",
            Whereabouts::inside(HOME, colony_tasks::world::StructureId(1), Position::default()),
        );
        assert_eq!(id, colony_tasks::world::WorkerId(3));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let sim = outpost();
        let mut data = Vec::new();
        sim.save(&mut data).unwrap();
        // The version is the leading little-endian u32.
        data[0] = 99;
        match load_simulation(&data[..]) {
            Err(SaveError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, SAVE_VERSION);
                assert_eq!(found, 99);
            }
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("loaded a save with the wrong version"),
        }
    }
}
