//! Component definitions for the ECS world.
//!
//! Components are plain data attached to colonist and robot entities. The
//! behavior lives in the task crate; [`crate::performer`] adapts these
//! components to the `Performer` trait tasks are written against.

use std::collections::BTreeMap;

use colony_tasks::task::ColonyTask;
use colony_tasks::world::{
    NaturalAttribute, PerformerKind, Position, ResourceKind, SettlementId, SkillType, StructureId,
    WorkerId, WorkerLocation,
};
use serde::{Deserialize, Serialize};

/// Identity of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    pub kind: PerformerKind,
}

/// Health and mood. Performance is 0.0 (incapacitated) to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Condition {
    pub performance: f64,
    /// 0.0 (calm) to 100.0 (breakdown).
    pub stress: f64,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            performance: 1.0,
            stress: 0.0,
        }
    }
}

impl Condition {
    pub fn add_stress(&mut self, amount: f64) {
        self.stress = (self.stress + amount).clamp(0.0, 100.0);
    }
}

/// Experience points needed to reach the next level are `BASE_POINTS * 2^level`.
const BASE_POINTS: f64 = 25.0;

/// Skill levels with accumulated experience toward the next level.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skills {
    pub levels: BTreeMap<SkillType, u32>,
    pub experience: BTreeMap<SkillType, f64>,
    /// Millisols spent training each skill.
    pub training_time: BTreeMap<SkillType, f64>,
}

impl Skills {
    pub fn with_level(mut self, skill: SkillType, level: u32) -> Self {
        self.levels.insert(skill, level);
        self
    }

    pub fn level(&self, skill: SkillType) -> u32 {
        self.levels.get(&skill).copied().unwrap_or(0)
    }

    pub fn experience(&self, skill: SkillType) -> f64 {
        self.experience.get(&skill).copied().unwrap_or(0.0)
    }

    /// Bank experience and level up as many times as it pays for.
    pub fn add_experience(&mut self, skill: SkillType, points: f64, time: f64) {
        if !points.is_finite() || points <= 0.0 {
            return;
        }
        *self.training_time.entry(skill).or_insert(0.0) += time;
        let banked = self.experience.entry(skill).or_insert(0.0);
        *banked += points;
        let level = self.levels.entry(skill).or_insert(0);
        loop {
            let needed = BASE_POINTS * 2f64.powi(*level as i32);
            if *banked < needed {
                break;
            }
            *banked -= needed;
            *level += 1;
        }
    }
}

/// Natural attributes, 0 to 100. Missing attributes read as 50.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attributes(pub BTreeMap<NaturalAttribute, u32>);

impl Attributes {
    pub fn get(&self, attribute: NaturalAttribute) -> u32 {
        self.0.get(&attribute).copied().unwrap_or(50)
    }

    pub fn with(mut self, attribute: NaturalAttribute, value: u32) -> Self {
        self.0.insert(attribute, value.min(100));
        self
    }
}

/// Where the agent is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Whereabouts {
    pub position: Position,
    pub location: WorkerLocation,
    pub building: Option<StructureId>,
    pub settlement: Option<SettlementId>,
    /// Total millisols spent outside on EVA.
    #[serde(default)]
    pub outside_time: f64,
}

impl Whereabouts {
    pub fn inside(settlement: SettlementId, building: StructureId, position: Position) -> Self {
        Self {
            position,
            location: WorkerLocation::Inside,
            building: Some(building),
            settlement: Some(settlement),
            outside_time: 0.0,
        }
    }
}

/// Carried resources, shared weight limit in kilograms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cargo {
    pub limit: f64,
    pub carried: BTreeMap<ResourceKind, f64>,
}

impl Cargo {
    pub fn new(limit: f64) -> Self {
        Self {
            limit: limit.max(0.0),
            carried: BTreeMap::new(),
        }
    }

    pub fn total(&self) -> f64 {
        self.carried.values().sum()
    }

    pub fn amount(&self, resource: ResourceKind) -> f64 {
        self.carried.get(&resource).copied().unwrap_or(0.0)
    }

    pub fn free(&self) -> f64 {
        (self.limit - self.total()).max(0.0)
    }

    pub fn store(&mut self, resource: ResourceKind, amount: f64) -> f64 {
        let stored = amount.min(self.free()).max(0.0);
        if stored > 0.0 {
            *self.carried.entry(resource).or_insert(0.0) += stored;
        }
        stored
    }

    /// Empty the load, returning what was carried.
    pub fn unload(&mut self) -> BTreeMap<ResourceKind, f64> {
        std::mem::take(&mut self.carried)
    }
}

/// A pressure suit. Only colonists wear one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaSuit {
    pub oxygen_fraction: f64,
    pub malfunction: bool,
    pub accidents: u32,
    /// Total millisols spent outside.
    pub eva_time: f64,
}

impl Default for EvaSuit {
    fn default() -> Self {
        Self {
            oxygen_fraction: 1.0,
            malfunction: false,
            accidents: 0,
            eva_time: 0.0,
        }
    }
}

impl EvaSuit {
    /// Refill and repair between trips.
    pub fn service(&mut self) {
        self.oxygen_fraction = 1.0;
        self.malfunction = false;
    }
}

/// How the last task of an agent went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedTask {
    pub name: String,
    pub elapsed: f64,
    /// Set when the task broke the step contract and was force-ended.
    pub error: Option<String>,
}

/// The agent's current task, if any.
#[derive(Default)]
pub struct TaskManager {
    pub current: Option<Box<dyn ColonyTask>>,
    pub last_finished: Option<FinishedTask>,
}

impl TaskManager {
    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_done())
    }

    pub fn task_name(&self) -> Option<&str> {
        self.current.as_deref().map(|t| t.name())
    }

    /// Move a finished task into `last_finished`.
    pub fn retire(&mut self, error: Option<String>) {
        if let Some(task) = self.current.take() {
            self.last_finished = Some(FinishedTask {
                name: task.name().to_string(),
                elapsed: task.elapsed(),
                error,
            });
        }
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("current", &self.task_name())
            .field("last_finished", &self.last_finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn experience_levels_up() {
        let mut skills = Skills::default();
        skills.add_experience(SkillType::Mechanics, 30.0, 1.0);
        assert_eq!(skills.level(SkillType::Mechanics), 1);
        assert!((skills.experience(SkillType::Mechanics) - 5.0).abs() < 1e-9);

        // 50 for level 2, 100 for level 3.
        skills.add_experience(SkillType::Mechanics, 145.0, 1.0);
        assert_eq!(skills.level(SkillType::Mechanics), 3);
        assert!(skills.experience(SkillType::Mechanics).abs() < 1e-9);
    }

    #[test]
    fn cargo_limit_is_shared() {
        let mut cargo = Cargo::new(10.0);
        assert!((cargo.store(ResourceKind::Regolith, 7.0) - 7.0).abs() < f64::EPSILON);
        assert!((cargo.store(ResourceKind::Ice, 7.0) - 3.0).abs() < f64::EPSILON);
        assert_eq!(cargo.free(), 0.0);
        let unloaded = cargo.unload();
        assert_eq!(unloaded.len(), 2);
        assert_eq!(cargo.total(), 0.0);
    }

    #[test]
    fn stress_is_clamped() {
        let mut c = Condition::default();
        c.add_stress(-5.0);
        assert_eq!(c.stress, 0.0);
        c.add_stress(250.0);
        assert_eq!(c.stress, 100.0);
    }
}
