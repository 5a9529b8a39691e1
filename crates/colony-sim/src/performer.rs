//! `Performer` implementations over borrowed ECS components.
//!
//! The engine borrows an agent's components for the length of one task
//! step and wraps them in [`ColonistPerformer`] or [`RobotPerformer`].

use colony_tasks::world::{
    NaturalAttribute, PerformerKind, Performer, Position, ResourceKind, SettlementId, SkillType,
    StructureId, SuitStatus, WorkerId, WorkerLocation,
};

use crate::components::{Attributes, Cargo, Condition, EvaSuit, Skills, Whereabouts, Worker};

/// Suit oxygen used per millisol outside, as a fraction of a full tank.
pub const OXYGEN_PER_MSOL: f64 = 0.002;

/// Components every agent has.
pub struct Body<'a> {
    pub worker: &'a Worker,
    pub condition: &'a mut Condition,
    pub skills: &'a mut Skills,
    pub attributes: &'a Attributes,
    pub whereabouts: &'a mut Whereabouts,
    pub cargo: &'a mut Cargo,
}

/// A human colonist. Gets stressed, wears a suit outside.
pub struct ColonistPerformer<'a> {
    pub body: Body<'a>,
    pub suit: Option<&'a mut EvaSuit>,
}

/// A robot. No stress and no suit.
pub struct RobotPerformer<'a> {
    pub body: Body<'a>,
}

impl Performer for ColonistPerformer<'_> {
    fn id(&self) -> WorkerId {
        self.body.worker.id
    }

    fn name(&self) -> &str {
        &self.body.worker.name
    }

    fn kind(&self) -> PerformerKind {
        PerformerKind::Colonist
    }

    fn performance_rating(&self) -> f64 {
        self.body.condition.performance
    }

    fn effective_skill_level(&self, skill: SkillType) -> u32 {
        // Heavy stress and poor health both cost a level.
        let mut level = self.body.skills.level(skill);
        if self.body.condition.stress > 75.0 {
            level = level.saturating_sub(1);
        }
        if self.body.condition.performance < 0.5 {
            level = level.saturating_sub(1);
        }
        level
    }

    fn add_experience(&mut self, skill: SkillType, points: f64, time: f64) {
        self.body.skills.add_experience(skill, points, time);
    }

    fn attribute(&self, attribute: NaturalAttribute) -> u32 {
        self.body.attributes.get(attribute)
    }

    fn add_stress(&mut self, amount: f64) {
        self.body.condition.add_stress(amount);
    }

    fn position(&self) -> Position {
        self.body.whereabouts.position
    }

    fn set_position(&mut self, position: Position) {
        self.body.whereabouts.position = position;
    }

    fn location(&self) -> WorkerLocation {
        self.body.whereabouts.location
    }

    fn set_location(&mut self, location: WorkerLocation) {
        self.body.whereabouts.location = location;
    }

    fn building(&self) -> Option<StructureId> {
        self.body.whereabouts.building
    }

    fn settlement(&self) -> Option<SettlementId> {
        self.body.whereabouts.settlement
    }

    fn needs_eva_suit(&self) -> bool {
        true
    }

    fn suit(&self) -> Option<SuitStatus> {
        self.suit.as_deref().map(|s| SuitStatus {
            oxygen_fraction: s.oxygen_fraction,
            malfunction: s.malfunction,
        })
    }

    fn suit_accident(&mut self) {
        if let Some(suit) = self.suit.as_deref_mut() {
            suit.accidents += 1;
            suit.malfunction = true;
            log::warn!("{} damaged their EVA suit", self.body.worker.name);
        }
    }

    fn add_eva_time(&mut self, _task: &str, time: f64) {
        self.body.whereabouts.outside_time += time;
        if let Some(suit) = self.suit.as_deref_mut() {
            suit.eva_time += time;
            suit.oxygen_fraction = (suit.oxygen_fraction - time * OXYGEN_PER_MSOL).max(0.0);
        }
    }

    fn cargo_capacity(&self, _resource: ResourceKind) -> f64 {
        self.body.cargo.free()
    }

    fn store(&mut self, resource: ResourceKind, amount: f64) -> f64 {
        self.body.cargo.store(resource, amount)
    }
}

impl Performer for RobotPerformer<'_> {
    fn id(&self) -> WorkerId {
        self.body.worker.id
    }

    fn name(&self) -> &str {
        &self.body.worker.name
    }

    fn kind(&self) -> PerformerKind {
        PerformerKind::Robot
    }

    fn performance_rating(&self) -> f64 {
        self.body.condition.performance
    }

    fn effective_skill_level(&self, skill: SkillType) -> u32 {
        self.body.skills.level(skill)
    }

    fn add_experience(&mut self, skill: SkillType, points: f64, time: f64) {
        self.body.skills.add_experience(skill, points, time);
    }

    fn attribute(&self, attribute: NaturalAttribute) -> u32 {
        self.body.attributes.get(attribute)
    }

    fn add_stress(&mut self, _amount: f64) {}

    fn position(&self) -> Position {
        self.body.whereabouts.position
    }

    fn set_position(&mut self, position: Position) {
        self.body.whereabouts.position = position;
    }

    fn location(&self) -> WorkerLocation {
        self.body.whereabouts.location
    }

    fn set_location(&mut self, location: WorkerLocation) {
        self.body.whereabouts.location = location;
    }

    fn building(&self) -> Option<StructureId> {
        self.body.whereabouts.building
    }

    fn settlement(&self) -> Option<SettlementId> {
        self.body.whereabouts.settlement
    }

    fn needs_eva_suit(&self) -> bool {
        false
    }

    fn suit(&self) -> Option<SuitStatus> {
        None
    }

    fn suit_accident(&mut self) {
        // Robots take the hit on their chassis.
        self.body.condition.performance = (self.body.condition.performance - 0.1).max(0.0);
    }

    fn add_eva_time(&mut self, _task: &str, time: f64) {
        self.body.whereabouts.outside_time += time;
    }

    fn cargo_capacity(&self, _resource: ResourceKind) -> f64 {
        self.body.cargo.free()
    }

    fn store(&mut self, resource: ResourceKind, amount: f64) -> f64 {
        self.body.cargo.store(resource, amount)
    }
}
