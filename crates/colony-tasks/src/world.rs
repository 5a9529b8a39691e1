//! Collaborator interfaces a task reads and mutates.
//!
//! Tasks never reach into a global simulation object. Everything they touch
//! comes in through [`crate::context::TaskContext`] as one of these traits,
//! so the same task code runs against the ECS world in `colony-sim` and
//! against the small fakes used in tests.

use serde::{Deserialize, Serialize};

use crate::claim::{ClaimOutcome, ClaimRequest, ClaimWindow};

/// Identity of a colonist or robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

/// A building or vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AirlockId(pub u32);

/// A computing node (server farm, vehicle computer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettlementId(pub u32);

/// Local surface coordinates in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Move `step` meters toward `target`, stopping on it.
    pub fn toward(self, target: Position, step: f64) -> Position {
        let dist = self.distance(target);
        if dist <= step || dist <= f64::EPSILON {
            return target;
        }
        let t = step / dist;
        Position {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
        }
    }

    pub fn is_close(self, other: Position) -> bool {
        self.distance(other) < 0.01
    }
}

/// Where a performer physically is relative to the pressurized habitat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerLocation {
    Inside,
    InAirlock,
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformerKind {
    Colonist,
    Robot,
}

/// Skills tasks train and check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillType {
    EvaOperations,
    Mechanics,
    Areology,
    Mathematics,
    Computing,
    Psychology,
    Reporting,
}

impl SkillType {
    pub const ALL: [SkillType; 7] = [
        SkillType::EvaOperations,
        SkillType::Mechanics,
        SkillType::Areology,
        SkillType::Mathematics,
        SkillType::Computing,
        SkillType::Psychology,
        SkillType::Reporting,
    ];
}

/// Natural attributes on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NaturalAttribute {
    ExperienceAptitude,
    AcademicAptitude,
    Teaching,
    Conversation,
    Endurance,
}

/// Resources a performer can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Regolith,
    Ice,
}

/// Readings from a worn EVA suit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuitStatus {
    /// Stored oxygen as a fraction of capacity.
    pub oxygen_fraction: f64,
    pub malfunction: bool,
}

/// The actor executing a task. Colonists and robots implement this.
pub trait Performer {
    fn id(&self) -> WorkerId;
    fn name(&self) -> &str;
    fn kind(&self) -> PerformerKind;

    /// 0.0 (incapacitated) to 1.0.
    fn performance_rating(&self) -> f64;
    fn effective_skill_level(&self, skill: SkillType) -> u32;
    fn add_experience(&mut self, skill: SkillType, points: f64, time: f64);
    fn attribute(&self, attribute: NaturalAttribute) -> u32;
    fn add_stress(&mut self, amount: f64);

    fn position(&self) -> Position;
    fn set_position(&mut self, position: Position);
    fn location(&self) -> WorkerLocation;
    fn set_location(&mut self, location: WorkerLocation);
    fn building(&self) -> Option<StructureId>;
    fn settlement(&self) -> Option<SettlementId>;

    fn needs_eva_suit(&self) -> bool;
    fn suit(&self) -> Option<SuitStatus>;
    /// Damage the worn suit after an accident.
    fn suit_accident(&mut self);
    fn add_eva_time(&mut self, task: &str, time: f64);

    /// Free carrying capacity for a resource, in kilograms.
    fn cargo_capacity(&self, resource: ResourceKind) -> f64;
    /// Store up to `amount`; returns what was stored.
    fn store(&mut self, resource: ResourceKind, amount: f64) -> f64;
}

/// Airlock lookup and slot admission.
pub trait Airlocks {
    /// Closest operational airlock of a settlement to `from`.
    fn closest_airlock(&self, settlement: SettlementId, from: Position) -> Option<AirlockId>;
    /// Position of the airlock doors; `None` if the airlock no longer exists.
    fn airlock_position(&self, airlock: AirlockId) -> Option<Position>;
    fn is_operational(&self, airlock: AirlockId) -> bool;
    /// Atomic grant-or-deny of one slot. Re-requesting a held slot grants it again.
    fn request_slot(&mut self, airlock: AirlockId, request: &ClaimRequest) -> ClaimOutcome;
    /// Returns true if the requester held a slot.
    fn release_slot(&mut self, airlock: AirlockId, requester: WorkerId) -> bool;
}

/// Shared computing resource manager.
pub trait ComputeNodes {
    /// Pick a node with room for `work` per msol over `window`.
    fn most_free_node(&mut self, work: f64, window: ClaimWindow) -> Option<NodeId>;
    /// Atomic grant-or-deny of `request.amount` per msol over the window.
    fn schedule(&mut self, node: NodeId, request: &ClaimRequest) -> ClaimOutcome;
}

/// A structure that could use preventive maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceCandidate {
    pub structure: StructureId,
    /// 0.0 (new) to 1.0 (worn out).
    pub wear: f64,
}

/// Buildings and vehicles.
pub trait Structures {
    /// Structures of a settlement with wear, no malfunction and no reservation.
    fn maintenance_candidates(&self, settlement: SettlementId) -> Vec<MaintenanceCandidate>;
    fn parts_available(&self, structure: StructureId) -> bool;
    fn has_malfunction(&self, structure: StructureId) -> bool;
    fn trigger_malfunction(&mut self, structure: StructureId);
    fn is_reserved_for_maintenance(&self, structure: StructureId) -> bool;
    fn set_reserved_for_maintenance(&mut self, structure: StructureId, reserved: bool);
    fn wear(&self, structure: StructureId) -> f64;
    /// Apply maintenance work; returns true once maintenance is complete.
    fn add_maintenance_work(&mut self, structure: StructureId, work: f64) -> bool;
}

/// Published state of another agent, read-only to tasks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: WorkerId,
    pub kind: PerformerKind,
    pub building: Option<StructureId>,
    pub settlement: Option<SettlementId>,
    pub location: WorkerLocation,
    pub busy: bool,
}

/// Cross-agent reads go through the roster published before each tick.
pub trait Roster {
    fn roster(&self) -> &[RosterEntry];
}

/// Surface conditions.
pub trait Environment {
    fn solar_irradiance(&self, at: Position) -> f64;
    fn is_sun_setting(&self, at: Position) -> bool;
    fn in_dark_polar_region(&self, at: Position) -> bool;
    /// Whether a radiation event is reaching `at` during the current tick.
    fn radiation_event(&self, at: Position) -> bool;
}

/// Everything a settlement offers to tasks.
pub trait Colony: Airlocks + ComputeNodes + Structures + Roster {}

impl<T: Airlocks + ComputeNodes + Structures + Roster + ?Sized> Colony for T {}
