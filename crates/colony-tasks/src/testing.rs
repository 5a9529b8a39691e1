//! In-memory collaborators for driving tasks without a simulation world.
//!
//! [`Harness`] owns a performer, a colony and an environment with plain
//! public fields, so a test can set up a situation, build a
//! [`TaskContext`] with [`Harness::ctx`] and inspect the results directly.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::claim::{CapacityLedger, ClaimOutcome, ClaimRequest, ClaimWindow, Denial, ResourceClaim};
use crate::config::TaskConfig;
use crate::context::TaskContext;
use crate::world::{
    AirlockId, Airlocks, ComputeNodes, Environment, MaintenanceCandidate, NaturalAttribute, NodeId,
    Performer, PerformerKind, Position, ResourceKind, Roster, RosterEntry, SettlementId, SkillType,
    StructureId, Structures, SuitStatus, WorkerId, WorkerLocation,
};

#[derive(Debug, Clone)]
pub struct FakePerformer {
    pub id: WorkerId,
    pub name: String,
    pub kind: PerformerKind,
    pub performance: f64,
    pub skills: HashMap<SkillType, u32>,
    pub experience: HashMap<SkillType, f64>,
    pub attributes: HashMap<NaturalAttribute, u32>,
    pub stress: f64,
    pub position: Position,
    pub location: WorkerLocation,
    pub building: Option<StructureId>,
    pub settlement: Option<SettlementId>,
    pub suit: Option<SuitStatus>,
    pub suit_accidents: u32,
    pub eva_time: f64,
    pub cargo_limit: f64,
    pub cargo: HashMap<ResourceKind, f64>,
}

impl FakePerformer {
    /// A fit colonist inside building 1 of settlement 1, wearing a full suit.
    pub fn colonist(id: u32) -> Self {
        Self {
            id: WorkerId(id),
            name: format!("Colonist {}", id),
            kind: PerformerKind::Colonist,
            performance: 1.0,
            skills: HashMap::new(),
            experience: HashMap::new(),
            attributes: HashMap::new(),
            stress: 0.0,
            position: Position::default(),
            location: WorkerLocation::Inside,
            building: Some(StructureId(1)),
            settlement: Some(SettlementId(1)),
            suit: Some(SuitStatus {
                oxygen_fraction: 1.0,
                malfunction: false,
            }),
            suit_accidents: 0,
            eva_time: 0.0,
            cargo_limit: 50.0,
            cargo: HashMap::new(),
        }
    }

    pub fn robot(id: u32) -> Self {
        Self {
            name: format!("Robot {}", id),
            kind: PerformerKind::Robot,
            suit: None,
            ..Self::colonist(id)
        }
    }

    pub fn set_skill(&mut self, skill: SkillType, level: u32) {
        self.skills.insert(skill, level);
    }

    pub fn set_attribute(&mut self, attribute: NaturalAttribute, value: u32) {
        self.attributes.insert(attribute, value);
    }

    pub fn experience(&self, skill: SkillType) -> f64 {
        self.experience.get(&skill).copied().unwrap_or(0.0)
    }

    pub fn carried(&self, resource: ResourceKind) -> f64 {
        self.cargo.get(&resource).copied().unwrap_or(0.0)
    }
}

impl Performer for FakePerformer {
    fn id(&self) -> WorkerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> PerformerKind {
        self.kind
    }

    fn performance_rating(&self) -> f64 {
        self.performance
    }

    fn effective_skill_level(&self, skill: SkillType) -> u32 {
        self.skills.get(&skill).copied().unwrap_or(0)
    }

    fn add_experience(&mut self, skill: SkillType, points: f64, _time: f64) {
        *self.experience.entry(skill).or_insert(0.0) += points;
    }

    fn attribute(&self, attribute: NaturalAttribute) -> u32 {
        self.attributes.get(&attribute).copied().unwrap_or(50)
    }

    fn add_stress(&mut self, amount: f64) {
        self.stress += amount;
    }

    fn position(&self) -> Position {
        self.position
    }

    fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    fn location(&self) -> WorkerLocation {
        self.location
    }

    fn set_location(&mut self, location: WorkerLocation) {
        self.location = location;
    }

    fn building(&self) -> Option<StructureId> {
        self.building
    }

    fn settlement(&self) -> Option<SettlementId> {
        self.settlement
    }

    fn needs_eva_suit(&self) -> bool {
        self.kind == PerformerKind::Colonist
    }

    fn suit(&self) -> Option<SuitStatus> {
        self.suit
    }

    fn suit_accident(&mut self) {
        self.suit_accidents += 1;
        if let Some(suit) = self.suit.as_mut() {
            suit.malfunction = true;
        }
    }

    fn add_eva_time(&mut self, _task: &str, time: f64) {
        self.eva_time += time;
    }

    fn cargo_capacity(&self, _resource: ResourceKind) -> f64 {
        (self.cargo_limit - self.cargo.values().sum::<f64>()).max(0.0)
    }

    fn store(&mut self, resource: ResourceKind, amount: f64) -> f64 {
        let stored = amount.min(self.cargo_capacity(resource)).max(0.0);
        *self.cargo.entry(resource).or_insert(0.0) += stored;
        stored
    }
}

#[derive(Debug, Clone)]
pub struct FakeAirlock {
    pub settlement: SettlementId,
    pub position: Position,
    pub operational: bool,
    pub capacity: usize,
    pub occupants: Vec<WorkerId>,
}

#[derive(Debug, Clone)]
pub struct FakeStructure {
    pub settlement: SettlementId,
    pub wear: f64,
    pub parts: bool,
    pub malfunction: bool,
    pub reserved: bool,
    pub work_needed: f64,
    pub work_done: f64,
}

impl FakeStructure {
    pub fn worn(settlement: SettlementId, wear: f64) -> Self {
        Self {
            settlement,
            wear,
            parts: true,
            malfunction: false,
            reserved: false,
            work_needed: 100.0,
            work_done: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeColony {
    pub airlocks: BTreeMap<AirlockId, FakeAirlock>,
    pub nodes: BTreeMap<NodeId, CapacityLedger>,
    pub structures: BTreeMap<StructureId, FakeStructure>,
    pub roster: Vec<RosterEntry>,
    /// Every slot request seen, granted or not.
    pub slot_requests: u32,
    /// Every compute request seen, granted or not.
    pub schedule_requests: Vec<ClaimRequest>,
    /// Nodes that refuse every schedule as out of service.
    pub offline_nodes: BTreeSet<NodeId>,
}

impl FakeColony {
    pub fn add_airlock(&mut self, id: u32, position: Position) -> AirlockId {
        let airlock = AirlockId(id);
        self.airlocks.insert(
            airlock,
            FakeAirlock {
                settlement: SettlementId(1),
                position,
                operational: true,
                capacity: 4,
                occupants: Vec::new(),
            },
        );
        airlock
    }

    pub fn add_node(&mut self, id: u32, capacity: f64) -> NodeId {
        let node = NodeId(id);
        self.nodes.insert(node, CapacityLedger::new(capacity));
        node
    }

    pub fn occupants(&self, airlock: AirlockId) -> usize {
        self.airlocks.get(&airlock).map_or(0, |a| a.occupants.len())
    }
}

impl Airlocks for FakeColony {
    fn closest_airlock(&self, settlement: SettlementId, from: Position) -> Option<AirlockId> {
        self.airlocks
            .iter()
            .filter(|(_, a)| a.settlement == settlement && a.operational)
            .min_by(|(_, a), (_, b)| {
                from.distance(a.position)
                    .total_cmp(&from.distance(b.position))
            })
            .map(|(id, _)| *id)
    }

    fn airlock_position(&self, airlock: AirlockId) -> Option<Position> {
        self.airlocks.get(&airlock).map(|a| a.position)
    }

    fn is_operational(&self, airlock: AirlockId) -> bool {
        self.airlocks.get(&airlock).is_some_and(|a| a.operational)
    }

    fn request_slot(&mut self, airlock: AirlockId, request: &ClaimRequest) -> ClaimOutcome {
        self.slot_requests += 1;
        let Some(lock) = self.airlocks.get_mut(&airlock).filter(|a| a.operational) else {
            return ClaimOutcome::Denied(Denial::Unavailable);
        };
        let held = lock.occupants.contains(&request.requester);
        if !held {
            if lock.occupants.len() >= lock.capacity {
                return ClaimOutcome::Denied(Denial::NoCapacity { available: 0.0 });
            }
            lock.occupants.push(request.requester);
        }
        ClaimOutcome::Granted(ResourceClaim {
            requester: request.requester,
            requested: request.amount,
            granted: request.amount,
            window: request.window,
        })
    }

    fn release_slot(&mut self, airlock: AirlockId, requester: WorkerId) -> bool {
        let Some(lock) = self.airlocks.get_mut(&airlock) else {
            return false;
        };
        let before = lock.occupants.len();
        lock.occupants.retain(|w| *w != requester);
        lock.occupants.len() != before
    }
}

impl ComputeNodes for FakeColony {
    fn most_free_node(&mut self, work: f64, window: ClaimWindow) -> Option<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, ledger)| ledger.remaining_in(window) >= work)
            .max_by(|(_, a), (_, b)| a.free_fraction(window).total_cmp(&b.free_fraction(window)))
            .map(|(id, _)| *id)
    }

    fn schedule(&mut self, node: NodeId, request: &ClaimRequest) -> ClaimOutcome {
        self.schedule_requests.push(*request);
        if self.offline_nodes.contains(&node) {
            return ClaimOutcome::Denied(Denial::Unavailable);
        }
        match self.nodes.get_mut(&node) {
            Some(ledger) => ledger.try_reserve(request),
            None => ClaimOutcome::Denied(Denial::Unavailable),
        }
    }
}

impl Structures for FakeColony {
    fn maintenance_candidates(&self, settlement: SettlementId) -> Vec<MaintenanceCandidate> {
        self.structures
            .iter()
            .filter(|(_, s)| s.settlement == settlement && s.wear > 0.0 && !s.malfunction && !s.reserved)
            .map(|(id, s)| MaintenanceCandidate {
                structure: *id,
                wear: s.wear,
            })
            .collect()
    }

    fn parts_available(&self, structure: StructureId) -> bool {
        self.structures.get(&structure).is_some_and(|s| s.parts)
    }

    fn has_malfunction(&self, structure: StructureId) -> bool {
        self.structures.get(&structure).is_some_and(|s| s.malfunction)
    }

    fn trigger_malfunction(&mut self, structure: StructureId) {
        if let Some(s) = self.structures.get_mut(&structure) {
            s.malfunction = true;
        }
    }

    fn is_reserved_for_maintenance(&self, structure: StructureId) -> bool {
        self.structures.get(&structure).is_some_and(|s| s.reserved)
    }

    fn set_reserved_for_maintenance(&mut self, structure: StructureId, reserved: bool) {
        if let Some(s) = self.structures.get_mut(&structure) {
            s.reserved = reserved;
        }
    }

    fn wear(&self, structure: StructureId) -> f64 {
        self.structures.get(&structure).map_or(0.0, |s| s.wear)
    }

    fn add_maintenance_work(&mut self, structure: StructureId, work: f64) -> bool {
        let Some(s) = self.structures.get_mut(&structure) else {
            return false;
        };
        s.work_done += work;
        if s.work_done >= s.work_needed {
            s.wear = 0.0;
            true
        } else {
            false
        }
    }
}

impl Roster for FakeColony {
    fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }
}

/// Daylight, no radiation.
#[derive(Debug, Clone)]
pub struct FakeEnvironment {
    pub irradiance: f64,
    pub sun_setting: bool,
    pub dark_polar: bool,
    pub radiation: bool,
}

impl Default for FakeEnvironment {
    fn default() -> Self {
        Self {
            irradiance: 400.0,
            sun_setting: false,
            dark_polar: false,
            radiation: false,
        }
    }
}

impl Environment for FakeEnvironment {
    fn solar_irradiance(&self, _at: Position) -> f64 {
        self.irradiance
    }

    fn is_sun_setting(&self, _at: Position) -> bool {
        self.sun_setting
    }

    fn in_dark_polar_region(&self, _at: Position) -> bool {
        self.dark_polar
    }

    fn radiation_event(&self, _at: Position) -> bool {
        self.radiation
    }
}

/// One performer in one colony, with a seeded RNG.
pub struct Harness {
    pub performer: FakePerformer,
    pub colony: FakeColony,
    pub environment: FakeEnvironment,
    pub rng: StdRng,
    pub config: TaskConfig,
    pub msol: u32,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_performer(FakePerformer::colonist(1))
    }

    pub fn with_performer(performer: FakePerformer) -> Self {
        Self {
            performer,
            colony: FakeColony::default(),
            environment: FakeEnvironment::default(),
            rng: StdRng::seed_from_u64(7),
            config: TaskConfig::default(),
            msol: 0,
        }
    }

    pub fn ctx(&mut self) -> TaskContext<'_> {
        TaskContext {
            performer: &mut self.performer,
            colony: &mut self.colony,
            environment: &self.environment,
            rng: &mut self.rng,
            config: &self.config,
            msol: self.msol,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
