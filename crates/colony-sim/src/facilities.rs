//! Shared settlement facilities: airlocks, computing nodes and structures.
//!
//! Facilities live outside the ECS world so the engine can lend them to a
//! task as `&mut dyn Colony` while the performer's components are borrowed
//! from the world. Every reservation goes through these methods, one agent
//! at a time.

use std::collections::BTreeMap;

use colony_tasks::claim::{
    CapacityLedger, ClaimOutcome, ClaimRequest, ClaimWindow, Denial, ResourceClaim,
};
use colony_tasks::world::{
    AirlockId, Airlocks, ComputeNodes, MaintenanceCandidate, NodeId, Position, ResourceKind, Roster,
    RosterEntry, SettlementId, StructureId, Structures, WorkerId,
};
use serde::{Deserialize, Serialize};

/// Slots in a standard airlock chamber.
pub const AIRLOCK_CAPACITY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airlock {
    pub name: String,
    pub settlement: SettlementId,
    pub position: Position,
    pub operational: bool,
    pub capacity: usize,
    pub occupants: Vec<WorkerId>,
}

impl Airlock {
    pub fn new(name: impl Into<String>, settlement: SettlementId, position: Position) -> Self {
        Self {
            name: name.into(),
            settlement,
            position,
            operational: true,
            capacity: AIRLOCK_CAPACITY,
            occupants: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.capacity
    }
}

/// A server farm or vehicle computer, in computing units per millisol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeNode {
    pub name: String,
    pub settlement: SettlementId,
    pub ledger: CapacityLedger,
}

impl ComputeNode {
    pub fn new(name: impl Into<String>, settlement: SettlementId, capacity: f64) -> Self {
        Self {
            name: name.into(),
            settlement,
            ledger: CapacityLedger::new(capacity),
        }
    }
}

/// A building or vehicle that wears with use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub name: String,
    pub settlement: SettlementId,
    /// 0.0 (new) to 1.0 (worn out).
    pub wear: f64,
    /// Wear gained per millisol.
    pub wear_rate: f64,
    /// Spare part kits in stock; one is used per completed maintenance.
    pub parts: u32,
    pub malfunction: bool,
    pub reserved_for_maintenance: bool,
    /// Work units a full maintenance takes.
    pub maintenance_needed: f64,
    pub maintenance_done: f64,
    pub maintenance_count: u32,
}

impl Structure {
    pub fn new(name: impl Into<String>, settlement: SettlementId) -> Self {
        Self {
            name: name.into(),
            settlement,
            wear: 0.0,
            wear_rate: 0.0001,
            parts: 1,
            malfunction: false,
            reserved_for_maintenance: false,
            maintenance_needed: 100.0,
            maintenance_done: 0.0,
            maintenance_count: 0,
        }
    }

    pub fn with_wear(mut self, wear: f64) -> Self {
        self.wear = wear.clamp(0.0, 1.0);
        self
    }

    pub fn with_parts(mut self, parts: u32) -> Self {
        self.parts = parts;
        self
    }

    pub fn with_maintenance_needed(mut self, work: f64) -> Self {
        self.maintenance_needed = work.max(0.0);
        self
    }
}

/// Everything agents share, plus the roster published for this tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facilities {
    pub airlocks: BTreeMap<AirlockId, Airlock>,
    pub nodes: BTreeMap<NodeId, ComputeNode>,
    pub structures: BTreeMap<StructureId, Structure>,
    /// Resources unloaded by returning workers, in kilograms.
    pub stock: BTreeMap<ResourceKind, f64>,
    #[serde(skip)]
    pub roster: Vec<RosterEntry>,
    next_id: u32,
}

impl Facilities {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_airlock(&mut self, airlock: Airlock) -> AirlockId {
        let id = AirlockId(self.allocate());
        self.airlocks.insert(id, airlock);
        id
    }

    pub fn add_node(&mut self, node: ComputeNode) -> NodeId {
        let id = NodeId(self.allocate());
        self.nodes.insert(id, node);
        id
    }

    pub fn add_structure(&mut self, structure: Structure) -> StructureId {
        let id = StructureId(self.allocate());
        self.structures.insert(id, structure);
        id
    }

    pub fn airlock(&self, id: AirlockId) -> Option<&Airlock> {
        self.airlocks.get(&id)
    }

    pub fn airlock_mut(&mut self, id: AirlockId) -> Option<&mut Airlock> {
        self.airlocks.get_mut(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&ComputeNode> {
        self.nodes.get(&id)
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    pub fn structure_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(&id)
    }

    pub fn stock(&self, resource: ResourceKind) -> f64 {
        self.stock.get(&resource).copied().unwrap_or(0.0)
    }

    pub fn deposit(&mut self, resource: ResourceKind, amount: f64) {
        if amount > 0.0 {
            *self.stock.entry(resource).or_insert(0.0) += amount;
        }
    }

    /// Workers currently holding a slot in any airlock.
    pub fn airlock_occupants(&self) -> impl Iterator<Item = (AirlockId, WorkerId)> + '_ {
        self.airlocks
            .iter()
            .flat_map(|(id, a)| a.occupants.iter().map(move |w| (*id, *w)))
    }

    /// Age structures and drop compute bookkeeping that is in the past.
    pub fn advance(&mut self, msol: u32, elapsed: f64) {
        for structure in self.structures.values_mut() {
            if !structure.malfunction {
                structure.wear = (structure.wear + structure.wear_rate * elapsed).min(1.0);
            }
        }
        for node in self.nodes.values_mut() {
            node.ledger.expire_before(msol);
        }
    }
}

impl Airlocks for Facilities {
    fn closest_airlock(&self, settlement: SettlementId, from: Position) -> Option<AirlockId> {
        self.airlocks
            .iter()
            .filter(|(_, a)| a.settlement == settlement && a.operational)
            .min_by(|(_, a), (_, b)| from.distance(a.position).total_cmp(&from.distance(b.position)))
            .map(|(id, _)| *id)
    }

    fn airlock_position(&self, airlock: AirlockId) -> Option<Position> {
        self.airlocks.get(&airlock).map(|a| a.position)
    }

    fn is_operational(&self, airlock: AirlockId) -> bool {
        self.airlocks.get(&airlock).is_some_and(|a| a.operational)
    }

    fn request_slot(&mut self, airlock: AirlockId, request: &ClaimRequest) -> ClaimOutcome {
        let Some(lock) = self.airlocks.get_mut(&airlock).filter(|a| a.operational) else {
            return ClaimOutcome::Denied(Denial::Unavailable);
        };
        if !lock.occupants.contains(&request.requester) {
            if lock.is_full() {
                log::debug!("{} is full, {:?} has to wait", lock.name, request.requester);
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

impl ComputeNodes for Facilities {
    /// The node with the largest free share of its capacity over the
    /// window, among those that can take `work`. Ties go to the lower id.
    fn most_free_node(&mut self, work: f64, window: ClaimWindow) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for (id, node) in &self.nodes {
            if node.ledger.remaining_in(window) < work {
                continue;
            }
            let free = node.ledger.free_fraction(window);
            if best.map_or(true, |(_, f)| free > f) {
                best = Some((*id, free));
            }
        }
        best.map(|(id, _)| id)
    }

    fn schedule(&mut self, node: NodeId, request: &ClaimRequest) -> ClaimOutcome {
        match self.nodes.get_mut(&node) {
            Some(n) => n.ledger.try_reserve(request),
            None => ClaimOutcome::Denied(Denial::Unavailable),
        }
    }
}

impl Structures for Facilities {
    fn maintenance_candidates(&self, settlement: SettlementId) -> Vec<MaintenanceCandidate> {
        self.structures
            .iter()
            .filter(|(_, s)| {
                s.settlement == settlement
                    && s.wear > 0.0
                    && !s.malfunction
                    && !s.reserved_for_maintenance
            })
            .map(|(id, s)| MaintenanceCandidate {
                structure: *id,
                wear: s.wear,
            })
            .collect()
    }

    fn parts_available(&self, structure: StructureId) -> bool {
        self.structures.get(&structure).is_some_and(|s| s.parts > 0)
    }

    fn has_malfunction(&self, structure: StructureId) -> bool {
        self.structures.get(&structure).is_some_and(|s| s.malfunction)
    }

    fn trigger_malfunction(&mut self, structure: StructureId) {
        if let Some(s) = self.structures.get_mut(&structure) {
            log::warn!("{} malfunctioned", s.name);
            s.malfunction = true;
        }
    }

    fn is_reserved_for_maintenance(&self, structure: StructureId) -> bool {
        self.structures
            .get(&structure)
            .is_some_and(|s| s.reserved_for_maintenance)
    }

    fn set_reserved_for_maintenance(&mut self, structure: StructureId, reserved: bool) {
        if let Some(s) = self.structures.get_mut(&structure) {
            s.reserved_for_maintenance = reserved;
        }
    }

    fn wear(&self, structure: StructureId) -> f64 {
        self.structures.get(&structure).map_or(0.0, |s| s.wear)
    }

    fn add_maintenance_work(&mut self, structure: StructureId, work: f64) -> bool {
        let Some(s) = self.structures.get_mut(&structure) else {
            return false;
        };
        s.maintenance_done += work.max(0.0);
        if s.maintenance_done < s.maintenance_needed {
            return false;
        }
        s.maintenance_done = 0.0;
        s.maintenance_count += 1;
        s.wear = 0.0;
        s.parts = s.parts.saturating_sub(1);
        log::info!("{} maintenance complete", s.name);
        true
    }
}

impl Roster for Facilities {
    fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: SettlementId = SettlementId(1);

    fn request(who: u32) -> ClaimRequest {
        ClaimRequest {
            requester: WorkerId(who),
            amount: 1.0,
            window: ClaimWindow::single(0),
        }
    }

    #[test]
    fn airlock_admits_up_to_capacity() {
        let mut f = Facilities::new();
        let lock = f.add_airlock(Airlock::new("West Lock", HOME, Position::default()));
        for who in 0..AIRLOCK_CAPACITY as u32 {
            assert!(f.request_slot(lock, &request(who)).is_granted());
        }
        // Holding a slot is not a second admission.
        assert!(f.request_slot(lock, &request(0)).is_granted());
        assert_eq!(
            f.request_slot(lock, &request(99)),
            ClaimOutcome::Denied(Denial::NoCapacity { available: 0.0 })
        );
        assert!(f.release_slot(lock, WorkerId(0)));
        assert!(!f.release_slot(lock, WorkerId(0)));
        assert!(f.request_slot(lock, &request(99)).is_granted());
    }

    #[test]
    fn broken_airlock_is_unavailable() {
        let mut f = Facilities::new();
        let lock = f.add_airlock(Airlock::new("West Lock", HOME, Position::default()));
        if let Some(a) = f.airlock_mut(lock) {
            a.operational = false;
        }
        assert_eq!(
            f.request_slot(lock, &request(1)),
            ClaimOutcome::Denied(Denial::Unavailable)
        );
        assert_eq!(f.closest_airlock(HOME, Position::default()), None);
    }

    #[test]
    fn closest_airlock_wins() {
        let mut f = Facilities::new();
        f.add_airlock(Airlock::new("Far", HOME, Position::new(100.0, 0.0)));
        let near = f.add_airlock(Airlock::new("Near", HOME, Position::new(5.0, 0.0)));
        f.add_airlock(Airlock::new("Elsewhere", SettlementId(2), Position::new(1.0, 0.0)));
        assert_eq!(f.closest_airlock(HOME, Position::default()), Some(near));
    }

    #[test]
    fn most_free_node_prefers_headroom() {
        let mut f = Facilities::new();
        let small = f.add_node(ComputeNode::new("Rover computer", HOME, 2.0));
        let big = f.add_node(ComputeNode::new("Server farm", HOME, 10.0));
        let window = ClaimWindow::new(0, 3);
        assert_eq!(f.most_free_node(1.0, window), Some(small));

        let claim = ClaimRequest {
            requester: WorkerId(1),
            amount: 1.5,
            window,
        };
        assert!(f.schedule(small, &claim).is_granted());
        assert_eq!(f.most_free_node(1.0, window), Some(big));
        assert_eq!(f.most_free_node(20.0, window), None);
    }

    #[test]
    fn maintenance_uses_a_part_and_resets_wear() {
        let mut f = Facilities::new();
        let hab = f.add_structure(
            Structure::new("Lander Hab", HOME)
                .with_wear(0.4)
                .with_maintenance_needed(10.0),
        );
        assert_eq!(f.maintenance_candidates(HOME).len(), 1);
        f.set_reserved_for_maintenance(hab, true);
        assert!(f.maintenance_candidates(HOME).is_empty());

        assert!(!f.add_maintenance_work(hab, 6.0));
        assert!(f.add_maintenance_work(hab, 6.0));
        let s = f.structure(hab).unwrap();
        assert_eq!(s.wear, 0.0);
        assert_eq!(s.parts, 0);
        assert!(!f.parts_available(hab));
    }

    #[test]
    fn advance_wears_and_expires() {
        let mut f = Facilities::new();
        let hab = f.add_structure(Structure::new("Lander Hab", HOME));
        let node = f.add_node(ComputeNode::new("Server farm", HOME, 1.0));
        let claim = ClaimRequest {
            requester: WorkerId(1),
            amount: 1.0,
            window: ClaimWindow::new(0, 2),
        };
        assert!(f.schedule(node, &claim).is_granted());

        f.advance(1, 100.0);
        assert!(f.structure(hab).unwrap().wear > 0.0);
        assert_eq!(f.node(node).unwrap().ledger.used_at(0), 0.0);
        assert_eq!(f.node(node).unwrap().ledger.used_at(1), 1.0);
    }
}
