//! Shared setups for the integration tests.

#![allow(dead_code)]

use colony_tasks::testing::{FakeStructure, Harness};
use colony_tasks::world::{AirlockId, Position, SettlementId, StructureId};

pub const AIRLOCK_AT: Position = Position::new(10.0, 0.0);

/// Fast airlocks and quick walkers, no accidents, flat compute jitter.
pub fn harness() -> Harness {
    let mut h = Harness::new();
    h.config.eva.airlock_cycle_time = 2.0;
    h.config.eva.walk_speed = 10.0;
    h.config.eva.base_accident_chance = 0.0;
    h.config.maintenance.base_accident_chance = 0.0;
    h.config.compute.jitter_min = 1.0;
    h.config.compute.jitter_max = 1.0;
    h
}

pub fn with_airlock(mut h: Harness) -> (Harness, AirlockId) {
    let airlock = h.colony.add_airlock(1, AIRLOCK_AT);
    (h, airlock)
}

pub fn with_structure(mut h: Harness, id: u32, parts: bool) -> Harness {
    let mut structure = FakeStructure::worn(SettlementId(1), 0.5);
    structure.parts = parts;
    h.colony.structures.insert(StructureId(id), structure);
    h
}
