//! Outpost generation - a settlement with habitats, airlocks, computing
//! and a mixed crew of colonists and robots.

use rand::Rng;

use colony_tasks::world::{
    AirlockId, NaturalAttribute, NodeId, Position, SettlementId, SkillType, StructureId, WorkerId,
};

use crate::components::{Attributes, Skills, Whereabouts};
use crate::engine::ColonySim;
use crate::facilities::{Airlock, ComputeNode, Structure};

/// Configuration for outpost generation
#[derive(Debug, Clone)]
pub struct OutpostConfig {
    pub settlement: SettlementId,
    pub habitats: u32,
    pub airlocks: u32,
    pub colonists: u32,
    pub robots: u32,
    /// Computing units per millisol, one node each.
    pub node_capacities: Vec<f64>,
    /// Habitats are laid out on a ring of this radius, in meters.
    pub radius: f64,
}

impl Default for OutpostConfig {
    fn default() -> Self {
        Self {
            settlement: SettlementId(1),
            habitats: 4,
            airlocks: 2,
            colonists: 6,
            robots: 2,
            node_capacities: vec![8.0, 2.0],
            radius: 30.0,
        }
    }
}

/// What was built.
#[derive(Debug, Clone, Default)]
pub struct OutpostLayout {
    pub habitats: Vec<StructureId>,
    pub airlocks: Vec<AirlockId>,
    pub nodes: Vec<NodeId>,
    pub colonists: Vec<WorkerId>,
    pub robots: Vec<WorkerId>,
}

static HABITAT_NAMES: &[&str] = &[
    "Lander Hab",
    "Residential Quarters",
    "Greenhouse",
    "Workshop",
    "Laboratory",
    "Command Center",
    "Storage Shed",
    "Infirmary",
];

static GIVEN_NAMES: &[&str] = &[
    "Ada", "Grace", "Yuri", "Valentina", "Neil", "Sally", "Wei", "Yuki", "Aisha", "Pavel",
    "Ingrid", "Carlos", "Fatima", "Kwame", "Priya", "Mateo",
];

static FAMILY_NAMES: &[&str] = &[
    "Okafor", "Lindqvist", "Tanaka", "Moreau", "Kowalski", "Haddad", "Ivanova", "Castillo",
    "Nakamura", "Mensah", "Petrov", "Quispe", "Osei", "Fischer",
];

/// Generate a random colonist name
pub fn generate_name(rng: &mut impl Rng) -> String {
    let given = GIVEN_NAMES[rng.gen_range(0..GIVEN_NAMES.len())];
    let family = FAMILY_NAMES[rng.gen_range(0..FAMILY_NAMES.len())];
    format!("{} {}", given, family)
}

fn on_ring(index: u32, count: u32, radius: f64) -> Position {
    let angle = std::f64::consts::TAU * f64::from(index) / f64::from(count.max(1));
    Position::new(radius * angle.cos(), radius * angle.sin())
}

/// Random starting skills with one specialty boosted.
fn random_skills(rng: &mut impl Rng) -> Skills {
    let mut skills = Skills::default();
    for skill in SkillType::ALL {
        skills.levels.insert(skill, rng.gen_range(0..3));
    }
    let specialty = SkillType::ALL[rng.gen_range(0..SkillType::ALL.len())];
    skills.levels.insert(specialty, rng.gen_range(3..6));
    skills
}

fn random_attributes(rng: &mut impl Rng) -> Attributes {
    [
        NaturalAttribute::ExperienceAptitude,
        NaturalAttribute::AcademicAptitude,
        NaturalAttribute::Teaching,
        NaturalAttribute::Conversation,
        NaturalAttribute::Endurance,
    ]
    .into_iter()
    .fold(Attributes::default(), |attrs, a| attrs.with(a, rng.gen_range(20..=80)))
}

/// Build an outpost into `sim`.
pub fn generate_outpost(sim: &mut ColonySim, config: &OutpostConfig, rng: &mut impl Rng) -> OutpostLayout {
    let mut layout = OutpostLayout::default();
    let habitats = config.habitats.max(1);

    for i in 0..habitats {
        let name = HABITAT_NAMES[i as usize % HABITAT_NAMES.len()];
        let structure = Structure::new(name, config.settlement)
            .with_wear(rng.gen_range(0.0..0.3))
            .with_parts(rng.gen_range(0..3));
        layout.habitats.push(sim.facilities.add_structure(structure));
    }

    // Airlocks sit a little further out than the habitats.
    for i in 0..config.airlocks {
        let position = on_ring(i, config.airlocks, config.radius + 10.0);
        let airlock = Airlock::new(format!("Airlock {}", i + 1), config.settlement, position);
        layout.airlocks.push(sim.facilities.add_airlock(airlock));
    }

    for (i, capacity) in config.node_capacities.iter().enumerate() {
        let node = ComputeNode::new(format!("Node {}", i + 1), config.settlement, *capacity);
        layout.nodes.push(sim.facilities.add_node(node));
    }

    for i in 0..config.colonists {
        let hab_index = i % habitats;
        let at = Whereabouts::inside(
            config.settlement,
            layout.habitats[hab_index as usize],
            on_ring(hab_index, habitats, config.radius),
        );
        let id = sim.spawn_colonist(generate_name(rng), at);
        if let Some(entity) = sim.entity_of(id) {
            let _ = sim.world.insert(entity, (random_skills(rng), random_attributes(rng)));
        }
        layout.colonists.push(id);
    }

    for i in 0..config.robots {
        let at = Whereabouts::inside(
            config.settlement,
            layout.habitats[0],
            on_ring(0, habitats, config.radius),
        );
        let id = sim.spawn_robot(format!("Robot {:03}", i + 1), at);
        layout.robots.push(id);
    }

    log::info!(
        "Generated outpost: {} habitats, {} airlocks, {} colonists, {} robots",
        layout.habitats.len(),
        layout.airlocks.len(),
        layout.colonists.len(),
        layout.robots.len()
    );
    layout
}
