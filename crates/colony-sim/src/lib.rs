//! Colony Sim - Settlement Simulation Engine
//!
//! An ECS-based settlement where colonists and robots carry out tasks from
//! `colony-tasks` against shared facilities.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: colonists and robots
//! - **Components**: pure data attached to agents (Skills, Whereabouts, Cargo, ...)
//! - **Facilities**: airlocks, computing nodes and structures, owned by the
//!   engine and lent to one task step at a time
//!
//! # Example
//!
//! ```rust
//! use colony_sim::prelude::*;
//! use colony_sim::generation::{generate_outpost, OutpostConfig};
//! use rand::SeedableRng;
//!
//! let mut sim = ColonySim::new(TaskConfig::default(), 1);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1);
//! let layout = generate_outpost(&mut sim, &OutpostConfig::default(), &mut rng);
//!
//! sim.assign(layout.colonists[0], TaskOrder::Converse).unwrap();
//! sim.run(10);
//! assert_eq!(sim.msol(), 10);
//! ```

pub mod components;
pub mod engine;
pub mod facilities;
pub mod generation;
pub mod performer;
pub mod persistence;
pub mod surface;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{ColonySim, EngineError, TaskOrder, TaskStatus};
    pub use crate::facilities::{Airlock, ComputeNode, Facilities, Structure};
    pub use crate::surface::SurfaceConditions;
    pub use colony_tasks::config::TaskConfig;
}
