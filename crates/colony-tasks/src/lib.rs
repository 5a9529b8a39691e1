//! Colonist task logic for the colony simulation.
//!
//! A task is a small state machine of named phases. The scheduler hands it
//! a slice of time each tick; the current phase's handler spends some of it,
//! may move to another phase, and hands back the rest. Everything a task
//! touches (the performer, airlocks, compute nodes, structures, other
//! colonists, the weather) comes in through [`context::TaskContext`], so the
//! crate has no engine or ECS dependency.
//!
//! ```
//! use colony_tasks::tasks::analyze_map::AnalyzeMap;
//! use colony_tasks::task::TaskDuration;
//! use colony_tasks::testing::Harness;
//!
//! let mut h = Harness::new();
//! h.colony.add_node(1, 10.0);
//! h.config.compute.jitter_min = 1.0;
//! h.config.compute.jitter_max = 1.0;
//!
//! let mut task = AnalyzeMap::begin(5.0, 0.5, 1.0, TaskDuration::Unbounded, &mut h.ctx()).unwrap();
//! let left = task.step(&mut h.ctx(), 1.0).unwrap();
//! assert_eq!(left, 0.0);
//! assert!((task.behavior().computing_needed() - 4.5).abs() < 1e-12);
//! ```
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`claim`] | Claim windows, capacity ledger, retry patience |
//! | [`compute`] | Two-regime compute-node admission |
//! | [`config`] | Tunable constants, JSON overrides |
//! | [`context`] | Per-step collaborators handed to a task |
//! | [`error`] | Step contract violations |
//! | [`eva`] | Airlock egress/ingress and outdoor hazard policy |
//! | [`experience`] | Experience, teaching, stress and accident formulas |
//! | [`phase`] | Phase tags |
//! | [`snapshot`] | Saved task form |
//! | [`task`] | Phase registry, step loop, end hook, scheduler trait |
//! | [`tasks`] | Maintenance, map analysis, regolith digging, conversation |
//! | [`testing`] | In-memory collaborators for tests |
//! | [`world`] | Collaborator traits and ids |

pub mod claim;
pub mod compute;
pub mod config;
pub mod context;
pub mod error;
pub mod eva;
pub mod experience;
pub mod phase;
pub mod snapshot;
pub mod task;
pub mod tasks;
pub mod testing;
pub mod world;

pub use config::TaskConfig;
pub use context::TaskContext;
pub use error::TaskError;
pub use phase::Phase;
pub use task::{ColonyTask, Task, TaskBehavior, TaskDuration};
