//! Per-step dependencies handed to a task.

use rand::RngCore;

use crate::config::TaskConfig;
use crate::world::{Colony, Environment, Performer};

/// Everything a task may touch during one step, injected by the scheduler.
pub struct TaskContext<'a> {
    /// The agent doing the work.
    pub performer: &'a mut dyn Performer,
    /// Airlocks, compute nodes, structures and the roster of other agents.
    pub colony: &'a mut dyn Colony,
    pub environment: &'a dyn Environment,
    pub rng: &'a mut dyn RngCore,
    pub config: &'a TaskConfig,
    /// Current mission time in millisols.
    pub msol: u32,
}
