//! Compute-node admission for computing-bound tasks.
//!
//! Each tick a task asks for a slice of computing work on the most free node.
//! The size of the request follows two regimes:
//!
//! * small demand (`remaining <= seed`): finish it now,
//!   `work = time * remaining` over the next millisol;
//! * steady state: `work = time * seed * jitter` per millisol over the next
//!   `duration` millisols, which retires `work * duration` of demand.
//!
//! ```
//! use colony_tasks::compute::work_request;
//!
//! let plan = work_request(5.0, 0.5, 1.0, 1.0, 100, 1.0);
//! assert!((plan.work - 0.5).abs() < 1e-12);
//! assert!((plan.remaining_after - 4.5).abs() < 1e-12);
//! assert_eq!((plan.window.start, plan.window.end), (101, 102));
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::claim::{ClaimOutcome, ClaimRequest, ClaimWindow, Denial};
use crate::config::ComputeConfig;
use crate::world::{ComputeNodes, NodeId, WorkerId};

/// One tick's request and its effect on demand if granted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkPlan {
    /// Work units per millisol of the window.
    pub work: f64,
    pub window: ClaimWindow,
    pub remaining_after: f64,
}

/// Size a request for `time` millisols of progress.
pub fn work_request(
    remaining: f64,
    seed: f64,
    time: f64,
    jitter: f64,
    msol: u32,
    duration: f64,
) -> WorkPlan {
    let start = msol.saturating_add(1);
    if remaining <= seed {
        let work = time * remaining;
        WorkPlan {
            work,
            window: ClaimWindow::new(start, start.saturating_add(1)),
            remaining_after: (remaining - work).max(0.0),
        }
    } else {
        let work = time * seed * jitter;
        let span = duration.ceil().max(1.0) as u32;
        WorkPlan {
            work,
            window: ClaimWindow::new(start, start.saturating_add(span)),
            remaining_after: (remaining - work * duration).max(0.0),
        }
    }
}

/// Draw a steady-state jitter factor from the configured range.
pub fn jitter<R: Rng + ?Sized>(config: &ComputeConfig, rng: &mut R) -> f64 {
    if config.jitter_min >= config.jitter_max {
        config.jitter_min
    } else {
        rng.gen_range(config.jitter_min..=config.jitter_max)
    }
}

/// Result of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComputeAccess {
    Granted { node: NodeId, work: f64, remaining: f64 },
    /// No node has room for `work` units.
    NoNode { work: f64 },
    /// The chosen node refused the schedule.
    Denied { work: f64, denial: Denial },
}

/// Outstanding computing demand of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeDemand {
    /// Computing units still needed.
    pub remaining: f64,
    /// Steady-state consumption rate per millisol.
    pub seed: f64,
    /// Span of a steady-state request in millisols.
    pub duration: f64,
}

impl ComputeDemand {
    pub fn new(remaining: f64, seed: f64, duration: f64) -> Self {
        Self {
            remaining: remaining.max(0.0),
            seed,
            duration,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Ask the colony's most free node for this tick's slice. Demand only
    /// drops when the schedule is granted.
    pub fn access<N, R>(
        &mut self,
        nodes: &mut N,
        rng: &mut R,
        config: &ComputeConfig,
        requester: WorkerId,
        time: f64,
        msol: u32,
    ) -> ComputeAccess
    where
        N: ComputeNodes + ?Sized,
        R: Rng + ?Sized,
    {
        let jitter = if self.remaining <= self.seed {
            1.0
        } else {
            jitter(config, rng)
        };
        let plan = work_request(self.remaining, self.seed, time, jitter, msol, self.duration);

        let Some(node) = nodes.most_free_node(plan.work, plan.window) else {
            log::debug!(
                "no computing node can take {:.3} units in msol {}..{}",
                plan.work,
                plan.window.start,
                plan.window.end
            );
            return ComputeAccess::NoNode { work: plan.work };
        };

        let request = ClaimRequest {
            requester,
            amount: plan.work,
            window: plan.window,
        };
        match nodes.schedule(node, &request) {
            ClaimOutcome::Granted(_) => {
                self.remaining = plan.remaining_after;
                ComputeAccess::Granted {
                    node,
                    work: plan.work,
                    remaining: self.remaining,
                }
            }
            ClaimOutcome::Denied(denial) => {
                log::debug!("computing node {:?} denied {:.3} units: {:?}", node, plan.work, denial);
                ComputeAccess::Denied {
                    work: plan.work,
                    denial,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeColony;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat() -> ComputeConfig {
        ComputeConfig {
            jitter_min: 1.0,
            jitter_max: 1.0,
            ..ComputeConfig::default()
        }
    }

    #[test]
    fn small_demand_finishes_in_one_msol() {
        let plan = work_request(0.3, 0.5, 1.0, 1.0, 10, 4.0);
        assert!((plan.work - 0.3).abs() < 1e-12);
        assert_eq!(plan.remaining_after, 0.0);
        assert_eq!(plan.window, ClaimWindow::new(11, 12));
    }

    #[test]
    fn steady_state_spans_duration() {
        let plan = work_request(10.0, 0.5, 1.0, 1.0, 10, 3.0);
        assert!((plan.work - 0.5).abs() < 1e-12);
        assert_eq!(plan.window, ClaimWindow::new(11, 14));
        assert!((plan.remaining_after - 8.5).abs() < 1e-12);
    }

    #[test]
    fn remaining_never_negative() {
        let plan = work_request(1.0, 0.5, 2.0, 1.1, 0, 5.0);
        assert_eq!(plan.remaining_after, 0.0);
        let plan = work_request(0.4, 0.5, 3.0, 1.0, 0, 1.0);
        assert_eq!(plan.remaining_after, 0.0);
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = ComputeConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let j = jitter(&config, &mut rng);
            assert!((0.9..=1.1).contains(&j));
        }
        assert!((jitter(&flat(), &mut rng) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn granted_access_lowers_demand() {
        let mut colony = FakeColony::default();
        colony.add_node(1, 10.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut demand = ComputeDemand::new(5.0, 0.5, 1.0);
        let access = demand.access(&mut colony, &mut rng, &flat(), WorkerId(1), 1.0, 0);
        assert!(matches!(access, ComputeAccess::Granted { .. }));
        assert!((demand.remaining - 4.5).abs() < 1e-12);
    }

    #[test]
    fn no_node_leaves_demand_alone() {
        let mut colony = FakeColony::default();
        colony.add_node(1, 0.1);
        let mut rng = StdRng::seed_from_u64(1);
        let mut demand = ComputeDemand::new(5.0, 0.5, 1.0);
        let access = demand.access(&mut colony, &mut rng, &flat(), WorkerId(1), 1.0, 0);
        assert_eq!(access, ComputeAccess::NoNode { work: 0.5 });
        assert!((demand.remaining - 5.0).abs() < f64::EPSILON);
        assert!(colony.schedule_requests.is_empty());
    }

    #[test]
    fn offline_node_is_unavailable() {
        let mut colony = FakeColony::default();
        let node = colony.add_node(1, 10.0);
        colony.offline_nodes.insert(node);
        let mut rng = StdRng::seed_from_u64(1);
        let mut demand = ComputeDemand::new(5.0, 0.5, 1.0);
        let access = demand.access(&mut colony, &mut rng, &flat(), WorkerId(1), 1.0, 0);
        assert_eq!(
            access,
            ComputeAccess::Denied {
                work: 0.5,
                denial: Denial::Unavailable
            }
        );
        assert!((demand.remaining - 5.0).abs() < f64::EPSILON);
    }
}
