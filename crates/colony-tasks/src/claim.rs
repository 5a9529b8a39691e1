//! Admission to scarce shared resources.
//!
//! Tasks request a claim every tick a resource-bound phase runs; nothing is
//! leased across ticks. A resource manager answers each request atomically
//! with [`ClaimOutcome::Granted`] or [`ClaimOutcome::Denied`], and a denial
//! leaves the manager's bookkeeping untouched.
//!
//! [`CapacityLedger`] is the per-millisol bookkeeping used by compute nodes.
//! [`ClaimPatience`] is the task side: it tells a transient shortage (retry
//! next tick) from exhausted patience (give up and end).

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::world::WorkerId;

/// Half-open millisol window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimWindow {
    pub start: u32,
    pub end: u32,
}

impl ClaimWindow {
    /// An inverted window collapses to empty.
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// The single millisol `msol`.
    pub fn single(msol: u32) -> Self {
        Self::new(msol, msol.saturating_add(1))
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn msols(&self) -> Range<u32> {
        self.start..self.end
    }
}

/// What a task asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub requester: WorkerId,
    /// Work units (per millisol of the window) or slots.
    pub amount: f64,
    pub window: ClaimWindow,
}

/// A granted allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceClaim {
    pub requester: WorkerId,
    pub requested: f64,
    pub granted: f64,
    pub window: ClaimWindow,
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Denial {
    /// Contention: not enough capacity left right now.
    NoCapacity { available: f64 },
    /// The resource is gone or out of service.
    Unavailable,
}

impl Denial {
    /// Transient denials are retried on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, Denial::NoCapacity { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClaimOutcome {
    Granted(ResourceClaim),
    Denied(Denial),
}

impl ClaimOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, ClaimOutcome::Granted(_))
    }

    pub fn granted(&self) -> f64 {
        match self {
            ClaimOutcome::Granted(claim) => claim.granted,
            ClaimOutcome::Denied(_) => 0.0,
        }
    }
}

/// Capacity bookkeeping per millisol.
///
/// Each millisol has the same capacity; reservations add to that millisol's
/// usage. A request covers every millisol of its window with the same amount.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapacityLedger {
    capacity: f64,
    used: BTreeMap<u32, f64>,
}

impl CapacityLedger {
    pub fn new(capacity: f64) -> Self {
        Self {
            capacity: capacity.max(0.0),
            used: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn used_at(&self, msol: u32) -> f64 {
        self.used.get(&msol).copied().unwrap_or(0.0)
    }

    pub fn remaining_at(&self, msol: u32) -> f64 {
        (self.capacity - self.used_at(msol)).max(0.0)
    }

    /// Smallest remaining capacity over the window (0 for an empty window).
    pub fn remaining_in(&self, window: ClaimWindow) -> f64 {
        window
            .msols()
            .map(|m| self.remaining_at(m))
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))))
            .unwrap_or(0.0)
    }

    /// Fraction of capacity free over the window, used to rank nodes.
    pub fn free_fraction(&self, window: ClaimWindow) -> f64 {
        if self.capacity <= 0.0 {
            return 0.0;
        }
        self.remaining_in(window) / self.capacity
    }

    /// All-or-nothing: grants the full amount over the whole window or
    /// changes nothing.
    pub fn try_reserve(&mut self, request: &ClaimRequest) -> ClaimOutcome {
        if request.window.is_empty() || !request.amount.is_finite() || request.amount <= 0.0 {
            return ClaimOutcome::Denied(Denial::NoCapacity { available: 0.0 });
        }
        let available = self.remaining_in(request.window);
        if request.amount > available {
            return ClaimOutcome::Denied(Denial::NoCapacity { available });
        }
        self.commit(request.window, request.amount);
        ClaimOutcome::Granted(ResourceClaim {
            requester: request.requester,
            requested: request.amount,
            granted: request.amount,
            window: request.window,
        })
    }

    /// Return a claim's capacity.
    pub fn release(&mut self, claim: &ResourceClaim) {
        for msol in claim.window.msols() {
            if let Some(used) = self.used.get_mut(&msol) {
                *used = (*used - claim.granted).max(0.0);
                if *used <= f64::EPSILON {
                    self.used.remove(&msol);
                }
            }
        }
    }

    /// Forget bookkeeping for millisols before `msol`.
    pub fn expire_before(&mut self, msol: u32) {
        self.used = self.used.split_off(&msol);
    }

    fn commit(&mut self, window: ClaimWindow, amount: f64) {
        for msol in window.msols() {
            *self.used.entry(msol).or_insert(0.0) += amount;
        }
    }
}

/// What a task should do after a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatienceVerdict {
    Retry,
    GiveUp,
}

/// Task-side record of denied requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimPatience {
    limit: u32,
    consecutive: u32,
    total_denials: u32,
    unmet: f64,
}

impl ClaimPatience {
    /// Give up after `limit` consecutive denials. A limit of 0 never gives up.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn record_grant(&mut self) {
        self.consecutive = 0;
    }

    /// Record a denial and the demand it left unmet.
    pub fn record_denial(&mut self, unmet: f64) -> PatienceVerdict {
        self.consecutive += 1;
        self.total_denials += 1;
        self.unmet += unmet.max(0.0);
        if self.limit > 0 && self.consecutive >= self.limit {
            PatienceVerdict::GiveUp
        } else {
            PatienceVerdict::Retry
        }
    }

    pub fn consecutive_denials(&self) -> u32 {
        self.consecutive
    }

    pub fn total_denials(&self) -> u32 {
        self.total_denials
    }

    pub fn unmet_demand(&self) -> f64 {
        self.unmet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(amount: f64, start: u32, end: u32) -> ClaimRequest {
        ClaimRequest {
            requester: WorkerId(1),
            amount,
            window: ClaimWindow::new(start, end),
        }
    }

    #[test]
    fn window_basics() {
        let w = ClaimWindow::new(5, 3);
        assert!(w.is_empty());
        assert_eq!(ClaimWindow::single(7).len(), 1);
        assert_eq!(ClaimWindow::new(2, 6).msols().count(), 4);
    }

    #[test]
    fn reserve_within_capacity() {
        let mut ledger = CapacityLedger::new(2.0);
        let outcome = ledger.try_reserve(&request(1.5, 10, 12));
        assert!(outcome.is_granted());
        assert!((ledger.remaining_at(10) - 0.5).abs() < 1e-9);
        assert!((ledger.remaining_at(11) - 0.5).abs() < 1e-9);
        assert!((ledger.remaining_at(12) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn denial_when_any_msol_is_short() {
        let mut ledger = CapacityLedger::new(2.0);
        assert!(ledger.try_reserve(&request(1.5, 11, 12)).is_granted());
        let outcome = ledger.try_reserve(&request(1.0, 10, 13));
        match outcome {
            ClaimOutcome::Denied(Denial::NoCapacity { available }) => {
                assert!((available - 0.5).abs() < 1e-9)
            }
            other => panic!("expected denial, got {:?}", other),
        }
        // Nothing committed for msol 10 or 12
        assert!((ledger.used_at(10)).abs() < 1e-9);
        assert!((ledger.used_at(12)).abs() < 1e-9);
    }

    #[test]
    fn release_returns_capacity() {
        let mut ledger = CapacityLedger::new(1.0);
        let ClaimOutcome::Granted(claim) = ledger.try_reserve(&request(1.0, 3, 5)) else {
            panic!("expected grant");
        };
        ledger.release(&claim);
        assert!((ledger.remaining_in(ClaimWindow::new(3, 5)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn expire_drops_past_msols() {
        let mut ledger = CapacityLedger::new(1.0);
        ledger.try_reserve(&request(0.5, 0, 10));
        ledger.expire_before(5);
        assert!((ledger.used_at(4)).abs() < 1e-9);
        assert!((ledger.used_at(5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn patience_gives_up_after_limit() {
        let mut patience = ClaimPatience::new(3);
        assert_eq!(patience.record_denial(1.0), PatienceVerdict::Retry);
        assert_eq!(patience.record_denial(1.0), PatienceVerdict::Retry);
        patience.record_grant();
        assert_eq!(patience.consecutive_denials(), 0);
        assert_eq!(patience.record_denial(1.0), PatienceVerdict::Retry);
        assert_eq!(patience.record_denial(1.0), PatienceVerdict::Retry);
        assert_eq!(patience.record_denial(0.5), PatienceVerdict::GiveUp);
        assert_eq!(patience.total_denials(), 5);
        assert!((patience.unmet_demand() - 4.5).abs() < 1e-9);
    }

    #[test]
    fn zero_limit_never_gives_up() {
        let mut patience = ClaimPatience::new(0);
        for _ in 0..100 {
            assert_eq!(patience.record_denial(1.0), PatienceVerdict::Retry);
        }
    }

    proptest! {
        /// Granted amounts never exceed what was free at grant time, and
        /// denials leave every counter unchanged.
        #[test]
        fn prop_claims_respect_capacity(
            capacity in 0.0f64..10.0,
            requests in prop::collection::vec((0.0f64..5.0, 0u32..20, 1u32..6), 1..40),
        ) {
            let mut ledger = CapacityLedger::new(capacity);
            for (amount, start, len) in requests {
                let req = request(amount, start, start + len);
                let before = ledger.clone();
                let free = ledger.remaining_in(req.window);
                match ledger.try_reserve(&req) {
                    ClaimOutcome::Granted(claim) => {
                        prop_assert!(claim.granted <= free + 1e-9);
                        prop_assert!(claim.granted <= claim.requested + 1e-9);
                    }
                    ClaimOutcome::Denied(_) => {
                        for m in 0..30 {
                            prop_assert!((ledger.used_at(m) - before.used_at(m)).abs() < 1e-12);
                        }
                    }
                }
                for m in 0..30 {
                    prop_assert!(ledger.used_at(m) <= capacity + 1e-9);
                }
            }
        }
    }
}
