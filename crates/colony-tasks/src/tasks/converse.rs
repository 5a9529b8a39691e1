//! Casual conversation between colonists.
//!
//! The partner is chosen from the published roster, closest circle first:
//!
//! 1. the performer's building, idle colonists before busy ones;
//! 2. the rest of the settlement, idle before busy;
//! 3. other settlements, if remote calls are allowed.
//!
//! A tier is only skipped when it has nobody in it. Within a tier the
//! partner is picked uniformly at random.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ConversationConfig, TaskConfig};
use crate::context::TaskContext;
use crate::error::TaskError;
use crate::experience::SkillGain;
use crate::phase::Phase;
use crate::snapshot::TaskKind;
use crate::task::{PhaseHandler, Task, TaskBehavior, TaskDuration, TaskProfile, TaskState};
use crate::world::{
    NaturalAttribute, PerformerKind, RosterEntry, SettlementId, SkillType, StructureId, WorkerId,
};

pub const CONVERSING: Phase = Phase::new("Conversing");

/// How close the partner is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerTier {
    SameBuilding,
    SameSettlement,
    AnotherSettlement,
}

impl PartnerTier {
    pub fn is_remote(self) -> bool {
        self == PartnerTier::AnotherSettlement
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Converse {
    partner: Option<(WorkerId, PartnerTier)>,
}

impl Converse {
    /// Find someone to talk to. Robots and lonely colonists end right away.
    pub fn begin(ctx: &mut TaskContext<'_>) -> Result<Task<Self>, TaskError> {
        let duration = conversation_length(
            &ctx.config.conversation,
            ctx.performer.attribute(NaturalAttribute::Conversation),
            &mut *ctx.rng,
        );
        let duration = TaskDuration::Bounded(duration);

        let partner = if ctx.performer.kind() == PerformerKind::Robot {
            None
        } else {
            select_partner(
                ctx.colony.roster(),
                ctx.performer.id(),
                ctx.performer.building(),
                ctx.performer.settlement(),
                ctx.config.conversation.allow_remote,
                &mut *ctx.rng,
            )
        };
        let Some(partner) = partner else {
            log::debug!("{} has nobody to talk to", ctx.performer.name());
            let mut task = Task::new(Self::default(), duration, ctx.config);
            task.end(ctx);
            return Ok(task);
        };

        let mut task = Task::new(
            Self {
                partner: Some(partner),
            },
            duration,
            ctx.config,
        );
        task.register_phase_table()?;
        task.set_phase(CONVERSING)?;
        log::info!(
            "{} chatting with {:?} ({:?})",
            ctx.performer.name(),
            partner.0,
            partner.1
        );
        Ok(task)
    }

    pub fn partner(&self) -> Option<WorkerId> {
        self.partner.map(|(id, _)| id)
    }

    pub fn tier(&self) -> Option<PartnerTier> {
        self.partner.map(|(_, tier)| tier)
    }
}

/// `max(1, base + U(0, conversation) / attribute_per_msol)` millisols.
pub fn conversation_length<R: Rng + ?Sized>(
    config: &ConversationConfig,
    conversation: u32,
    rng: &mut R,
) -> f64 {
    let extra = if conversation == 0 || config.attribute_per_msol <= 0.0 {
        0.0
    } else {
        rng.gen_range(0.0..=f64::from(conversation)) / config.attribute_per_msol
    };
    (config.base_duration + extra).max(1.0)
}

/// Walk the partner cascade over the roster.
pub fn select_partner<R: Rng + ?Sized>(
    roster: &[RosterEntry],
    me: WorkerId,
    building: Option<StructureId>,
    settlement: Option<SettlementId>,
    allow_remote: bool,
    rng: &mut R,
) -> Option<(WorkerId, PartnerTier)> {
    let colonists: Vec<&RosterEntry> = roster
        .iter()
        .filter(|e| e.id != me && e.kind == PerformerKind::Colonist)
        .collect();

    let same_building =
        |e: &RosterEntry| building.is_some() && e.building == building && e.settlement == settlement;
    let same_settlement =
        |e: &RosterEntry| settlement.is_some() && e.settlement == settlement && !same_building(e);
    let elsewhere = |e: &RosterEntry| e.settlement.is_some() && e.settlement != settlement;

    let tiers: [(PartnerTier, &dyn Fn(&RosterEntry) -> bool); 3] = [
        (PartnerTier::SameBuilding, &same_building),
        (PartnerTier::SameSettlement, &same_settlement),
        (PartnerTier::AnotherSettlement, &elsewhere),
    ];

    for (tier, in_tier) in tiers {
        if tier.is_remote() && !allow_remote {
            break;
        }
        for idle_only in [true, false] {
            let pool: Vec<WorkerId> = colonists
                .iter()
                .filter(|e| in_tier(**e) && (!idle_only || !e.busy))
                .map(|e| e.id)
                .collect();
            if let Some(id) = pool.choose(&mut *rng) {
                return Some((*id, tier));
            }
        }
    }
    None
}

fn conversing(
    c: &mut Converse,
    state: &mut TaskState,
    ctx: &mut TaskContext<'_>,
    time: f64,
) -> Result<f64, TaskError> {
    let Some((partner, tier)) = c.partner else {
        state.end();
        return Ok(time);
    };
    let entry = ctx.colony.roster().iter().find(|e| e.id == partner).copied();
    let still_there = match entry {
        Some(e) if tier.is_remote() => e.settlement.is_some(),
        Some(e) => e.settlement.is_some() && e.settlement == ctx.performer.settlement(),
        None => false,
    };
    if !still_there {
        log::debug!("{} lost their conversation partner", ctx.performer.name());
        state.end();
        return Ok(time);
    }
    if state.duration_reached() {
        state.end();
        return Ok(time);
    }

    let used = time.min(state.remaining_duration());
    if state.remaining_duration() - used <= 0.0 {
        state.end();
    }
    Ok(time - used)
}

impl TaskBehavior for Converse {
    const KIND: TaskKind = TaskKind::Converse;

    fn phase_table() -> Vec<(Phase, PhaseHandler<Self>)> {
        vec![(CONVERSING, conversing as PhaseHandler<Self>)]
    }

    fn profile(&self, config: &TaskConfig) -> TaskProfile {
        let mut profile = TaskProfile::new("Converse");
        profile.stress_modifier = config.conversation.stress_modifier;
        profile.experience_attribute = NaturalAttribute::Conversation;
        profile.experience = vec![
            SkillGain::always(SkillType::Psychology, 50.0),
            SkillGain::always(SkillType::Reporting, 50.0),
        ];
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePerformer, Harness};
    use crate::world::WorkerLocation;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(id: u32, building: u32, settlement: u32, busy: bool) -> RosterEntry {
        RosterEntry {
            id: WorkerId(id),
            kind: PerformerKind::Colonist,
            building: Some(StructureId(building)),
            settlement: Some(SettlementId(settlement)),
            location: WorkerLocation::Inside,
            busy,
        }
    }

    fn pick(roster: &[RosterEntry], allow_remote: bool) -> Option<(WorkerId, PartnerTier)> {
        let mut rng = StdRng::seed_from_u64(11);
        select_partner(
            roster,
            WorkerId(1),
            Some(StructureId(1)),
            Some(SettlementId(1)),
            allow_remote,
            &mut rng,
        )
    }

    #[test]
    fn idle_neighbour_preferred() {
        let roster = [entry(1, 1, 1, false), entry(2, 1, 1, true), entry(3, 1, 1, false)];
        assert_eq!(pick(&roster, true), Some((WorkerId(3), PartnerTier::SameBuilding)));
    }

    #[test]
    fn busy_neighbour_before_other_buildings() {
        let roster = [entry(2, 1, 1, true), entry(3, 2, 1, false)];
        assert_eq!(pick(&roster, true), Some((WorkerId(2), PartnerTier::SameBuilding)));
    }

    #[test]
    fn falls_through_to_settlement_then_remote() {
        let roster = [entry(3, 2, 1, true), entry(4, 5, 2, false)];
        assert_eq!(pick(&roster, true), Some((WorkerId(3), PartnerTier::SameSettlement)));
        let roster = [entry(4, 5, 2, false)];
        assert_eq!(pick(&roster, true), Some((WorkerId(4), PartnerTier::AnotherSettlement)));
        assert_eq!(pick(&roster, false), None);
    }

    #[test]
    fn length_has_a_floor() {
        let config = ConversationConfig {
            base_duration: 0.2,
            ..ConversationConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        assert!((conversation_length(&config, 0, &mut rng) - 1.0).abs() < f64::EPSILON);
        let long = conversation_length(&ConversationConfig::default(), 100, &mut rng);
        assert!((1.0..=6.0).contains(&long));
    }

    #[test]
    fn robots_do_not_chat() {
        let mut h = Harness::with_performer(FakePerformer::robot(1));
        h.colony.roster = vec![entry(2, 1, 1, false)];
        let task = Converse::begin(&mut h.ctx()).unwrap();
        assert!(task.is_done());
    }

    #[test]
    fn conversation_relaxes_and_ends_when_partner_leaves() {
        let mut h = Harness::new();
        h.performer.stress = 1.0;
        h.colony.roster = vec![entry(2, 1, 1, false)];
        let mut task = Converse::begin(&mut h.ctx()).unwrap();
        assert_eq!(task.behavior().partner(), Some(WorkerId(2)));

        task.step(&mut h.ctx(), 0.5).unwrap();
        assert!(h.performer.stress < 1.0);
        assert!(h.performer.experience(SkillType::Psychology) > 0.0);

        h.colony.roster[0].settlement = Some(SettlementId(7));
        task.step(&mut h.ctx(), 0.5).unwrap();
        assert!(task.is_done());
    }
}
