//! Experience, teaching and stress side effects of working.
//!
//! # Experience
//!
//! ```text
//! points  = time / K
//! points += points * (aptitude - 50) / 100
//! points *= teaching_modifier
//! ```
//!
//! `K` is the per-skill divisor a task declares (100 for EVA operations,
//! 10 for hands-on outdoor work, and so on). Many tasks are balanced around
//! this exact shape, so it must not be changed.
//!
//! ```
//! use colony_tasks::experience::experience_points;
//!
//! // 10 msol at K = 10, aptitude 70, no teacher: 1 + 1 * 0.2
//! assert!((experience_points(10.0, 10.0, 70, 1.0) - 1.2).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

use crate::phase::Phase;
use crate::world::SkillType;

/// Aptitude at which experience is neither boosted nor reduced.
const APTITUDE_BASELINE: f64 = 50.0;

/// Experience gain for `time` millisols of practice.
pub fn experience_points(time: f64, divisor: f64, aptitude: u32, teaching_modifier: f64) -> f64 {
    if divisor <= 0.0 {
        return 0.0;
    }
    let mut points = time / divisor;
    points += points * (f64::from(aptitude) - APTITUDE_BASELINE) / 100.0;
    points * teaching_modifier
}

/// Someone supervising the performer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    /// The teacher's teaching attribute (0–100).
    pub teaching: u32,
}

/// `1` without a teacher, else `1 + (teaching + learner academic aptitude) / 100`.
pub fn teaching_modifier(teacher: Option<&Teacher>, academic_aptitude: u32) -> f64 {
    match teacher {
        Some(t) => 1.0 + f64::from(t.teaching + academic_aptitude) / 100.0,
        None => 1.0,
    }
}

/// One skill a task trains.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillGain {
    pub skill: SkillType,
    /// Millisols of work per base experience point.
    pub divisor: f64,
    /// Only earn while in one of these phases. `None` means every phase.
    pub phases: Option<&'static [Phase]>,
}

impl SkillGain {
    pub fn always(skill: SkillType, divisor: f64) -> Self {
        Self {
            skill,
            divisor,
            phases: None,
        }
    }

    pub fn during(skill: SkillType, divisor: f64, phases: &'static [Phase]) -> Self {
        Self {
            skill,
            divisor,
            phases: Some(phases),
        }
    }

    pub fn applies_in(&self, phase: Phase) -> bool {
        self.phases.map_or(true, |phases| phases.contains(&phase))
    }
}

/// Stress per millisol after skill relief.
///
/// Positive modifiers are reduced by `relief` per skill level and never go
/// below zero; negative (relaxing) modifiers pass through unchanged.
pub fn effective_stress(modifier: f64, skill_level: u32, relief: f64) -> f64 {
    if modifier <= 0.0 {
        return modifier;
    }
    let reduced = modifier - modifier * f64::from(skill_level) * relief;
    reduced.max(0.0)
}

/// Chance of an accident over `time` millisols.
///
/// Low skill multiplies the base chance (up to 4x at skill 0), high skill
/// divides it; `wear` (0–1) scales it up to double.
pub fn accident_chance(base: f64, time: f64, skill_level: u32, wear: f64) -> f64 {
    let mut chance = base;
    if skill_level <= 3 {
        chance *= f64::from(4 - skill_level);
    } else {
        chance /= f64::from(skill_level - 2);
    }
    chance *= 1.0 + wear.clamp(0.0, 1.0);
    (chance * time).clamp(0.0, 1.0)
}
