//! Surface conditions around the settlement.
//!
//! A sol is 1000 millisols. The sun rises at [`SUNRISE`] and sets at
//! [`SUNSET`]; irradiance follows a half sine between them, scaled by dust
//! opacity. Radiation events are scheduled by the engine and last a fixed
//! number of millisols.

use colony_tasks::config::MAX_SOLAR_IRRADIANCE;
use colony_tasks::world::{Environment, Position};
use serde::{Deserialize, Serialize};

pub const MSOLS_PER_SOL: u32 = 1000;
pub const SUNRISE: u32 = 250;
pub const SUNSET: u32 = 750;
/// Millisols before sunset counted as dusk.
pub const DUSK: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConditions {
    /// Mission clock in millisols.
    pub msol: u32,
    /// 0.0 (clear) to 1.0 (global dust storm).
    pub dust_opacity: f64,
    /// Whether the settlement sits in a polar night.
    pub polar_night: bool,
    /// Radiation is reaching the surface until this millisol (exclusive).
    pub radiation_until: Option<u32>,
}

impl Default for SurfaceConditions {
    fn default() -> Self {
        Self {
            msol: 0,
            dust_opacity: 0.1,
            polar_night: false,
            radiation_until: None,
        }
    }
}

impl SurfaceConditions {
    pub fn time_of_day(&self) -> u32 {
        self.msol % MSOLS_PER_SOL
    }

    pub fn is_daytime(&self) -> bool {
        (SUNRISE..SUNSET).contains(&self.time_of_day())
    }

    /// Start a radiation event lasting `length` millisols.
    pub fn start_radiation_event(&mut self, length: u32) {
        let until = self.msol.saturating_add(length);
        self.radiation_until = Some(self.radiation_until.map_or(until, |u| u.max(until)));
        log::warn!("Radiation event until msol {}", until);
    }

    pub fn radiation_active(&self) -> bool {
        self.radiation_until.is_some_and(|u| self.msol < u)
    }
}

impl Environment for SurfaceConditions {
    fn solar_irradiance(&self, _at: Position) -> f64 {
        if self.polar_night || !self.is_daytime() {
            return 0.0;
        }
        let day_length = f64::from(SUNSET - SUNRISE);
        let t = f64::from(self.time_of_day() - SUNRISE) / day_length;
        MAX_SOLAR_IRRADIANCE * (std::f64::consts::PI * t).sin() * (1.0 - self.dust_opacity.clamp(0.0, 1.0))
    }

    fn is_sun_setting(&self, _at: Position) -> bool {
        (SUNSET - DUSK..SUNSET).contains(&self.time_of_day())
    }

    fn in_dark_polar_region(&self, _at: Position) -> bool {
        self.polar_night
    }

    fn radiation_event(&self, _at: Position) -> bool {
        self.radiation_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(msol: u32) -> SurfaceConditions {
        SurfaceConditions {
            msol,
            dust_opacity: 0.0,
            ..SurfaceConditions::default()
        }
    }

    #[test]
    fn noon_is_brightest() {
        let here = Position::default();
        assert_eq!(at(100).solar_irradiance(here), 0.0);
        assert!((at(500).solar_irradiance(here) - MAX_SOLAR_IRRADIANCE).abs() < 1e-6);
        assert!(at(300).solar_irradiance(here) < at(500).solar_irradiance(here));
        assert!(at(1500).solar_irradiance(here) > 500.0);
    }

    #[test]
    fn dusk_before_sunset() {
        let here = Position::default();
        assert!(!at(690).is_sun_setting(here));
        assert!(at(720).is_sun_setting(here));
        assert!(!at(760).is_sun_setting(here));
    }

    #[test]
    fn radiation_events_expire() {
        let mut s = at(10);
        s.start_radiation_event(5);
        assert!(s.radiation_event(Position::default()));
        s.msol = 15;
        assert!(!s.radiation_event(Position::default()));
    }
}
