use bevy::prelude::*;

use crate::components::GameConfig;
use crate::session::{GameValue, Session};

/// Stage of the in-game day, used by content scripts and spawn tables.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DayStage {
    Night,
    Dawn,
    Morning,
    Afternoon,
    Dusk,
}

impl DayStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::Dawn => "dawn",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Dusk => "dusk",
        }
    }
}

/// In-game clock. Advances on the fixed timestep, scaled so that
/// `secs_per_hour` real seconds make one game hour.
#[derive(Resource, Clone)]
pub struct GameClock {
    /// Total elapsed real seconds since the session started.
    pub elapsed: f64,
    secs_per_hour: f64,
}

impl GameClock {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            elapsed: 0.0,
            secs_per_hour: config.secs_per_hour.max(1.0) as f64,
        }
    }

    pub fn tick(&mut self, dt: f32) {
        self.elapsed += dt as f64;
    }

    /// Current hour of the game day in [0, 24).
    pub fn hour(&self) -> f64 {
        (self.elapsed / self.secs_per_hour) % 24.0
    }

    pub fn day_stage(&self) -> DayStage {
        day_stage_for_hour(self.hour())
    }

    /// Daylight test used by the `day_night` scripts: true during 06-18.
    pub fn is_day(&self) -> bool {
        let hour = self.hour();
        (6.0..18.0).contains(&hour)
    }
}

pub fn day_stage_for_hour(hour: f64) -> DayStage {
    if hour < 4.0 {
        DayStage::Night
    } else if hour < 8.0 {
        DayStage::Dawn
    } else if hour < 12.0 {
        DayStage::Morning
    } else if hour < 16.0 {
        DayStage::Afternoon
    } else if hour < 20.0 {
        DayStage::Dusk
    } else {
        DayStage::Night
    }
}

/// Gregorian leap year rule, century exception included. Used by the
/// calendar-driven seasonal events.
pub fn is_leap_year(year: i32) -> bool {
    (year % 400 == 0) && (year % 100 == 0) || (year % 4 == 0) && (year % 100 != 0)
}

pub struct GameClockPlugin;

impl Plugin for GameClockPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(FixedUpdate, tick_clock);
    }
}

/// Advance the clock and mirror it into game variables, where map scripts
/// read it (`variable_is hour,>=,18` and friends).
fn tick_clock(mut clock: ResMut<GameClock>, mut session: ResMut<Session>, time: Res<Time<Fixed>>) {
    clock.tick(time.delta_secs());
    session.set_variable("hour", GameValue::Num(clock.hour().floor()));
    session.set_variable(
        "day_stage",
        GameValue::Str(clock.day_stage().as_str().to_string()),
    );
    session.set_variable(
        "daytime",
        GameValue::Str(if clock.is_day() { "true" } else { "false" }.to_string()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leap_year_rule() {
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
        assert!(is_leap_year(1600));
    }

    #[test]
    fn day_stages_cover_the_clock() {
        assert_eq!(day_stage_for_hour(0.0), DayStage::Night);
        assert_eq!(day_stage_for_hour(5.0), DayStage::Dawn);
        assert_eq!(day_stage_for_hour(9.5), DayStage::Morning);
        assert_eq!(day_stage_for_hour(13.0), DayStage::Afternoon);
        assert_eq!(day_stage_for_hour(17.0), DayStage::Dusk);
        assert_eq!(day_stage_for_hour(23.0), DayStage::Night);
    }

    #[test]
    fn clock_scales_elapsed_to_hours() {
        let config = GameConfig {
            secs_per_hour: 10.0,
            ..GameConfig::default()
        };
        let mut clock = GameClock::new(&config);
        clock.tick(25.0);
        assert!((clock.hour() - 2.5).abs() < 1e-9);
        assert!(!clock.is_day());
    }
}
