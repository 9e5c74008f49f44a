use bevy::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};

/// Tunable game configuration, loaded from `game.json` at startup.
#[derive(Resource, Clone, serde::Serialize, serde::Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_content_dir")]
    pub content_dir: String,
    #[serde(default = "default_maps_dir")]
    pub maps_dir: String,
    #[serde(default = "default_starting_map")]
    pub starting_map: String,
    /// Global difficulty scalar applied to every encounter table weight.
    #[serde(default = "default_encounter_rate_modifier")]
    pub encounter_rate_modifier: f32,
    /// Real seconds per in-game hour.
    #[serde(default = "default_secs_per_hour")]
    pub secs_per_hour: f32,
    /// Fixed RNG seed for reproducible runs. Absent means seed from entropy.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

fn default_content_dir() -> String {
    "content".to_string()
}

fn default_maps_dir() -> String {
    "maps".to_string()
}

fn default_starting_map() -> String {
    "home_village".to_string()
}

fn default_encounter_rate_modifier() -> f32 {
    1.0
}

fn default_secs_per_hour() -> f32 {
    60.0
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            maps_dir: default_maps_dir(),
            starting_map: default_starting_map(),
            encounter_rate_modifier: default_encounter_rate_modifier(),
            secs_per_hour: default_secs_per_hour(),
            rng_seed: None,
        }
    }
}

/// Set when running without a window (tests, CI, servers).
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// Integer tile coordinates.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct TilePoint {
    pub x: i32,
    pub y: i32,
}

impl TilePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent tile one step in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Cardinal facing of a character, in tile space. Up is -y.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    /// Facing that makes a character at `from` look at `to`. Favors the
    /// axis with the larger distance; ties go to the vertical axis.
    pub fn towards(from: TilePoint, to: TilePoint) -> Self {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx.abs() > dy.abs() {
            if dx > 0 {
                Self::Right
            } else {
                Self::Left
            }
        } else if dy > 0 {
            Self::Down
        } else {
            Self::Up
        }
    }
}

/// Player input after device mapping. The state stack sees these first;
/// whatever the top state does not consume falls through to the event
/// engine's interact handling.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputEvent {
    Confirm,
    Cancel,
    Interact,
    Move(Direction),
}

/// The one RNG used for gameplay rolls. Seedable so that headless runs
/// can be replayed.
#[derive(Resource)]
pub struct GameRng(pub SmallRng);

impl GameRng {
    pub fn from_config(config: &GameConfig) -> Self {
        match config.rng_seed {
            Some(seed) => Self(SmallRng::seed_from_u64(seed)),
            None => Self(SmallRng::from_entropy()),
        }
    }

    /// Uniform roll in [0, 100).
    pub fn percent(&mut self) -> f32 {
        self.0.gen::<f32>() * 100.0
    }

    /// Uniform float in [0, 1).
    pub fn float(&mut self) -> f32 {
        self.0.gen()
    }

    /// Inclusive integer roll, used by the capture shake check.
    pub fn uint_inclusive(&mut self, max: u32) -> u32 {
        self.0.gen_range(0..=max)
    }

    pub fn range_u32(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        self.0.gen_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_towards_prefers_larger_axis() {
        let from = TilePoint::new(0, 0);
        assert_eq!(Direction::towards(from, TilePoint::new(3, 1)), Direction::Right);
        assert_eq!(Direction::towards(from, TilePoint::new(-1, 4)), Direction::Down);
        assert_eq!(Direction::towards(from, TilePoint::new(1, -2)), Direction::Up);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let config = GameConfig {
            rng_seed: Some(99),
            ..GameConfig::default()
        };
        let mut a = GameRng::from_config(&config);
        let mut b = GameRng::from_config(&config);
        for _ in 0..8 {
            assert_eq!(a.uint_inclusive(65536), b.uint_inclusive(65536));
        }
    }
}
