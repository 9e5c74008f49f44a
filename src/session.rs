//! The mutable world tree: player, NPCs, game variables and the loaded
//! map, all behind one resource touched only from the main frame loop.
//! Also the save snapshot the persistence collaborator reads and writes.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::components::{Direction, TilePoint};
use crate::map::MapData;
use crate::monster::Monster;

/// A game-variable value. Scripts write strings or numbers; both round-trip
/// through the save snapshot unchanged.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum GameValue {
    Num(f64),
    Str(String),
}

impl GameValue {
    /// Parse a script literal: numeric if it looks numeric, else a string.
    pub fn parse(text: &str) -> Self {
        match text.parse::<f64>() {
            Ok(n) => Self::Num(n),
            Err(_) => Self::Str(text.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
        }
    }
}

impl std::fmt::Display for GameValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A character on the map. The player and every NPC share this shape; the
/// economy fields are simply unused for NPCs.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Character {
    pub slug: String,
    pub tile_pos: TilePoint,
    pub facing: Direction,
    /// Tile the character is currently walking toward, if any.
    pub move_destination: Option<TilePoint>,
    pub party: Vec<Monster>,
    pub money: i64,
    /// Item slug -> held quantity.
    pub inventory: HashMap<String, u32>,
}

impl Character {
    pub fn new(slug: impl Into<String>, tile_pos: TilePoint) -> Self {
        Self {
            slug: slug.into(),
            tile_pos,
            facing: Direction::Down,
            move_destination: None,
            party: Vec::new(),
            money: 0,
            inventory: HashMap::new(),
        }
    }

    /// Tile directly in front of the character.
    pub fn facing_tile(&self) -> TilePoint {
        self.tile_pos.step(self.facing)
    }

    pub fn cancel_movement(&mut self) {
        self.move_destination = None;
    }

    pub fn item_quantity(&self, slug: &str) -> u32 {
        self.inventory.get(slug).copied().unwrap_or(0)
    }

    pub fn give_item(&mut self, slug: impl Into<String>, quantity: u32) {
        *self.inventory.entry(slug.into()).or_insert(0) += quantity;
    }

    pub fn take_item(&mut self, slug: &str, quantity: u32) -> bool {
        match self.inventory.get_mut(slug) {
            Some(held) if *held >= quantity => {
                *held -= quantity;
                if *held == 0 {
                    self.inventory.remove(slug);
                }
                true
            }
            _ => false,
        }
    }
}

/// Teleport waiting for a screen transition to reach full opacity.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingTeleport {
    pub map_name: String,
    pub position: TilePoint,
}

#[derive(Resource, Default)]
pub struct Session {
    pub player: Character,
    pub npcs: HashMap<String, Character>,
    pub game_variables: HashMap<String, GameValue>,
    pub map: MapData,
    /// Set once the current map's `init` events have run.
    pub inits_done: bool,
    /// True while a screen transition owns the display; teleports started
    /// now are deferred to the transition apex.
    pub in_transition: bool,
    pub pending_teleport: Option<PendingTeleport>,
}

impl Default for Character {
    fn default() -> Self {
        Self::new("player", TilePoint::new(0, 0))
    }
}

impl Session {
    pub fn new(map: MapData, player_start: TilePoint) -> Self {
        Self {
            player: Character::new("player", player_start),
            map,
            ..Default::default()
        }
    }

    /// Look up a character by slug; `"player"` resolves to the player.
    pub fn character(&self, slug: &str) -> Option<&Character> {
        if slug == "player" {
            Some(&self.player)
        } else {
            self.npcs.get(slug)
        }
    }

    pub fn character_mut(&mut self, slug: &str) -> Option<&mut Character> {
        if slug == "player" {
            Some(&mut self.player)
        } else {
            self.npcs.get_mut(slug)
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<&GameValue> {
        self.game_variables.get(name)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: GameValue) {
        self.game_variables.insert(name.into(), value);
    }

    /// Swap in a new map. NPCs belong to maps, so the roster clears; the
    /// event engine is reset separately by the same system that calls
    /// this. `in_transition` is left alone: a fade-in may still be
    /// playing over the new map.
    pub fn change_map(&mut self, map: MapData, player_position: TilePoint) {
        self.map = map;
        self.inits_done = false;
        self.npcs.clear();
        self.player.tile_pos = player_position;
        self.player.cancel_movement();
        self.pending_teleport = None;
    }

    pub fn snapshot(&self) -> SaveData {
        SaveData {
            map_name: self.map.name.clone(),
            position: self.player.tile_pos,
            facing: self.player.facing,
            money: self.player.money,
            inventory: self.player.inventory.clone(),
            party: self.player.party.clone(),
            game_variables: self.game_variables.clone(),
        }
    }

    /// Restore player-owned state from a snapshot. The map itself is
    /// reloaded by the caller from `save.map_name`.
    pub fn restore(&mut self, save: SaveData) {
        self.player.tile_pos = save.position;
        self.player.facing = save.facing;
        self.player.money = save.money;
        self.player.inventory = save.inventory;
        self.player.party = save.party;
        self.game_variables = save.game_variables;
        self.player.cancel_movement();
    }
}

/// Serializable snapshot of everything the player owns. The save/load
/// collaborator serializes this however it likes; the engine only promises
/// that variables round-trip as strings or numbers.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SaveData {
    pub map_name: String,
    pub position: TilePoint,
    pub facing: Direction,
    pub money: i64,
    pub inventory: HashMap<String, u32>,
    pub party: Vec<Monster>,
    pub game_variables: HashMap<String, GameValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_values_round_trip_as_string_or_number() {
        let mut session = Session::default();
        session.set_variable("quest_stage", GameValue::Num(3.0));
        session.set_variable("rival_name", GameValue::parse("Maple"));
        session.set_variable("fine_owed", GameValue::parse("12.5"));

        let json = serde_json::to_string(&session.snapshot()).unwrap();
        let restored: SaveData = serde_json::from_str(&json).unwrap();

        assert_eq!(
            restored.game_variables.get("quest_stage"),
            Some(&GameValue::Num(3.0))
        );
        assert_eq!(
            restored.game_variables.get("rival_name"),
            Some(&GameValue::Str("Maple".to_string()))
        );
        assert_eq!(
            restored.game_variables.get("fine_owed"),
            Some(&GameValue::Num(12.5))
        );
    }

    #[test]
    fn snapshot_restore_round_trips_player_state() {
        let mut session = Session::default();
        session.player.tile_pos = TilePoint::new(8, 3);
        session.player.money = 250;
        session.player.give_item("potion", 2);

        let save = session.snapshot();
        let mut other = Session::default();
        other.restore(save);

        assert_eq!(other.player.tile_pos, TilePoint::new(8, 3));
        assert_eq!(other.player.money, 250);
        assert_eq!(other.player.item_quantity("potion"), 2);
    }

    #[test]
    fn change_map_clears_map_scoped_state() {
        let mut session = Session::default();
        session
            .npcs
            .insert("npc_maple".to_string(), Character::new("npc_maple", TilePoint::new(1, 1)));
        session.pending_teleport = Some(PendingTeleport {
            map_name: "cave".to_string(),
            position: TilePoint::new(0, 0),
        });
        session.inits_done = true;

        session.change_map(MapData::default(), TilePoint::new(5, 5));
        assert!(session.npcs.is_empty());
        assert!(session.pending_teleport.is_none());
        assert!(!session.inits_done);
        assert_eq!(session.player.tile_pos, TilePoint::new(5, 5));
    }
}
