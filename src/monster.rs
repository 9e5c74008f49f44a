//! Battle participants: monsters, their owned move instances, and status
//! bookkeeping. Stats derive from the content record's base values and the
//! monster's level; the formula layer consumes them read-only, technique
//! and item effects mutate `current_hp` and the status list.

use crate::db::{ContentDb, DbError, MonsterRecord};

pub const MAX_LEVEL: u32 = 999;

/// Base stat block copied from the content record so levelling up does not
/// need database access.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct BaseStats {
    pub hp: u32,
    pub melee: u32,
    pub ranged: u32,
    pub dodge: u32,
    pub armour: u32,
    pub speed: u32,
}

/// Stat growth shared by every stat: base value times (level + 7).
fn scaled(base: u32, level: u32) -> u32 {
    base * (level + 7)
}

/// A monster's owned copy of a technique. The slug points at the immutable
/// template in the content database; the counters here are per-instance.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MoveInstance {
    pub slug: String,
    /// Uses in the current battle.
    #[serde(default)]
    pub combat_counter: u32,
    /// Uses over the monster's lifetime.
    #[serde(default)]
    pub life_counter: u32,
    /// Turns until the move can be used again.
    #[serde(default)]
    pub next_use: u32,
}

impl MoveInstance {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            combat_counter: 0,
            life_counter: 0,
            next_use: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.next_use == 0
    }

    pub fn mark_used(&mut self, recharge_length: u32) {
        self.combat_counter += 1;
        self.life_counter += 1;
        self.next_use = recharge_length;
    }

    pub fn recharge(&mut self) {
        self.next_use = self.next_use.saturating_sub(1);
    }

    pub fn full_recharge(&mut self) {
        self.next_use = 0;
    }

    pub fn reset_combat_counter(&mut self) {
        self.combat_counter = 0;
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Monster {
    pub slug: String,
    pub name: String,
    pub level: u32,
    pub types: Vec<String>,
    pub catch_rate: f32,
    bases: BaseStats,

    pub hp: u32,
    pub current_hp: u32,
    pub melee: u32,
    pub ranged: u32,
    pub dodge: u32,
    pub armour: u32,
    pub speed: u32,

    pub statuses: Vec<String>,
    pub moves: Vec<MoveInstance>,
}

impl Monster {
    /// Instantiate a monster of the given level from its content record.
    /// Moves are whatever the moveset grants at or below that level, most
    /// recently learned first, capped at four.
    pub fn from_record(record: &MonsterRecord, level: u32) -> Self {
        let level = level.clamp(1, MAX_LEVEL);
        let mut moves: Vec<MoveInstance> = record
            .moveset
            .iter()
            .filter(|entry| entry.level_learned <= level)
            .map(|entry| MoveInstance::new(entry.technique.clone()))
            .collect();
        moves.reverse();
        moves.truncate(4);

        let bases = BaseStats {
            hp: record.base_hp,
            melee: record.base_melee,
            ranged: record.base_ranged,
            dodge: record.base_dodge,
            armour: record.base_armour,
            speed: record.base_speed,
        };
        let mut monster = Self {
            slug: record.slug.clone(),
            name: record.name.clone(),
            level,
            types: record.types.clone(),
            catch_rate: record.catch_rate,
            bases,
            hp: 0,
            current_hp: 0,
            melee: 0,
            ranged: 0,
            dodge: 0,
            armour: 0,
            speed: 0,
            statuses: Vec::new(),
            moves,
        };
        monster.set_stats();
        monster.current_hp = monster.hp;
        monster
    }

    pub fn spawn(db: &ContentDb, slug: &str, level: u32) -> Result<Self, DbError> {
        Ok(Self::from_record(db.monster(slug)?, level))
    }

    fn set_stats(&mut self) {
        self.hp = scaled(self.bases.hp, self.level);
        self.melee = scaled(self.bases.melee, self.level);
        self.ranged = scaled(self.bases.ranged, self.level);
        self.dodge = scaled(self.bases.dodge, self.level);
        self.armour = scaled(self.bases.armour, self.level);
        self.speed = scaled(self.bases.speed, self.level);
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    /// Set an arbitrary level and recompute stats, preserving the amount of
    /// missing hp rather than the percentage.
    pub fn set_level(&mut self, level: u32) {
        let missing = self.hp.saturating_sub(self.current_hp);
        self.level = level.clamp(1, MAX_LEVEL);
        self.set_stats();
        self.current_hp = self.hp.saturating_sub(missing);
    }

    pub fn heal(&mut self, amount: u32) {
        self.current_hp = (self.current_hp + amount).min(self.hp);
    }

    pub fn take_damage(&mut self, amount: u32) {
        self.current_hp = self.current_hp.saturating_sub(amount);
    }

    pub fn has_status(&self, slug: &str) -> bool {
        self.statuses.iter().any(|s| s == slug)
    }

    pub fn apply_status(&mut self, slug: impl Into<String>) {
        let slug = slug.into();
        if !self.has_status(&slug) {
            self.statuses.push(slug);
        }
    }

    pub fn clear_statuses(&mut self) {
        self.statuses.clear();
    }

    /// Per-battle cleanup once combat ends.
    pub fn end_combat(&mut self) {
        for technique in &mut self.moves {
            technique.reset_combat_counter();
            technique.full_recharge();
        }
    }
}
