//! Wild-encounter table draws.
//!
//! The draw walks the table in order, accumulating scaled weights, and the
//! first entry whose cumulative sum reaches the roll wins. That is not a
//! canonical weighted choice — later entries absorb rounding of earlier
//! ones — but table order is a balance contract, so it stays.

use crate::components::GameRng;
use crate::db::EncounterEntry;
use crate::monster::{Monster, MAX_LEVEL};

/// Pure core of the draw so tests can pin the roll. `scale` is the product
/// of any `total_prob` rescale and the global difficulty modifier. Returns
/// `None` when the scaled weights never reach the roll: no encounter, by
/// design rather than by error.
pub fn pick_encounter<'a>(
    entries: &'a [EncounterEntry],
    scale: f32,
    roll: f32,
) -> Option<&'a EncounterEntry> {
    let mut total = 0.0;
    for entry in entries {
        total += entry.encounter_rate * scale;
        if total >= roll {
            return Some(entry);
        }
    }
    None
}

/// Roll U(0,100) against the table. When `total_prob` is given, every
/// weight is rescaled so the weights sum to it before the global
/// `encounter_rate_modifier` applies.
pub fn choose_encounter<'a>(
    entries: &'a [EncounterEntry],
    total_prob: Option<f32>,
    encounter_rate_modifier: f32,
    rng: &mut GameRng,
) -> Option<&'a EncounterEntry> {
    let roll = rng.percent();
    let mut scale = match total_prob {
        Some(total) => {
            let current: f32 = entries.iter().map(|e| e.encounter_rate).sum();
            if current <= 0.0 {
                return None;
            }
            total / current
        }
        None => 1.0,
    };
    scale *= encounter_rate_modifier;
    pick_encounter(entries, scale, roll)
}

/// Instantiate the rolled monster at a level drawn from its range.
pub fn spawn_encounter(
    entry: &EncounterEntry,
    record: &crate::db::MonsterRecord,
    rng: &mut GameRng,
) -> Monster {
    let level = match entry.level_range.as_slice() {
        [] => 1,
        [only] => *only,
        [min, max, ..] => rng.range_u32(*min, *max),
    };
    Monster::from_record(record, level.clamp(1, MAX_LEVEL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::GameConfig;

    fn entries() -> Vec<EncounterEntry> {
        vec![
            EncounterEntry {
                monster: "rootling".to_string(),
                encounter_rate: 3.0,
                level_range: vec![2, 4],
            },
            EncounterEntry {
                monster: "cindertail".to_string(),
                encounter_rate: 1.0,
                level_range: vec![3],
            },
        ]
    }

    #[test]
    fn first_interval_containing_the_roll_wins() {
        let table = entries();
        assert_eq!(pick_encounter(&table, 1.0, 0.0).unwrap().monster, "rootling");
        assert_eq!(pick_encounter(&table, 1.0, 3.0).unwrap().monster, "rootling");
        assert_eq!(pick_encounter(&table, 1.0, 3.5).unwrap().monster, "cindertail");
        assert_eq!(pick_encounter(&table, 1.0, 4.0).unwrap().monster, "cindertail");
    }

    #[test]
    fn missing_the_table_is_a_silent_no_op() {
        let table = entries();
        assert!(pick_encounter(&table, 1.0, 80.0).is_none());
    }

    #[test]
    fn total_prob_rescales_weights() {
        let table = entries();
        let mut rng = GameRng::from_config(&GameConfig {
            rng_seed: Some(1),
            ..GameConfig::default()
        });
        // Weights sum to 4; total_prob 100 rescales them 25x, so the table
        // covers the whole roll space and an encounter always happens.
        for _ in 0..200 {
            assert!(choose_encounter(&table, Some(100.0), 1.0, &mut rng).is_some());
        }
    }

    #[test]
    fn rate_modifier_scales_the_hit_chance() {
        let table = entries();
        // A zero modifier kills every interval.
        let mut rng = GameRng::from_config(&GameConfig {
            rng_seed: Some(2),
            ..GameConfig::default()
        });
        for _ in 0..50 {
            assert!(choose_encounter(&table, None, 0.0, &mut rng).is_none());
        }
    }

    #[test]
    fn spawn_uses_the_level_range() {
        let db = crate::db::test_content::small_db();
        let table = entries();
        let mut rng = GameRng::from_config(&GameConfig {
            rng_seed: Some(3),
            ..GameConfig::default()
        });
        for _ in 0..20 {
            let wild = spawn_encounter(&table[0], db.monster("rootling").unwrap(), &mut rng);
            assert!((2..=4).contains(&wild.level));
        }
        let fixed = spawn_encounter(&table[1], db.monster("cindertail").unwrap(), &mut rng);
        assert_eq!(fixed.level, 3);
    }
}
