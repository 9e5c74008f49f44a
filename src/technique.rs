//! The technique effect pipeline. A technique's record lists effect names;
//! using the technique walks that list in order, each effect reading the
//! formula layer and mutating the combatants.

use bevy::prelude::*;

use crate::components::GameRng;
use crate::db::TechniqueRecord;
use crate::formula::{self, ElementCache};
use crate::monster::Monster;

/// What one technique use did, for the combat log and the UI.
#[derive(Clone, Debug, Default)]
pub struct TechniqueResult {
    pub hit: bool,
    pub damage: u32,
    pub element_multiplier: f32,
    pub healing: u32,
    pub statuses_applied: Vec<String>,
}

/// Daylight window for the photogenesis effect: heals from dawn to dusk,
/// strongest at noon.
const PHOTOGENESIS_START: f64 = 6.0;
const PHOTOGENESIS_PEAK: f64 = 12.0;
const PHOTOGENESIS_END: f64 = 18.0;
const PHOTOGENESIS_MAX: f64 = 1.5;

/// Apply `technique` from `user` to `target`. The accuracy roll happens
/// once up front; a miss skips the whole effect list. `hour` is the game
/// clock hour, consumed by time-of-day effects.
pub fn apply_technique(
    technique: &TechniqueRecord,
    user: &mut Monster,
    target: &mut Monster,
    cache: &mut ElementCache,
    rng: &mut GameRng,
    hour: f64,
) -> TechniqueResult {
    let mut result = TechniqueResult {
        hit: technique.accuracy >= rng.float(),
        ..Default::default()
    };
    if !result.hit {
        return result;
    }

    for effect in &technique.effects {
        match effect.as_str() {
            "damage" => {
                let (damage, multiplier) =
                    formula::cached_damage_calculate(technique, user, target, cache);
                target.take_damage(damage);
                result.damage += damage;
                result.element_multiplier = multiplier;
            }
            "poison" => {
                if technique.potency >= rng.float() {
                    target.apply_status("poison");
                    result.statuses_applied.push("poison".to_string());
                }
            }
            "recover" => {
                let heal = formula::simple_recover(user);
                user.heal(heal);
                result.healing += heal;
            }
            "photogenesis" => {
                let multiplier = formula::calculate_time_based_multiplier(
                    hour,
                    PHOTOGENESIS_PEAK,
                    PHOTOGENESIS_MAX,
                    PHOTOGENESIS_START,
                    PHOTOGENESIS_END,
                );
                let heal = (formula::simple_recover(user) as f64 * multiplier) as u32;
                user.heal(heal);
                result.healing += heal;
            }
            "lifeleech" => {
                let leech = formula::simple_lifeleech(user, target);
                target.take_damage(leech);
                user.heal(leech);
                result.damage += leech;
                result.healing += leech;
            }
            "overfeed" => {
                let slow = formula::simple_overfeed(target);
                target.speed = target.speed.saturating_sub(slow);
                target.apply_status("overfed");
                result.statuses_applied.push("overfed".to_string());
            }
            other => {
                warn!(
                    "[Totem technique] Technique '{}' lists unknown effect '{}', skipping",
                    technique.slug, other
                );
            }
        }
    }
    result
}

/// End-of-turn status upkeep for one monster. Poison ticks an eighth of
/// full hp.
pub fn apply_status_upkeep(monster: &mut Monster) -> u32 {
    if monster.has_status("poison") {
        let tick = formula::simple_poison(monster);
        monster.take_damage(tick);
        tick
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{GameConfig, GameRng};
    use crate::db::test_content::small_db;

    fn seeded_rng() -> GameRng {
        GameRng::from_config(&GameConfig {
            rng_seed: Some(11),
            ..GameConfig::default()
        })
    }

    #[test]
    fn damage_effect_reduces_target_hp() {
        let db = small_db();
        let technique = db.technique("scratch").unwrap();
        let mut user = Monster::spawn(&db, "rootling", 5).unwrap();
        let mut target = Monster::spawn(&db, "cindertail", 5).unwrap();
        let before = target.current_hp;

        let mut cache = ElementCache::default();
        let mut rng = seeded_rng();
        let result = apply_technique(technique, &mut user, &mut target, &mut cache, &mut rng, 12.0);

        assert!(result.hit);
        assert!(result.damage > 0);
        assert_eq!(target.current_hp, before.saturating_sub(result.damage));
    }

    #[test]
    fn poison_status_ticks_an_eighth() {
        let db = small_db();
        let mut monster = Monster::spawn(&db, "rootling", 5).unwrap();
        monster.apply_status("poison");
        let tick = apply_status_upkeep(&mut monster);
        assert_eq!(tick, monster.hp / 8);
        assert_eq!(monster.current_hp, monster.hp - tick);
    }

    #[test]
    fn photogenesis_heals_in_daylight_only() {
        let db = small_db();
        let mut technique = db.technique("scratch").unwrap().clone();
        technique.range = "special".to_string();
        technique.effects = vec!["photogenesis".to_string()];
        let mut cache = ElementCache::default();
        let mut rng = seeded_rng();

        let mut user = Monster::spawn(&db, "rootling", 5).unwrap();
        let mut target = Monster::spawn(&db, "cindertail", 5).unwrap();
        user.take_damage(20);

        let noon = apply_technique(&technique, &mut user, &mut target, &mut cache, &mut rng, 12.0);
        assert!(noon.healing > 0);

        let mut user = Monster::spawn(&db, "rootling", 5).unwrap();
        user.take_damage(20);
        let midnight =
            apply_technique(&technique, &mut user, &mut target, &mut cache, &mut rng, 0.0);
        assert_eq!(midnight.healing, 0);
    }

    #[test]
    fn hopeless_accuracy_always_misses() {
        let db = small_db();
        let mut technique = db.technique("scratch").unwrap().clone();
        technique.accuracy = -1.0;
        let mut user = Monster::spawn(&db, "rootling", 5).unwrap();
        let mut target = Monster::spawn(&db, "cindertail", 5).unwrap();
        let mut cache = ElementCache::default();
        let mut rng = seeded_rng();
        let result = apply_technique(&technique, &mut user, &mut target, &mut cache, &mut rng, 12.0);
        assert!(!result.hit);
        assert_eq!(target.current_hp, target.hp);
    }
}
