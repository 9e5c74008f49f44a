//! Deterministic battle math: elemental multipliers, damage, capture
//! shakes, healing helpers and the time-of-day effect window.
//!
//! Everything here is a pure function of its inputs, apart from
//! [`ElementCache`], a small memo table for per-pair elemental lookups.
//! Capture odds and the four-shake loop are a player-facing balance
//! contract; do not change iteration counts or comparison directions.

use bevy::prelude::*;

use std::collections::HashMap;

use crate::components::GameRng;
use crate::db::TechniqueRecord;
use crate::monster::Monster;

/// Level coefficient shared by stat growth and damage strength.
pub const COEFF_DAMAGE: u32 = 7;

/// How one element takes damage. An incoming attack of the `extra_damage`
/// element doubles, of the `resist_damage` element halves.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeChart {
    pub extra_damage: Option<&'static str>,
    pub resist_damage: Option<&'static str>,
}

/// The five-element wheel. `aether` and `normal` sit outside it and never
/// modify damage.
pub fn type_chart(element: &str) -> TypeChart {
    match element {
        "wood" => TypeChart {
            extra_damage: Some("metal"),
            resist_damage: Some("water"),
        },
        "fire" => TypeChart {
            extra_damage: Some("water"),
            resist_damage: Some("wood"),
        },
        "earth" => TypeChart {
            extra_damage: Some("wood"),
            resist_damage: Some("fire"),
        },
        "metal" => TypeChart {
            extra_damage: Some("fire"),
            resist_damage: Some("earth"),
        },
        "water" => TypeChart {
            extra_damage: Some("earth"),
            resist_damage: Some("metal"),
        },
        _ => TypeChart::default(),
    }
}

/// Multiplier contributed by a single (attack element, defend element)
/// pair: 2.0 on a weakness, 0.5 on a resistance, otherwise 1.0.
pub fn pair_multiplier(attack: &str, defend: &str) -> f32 {
    let body = type_chart(defend);
    match body.extra_damage {
        None => 1.0,
        Some(extra) if attack == extra => 2.0,
        _ => match body.resist_damage {
            Some(resist) if attack == resist => 0.5,
            _ => 1.0,
        },
    }
}

/// Memoized per-pair elemental lookups, keyed by (attack, defend). Battles
/// hit the same handful of pairs every turn.
#[derive(Default)]
pub struct ElementCache {
    pairs: HashMap<(String, String), f32>,
}

impl ElementCache {
    pub fn pair(&mut self, attack: &str, defend: &str) -> f32 {
        if let Some(cached) = self.pairs.get(&(attack.to_string(), defend.to_string())) {
            return *cached;
        }
        let value = pair_multiplier(attack, defend);
        self.pairs
            .insert((attack.to_string(), defend.to_string()), value);
        value
    }

    pub fn damage_multiplier(&mut self, attack_types: &[String], target_types: &[String]) -> f32 {
        let mut multiplier = 1.0;
        for attack in attack_types {
            if attack == "aether" {
                continue;
            }
            for target in target_types {
                if target == "aether" {
                    continue;
                }
                multiplier *= self.pair(attack, target);
            }
        }
        multiplier.clamp(0.25, 4.0)
    }
}

/// Product of per-pair multipliers over every (attack, target) type pair,
/// clamped to [0.25, 4.0]. The neutral `aether` element contributes no
/// multiplier on either side.
pub fn simple_damage_multiplier(attack_types: &[String], target_types: &[String]) -> f32 {
    let mut multiplier = 1.0;
    for attack in attack_types {
        if attack == "aether" {
            continue;
        }
        for target in target_types {
            if target == "aether" {
                continue;
            }
            multiplier *= pair_multiplier(attack, target);
        }
    }
    multiplier.clamp(0.25, 4.0)
}

/// Pick `(user strength, target resistance)` for a technique's range
/// category. `None` means a `special` technique that deals no formula
/// damage. Any other unknown range means corrupt shipped content and
/// panics; it is not a recoverable runtime condition.
fn select_stats(technique: &TechniqueRecord, user: &Monster, target: &Monster) -> Option<(u32, u32)> {
    match technique.range.as_str() {
        "melee" => Some((user.melee * (COEFF_DAMAGE + user.level), target.armour)),
        "touch" => Some((user.melee * (COEFF_DAMAGE + user.level), target.dodge)),
        "ranged" => Some((user.ranged * (COEFF_DAMAGE + user.level), target.dodge)),
        "reach" => Some((user.ranged * (COEFF_DAMAGE + user.level), target.armour)),
        "reliable" => Some((COEFF_DAMAGE + user.level, 1)),
        "special" => {
            warn!(
                "[Totem formula] Technique '{}' has range 'special', dealing no damage",
                technique.slug
            );
            None
        }
        other => {
            error!(
                "[Totem formula] Technique '{}' has undefined range '{}'",
                technique.slug, other
            );
            panic!("undefined technique range '{}': corrupt content", other);
        }
    }
}

fn damage_from(user_strength: u32, target_resist: u32, power: f32, multiplier: f32) -> u32 {
    let move_strength = power * multiplier;
    (user_strength as f32 * move_strength / target_resist.max(1) as f32) as u32
}

/// Damage of one technique use: `(damage, elemental multiplier)`.
pub fn simple_damage_calculate(
    technique: &TechniqueRecord,
    user: &Monster,
    target: &Monster,
) -> (u32, f32) {
    let Some((user_strength, target_resist)) = select_stats(technique, user, target) else {
        return (0, 0.0);
    };
    let multiplier = simple_damage_multiplier(&technique.types, &target.types);
    (
        damage_from(user_strength, target_resist, technique.power, multiplier),
        multiplier,
    )
}

/// [`simple_damage_calculate`] with the per-pair lookups memoized; the
/// combat loop hits the same element pairs every turn.
pub fn cached_damage_calculate(
    technique: &TechniqueRecord,
    user: &Monster,
    target: &Monster,
    cache: &mut ElementCache,
) -> (u32, f32) {
    let Some((user_strength, target_resist)) = select_stats(technique, user, target) else {
        return (0, 0.0);
    };
    let multiplier = cache.damage_multiplier(&technique.types, &target.types);
    (
        damage_from(user_strength, target_resist, technique.power, multiplier),
        multiplier,
    )
}

/// Poison tick: an eighth of the target's full hp.
pub fn simple_poison(target: &Monster) -> u32 {
    target.hp / 8
}

/// Recover tick: a sixteenth of full hp, capped at the missing amount.
pub fn simple_recover(target: &Monster) -> u32 {
    (target.hp / 16).min(target.hp - target.current_hp)
}

/// Life leech: bounded by half the target's full hp, what the target has
/// left, and what the user is missing.
pub fn simple_lifeleech(user: &Monster, target: &Monster) -> u32 {
    (target.hp / 2)
        .min(target.current_hp)
        .min(user.hp - user.current_hp)
}

/// Overfeed slow: half the target's speed.
pub fn simple_overfeed(target: &Monster) -> u32 {
    target.speed / 2
}

/// Per-shake survival threshold for a capture attempt.
///
/// `catch_check = (3*hp - 2*current_hp) * catch_rate * status * ball / (3*hp)`
/// transformed through the root curve `65536 / (255 / catch_check)^0.1875`.
/// A shake roll above the (rounded) threshold breaks the monster free.
pub fn shake_check(target: &Monster, status_modifier: f32, ball_modifier: f32) -> f32 {
    let max_hp = target.hp as f32;
    let catch_check = (3.0 * max_hp - 2.0 * target.current_hp as f32)
        * target.catch_rate
        * status_modifier
        * ball_modifier
        / (3.0 * max_hp);
    65536.0 / (255.0 / catch_check).powf(0.1875)
}

/// Outcome of one capture attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub success: bool,
    /// Shakes the device made before the monster escaped, 4 on success.
    pub num_shakes: u32,
}

/// Run the four-shake capture loop. Exactly four independent trials; each
/// roll of `0..=65536` strictly above the threshold is an escape, and
/// capture succeeds only if no trial escapes.
pub fn capture(
    target: &Monster,
    status_modifier: f32,
    ball_modifier: f32,
    rng: &mut GameRng,
) -> CaptureOutcome {
    let threshold = shake_check(target, status_modifier, ball_modifier).round();
    for shake in 0..4u32 {
        let roll = rng.uint_inclusive(65536);
        if roll as f32 > threshold {
            return CaptureOutcome {
                success: false,
                num_shakes: shake + 1,
            };
        }
    }
    CaptureOutcome {
        success: true,
        num_shakes: 4,
    }
}

/// Status modifier for capture: held statuses make a monster easier to
/// catch.
pub fn capture_status_modifier(target: &Monster) -> f32 {
    if target.statuses.is_empty() {
        1.0
    } else {
        1.5
    }
}

/// Effect strength for a time-of-day window: 0 outside `[start, end)`,
/// `max_multiplier` at `peak_hour`, falling off quadratically toward the
/// window edges. Windows may wrap past midnight (`end < start`).
pub fn calculate_time_based_multiplier(
    hour: f64,
    peak_hour: f64,
    max_multiplier: f64,
    start: f64,
    end: f64,
) -> f64 {
    let mut hour = hour;
    let mut peak = peak_hour;
    let mut end = end;
    if end < start {
        end += 24.0;
        if hour < start {
            hour += 24.0;
        }
        if peak < start {
            peak += 24.0;
        }
    }
    if hour < start || hour >= end {
        return 0.0;
    }
    let half_width = (end - start) / 2.0;
    if half_width <= 0.0 {
        return 0.0;
    }
    let distance = (hour - peak).abs();
    let falloff = 1.0 - (distance / half_width).powi(2);
    (max_multiplier * falloff).max(0.0)
}
