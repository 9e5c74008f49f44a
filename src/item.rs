//! The item effect pipeline. Items share the effect-list shape with
//! techniques; the interesting one is `capture`, which runs the four-shake
//! check from the formula layer.

use bevy::prelude::*;

use crate::components::GameRng;
use crate::db::ItemRecord;
use crate::formula::{self, CaptureOutcome};
use crate::monster::Monster;

/// What one item use did.
#[derive(Clone, Debug, Default)]
pub struct ItemResult {
    pub success: bool,
    /// Present when the item attempted a capture.
    pub capture: Option<CaptureOutcome>,
}

/// Apply `item` to `target`. Effects run in record order; the overall
/// `success` is true if any effect did something.
pub fn apply_item(
    item: &ItemRecord,
    target: &mut Monster,
    rng: &mut GameRng,
) -> ItemResult {
    let mut result = ItemResult::default();
    for effect in &item.effects {
        match effect.as_str() {
            "heal" => {
                // No effect at full health; the caller keeps the item.
                if target.current_hp < target.hp {
                    target.heal(item.power as u32);
                    result.success = true;
                }
            }
            "cure" => {
                if !target.statuses.is_empty() {
                    target.clear_statuses();
                    result.success = true;
                }
            }
            "capture" => {
                let status_modifier = formula::capture_status_modifier(target);
                let outcome = formula::capture(target, status_modifier, item.ball_modifier, rng);
                result.success = outcome.success;
                result.capture = Some(outcome);
            }
            other => {
                warn!(
                    "[Totem item] Item '{}' lists unknown effect '{}', skipping",
                    item.slug, other
                );
            }
        }
    }
    result
}
