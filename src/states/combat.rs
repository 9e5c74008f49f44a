//! The battle driver. One wild (or NPC-owned) monster against the
//! player's party, resolved turn by turn through the formula layer.
//! Confirm attacks with the active monster's first ready move; Cancel
//! throws a capture device if the player holds one. The state pops itself
//! on faint, capture or an empty party.

use std::any::Any;

use bevy::prelude::*;

use crate::components::InputEvent;
use crate::formula::ElementCache;
use crate::item;
use crate::monster::Monster;
use crate::states::{GameState, StateContext, StateSink};
use crate::technique;

const CAPTURE_DEVICE_SLUG: &str = "capture_device";
const PARTY_LIMIT: usize = 6;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CombatPhase {
    Fighting,
    Finished,
}

pub struct CombatState {
    wild: Monster,
    active_slot: usize,
    cache: ElementCache,
    phase: CombatPhase,
    turn: u32,
}

impl CombatState {
    pub fn new(wild: Monster) -> Self {
        Self {
            wild,
            active_slot: 0,
            cache: ElementCache::default(),
            phase: CombatPhase::Fighting,
            turn: 0,
        }
    }

    fn finish(&mut self, outcome: &str, ctx: &mut StateContext, sink: &mut StateSink) {
        self.phase = CombatPhase::Finished;
        for monster in &mut ctx.session.player.party {
            monster.end_combat();
        }
        ctx.bus.emit(
            "combat_finished",
            serde_json::json!({ "outcome": outcome, "turns": self.turn }),
            None,
        );
        sink.pop();
    }

    /// Pick the first party slot that can still fight.
    fn next_conscious_slot(party: &[Monster]) -> Option<usize> {
        party.iter().position(|m| !m.is_fainted())
    }

    fn player_attack(&mut self, ctx: &mut StateContext) {
        let Some(active) = ctx.session.player.party.get_mut(self.active_slot) else {
            return;
        };
        let Some(slot) = active.moves.iter().position(|m| m.is_ready()) else {
            // Everything recharging: the turn is spent waiting.
            return;
        };
        let slug = active.moves[slot].slug.clone();
        let record = match ctx.db.technique(&slug) {
            Ok(record) => record.clone(),
            Err(err) => {
                error!("[Totem combat] {}", err);
                return;
            }
        };
        let result = technique::apply_technique(
            &record,
            active,
            &mut self.wild,
            &mut self.cache,
            ctx.rng,
            ctx.clock.hour(),
        );
        active.moves[slot].mark_used(record.recharge_length);
        ctx.bus.emit(
            "combat_technique",
            serde_json::json!({
                "user": active.slug,
                "technique": slug,
                "hit": result.hit,
                "damage": result.damage,
                "element_multiplier": result.element_multiplier,
                "healing": result.healing,
                "statuses": result.statuses_applied,
            }),
            None,
        );
    }

    fn wild_attack(&mut self, ctx: &mut StateContext) {
        let Some(active) = ctx.session.player.party.get_mut(self.active_slot) else {
            return;
        };
        let Some(slot) = self.wild.moves.iter().position(|m| m.is_ready()) else {
            return;
        };
        let slug = self.wild.moves[slot].slug.clone();
        let record = match ctx.db.technique(&slug) {
            Ok(record) => record.clone(),
            Err(err) => {
                error!("[Totem combat] {}", err);
                return;
            }
        };
        let result = technique::apply_technique(
            &record,
            &mut self.wild,
            active,
            &mut self.cache,
            ctx.rng,
            ctx.clock.hour(),
        );
        self.wild.moves[slot].mark_used(record.recharge_length);
        ctx.bus.emit(
            "combat_technique",
            serde_json::json!({
                "user": self.wild.slug,
                "technique": slug,
                "hit": result.hit,
                "damage": result.damage,
                "element_multiplier": result.element_multiplier,
                "healing": result.healing,
                "statuses": result.statuses_applied,
            }),
            None,
        );
    }

    fn end_of_turn(&mut self, ctx: &mut StateContext, sink: &mut StateSink) {
        self.turn += 1;
        technique::apply_status_upkeep(&mut self.wild);
        if let Some(active) = ctx.session.player.party.get_mut(self.active_slot) {
            technique::apply_status_upkeep(active);
            for technique in &mut active.moves {
                technique.recharge();
            }
        }
        for technique in &mut self.wild.moves {
            technique.recharge();
        }

        if self.wild.is_fainted() {
            self.finish("won", ctx, sink);
            return;
        }
        let active_fainted = ctx
            .session
            .player
            .party
            .get(self.active_slot)
            .map(|m| m.is_fainted())
            .unwrap_or(true);
        if active_fainted {
            match Self::next_conscious_slot(&ctx.session.player.party) {
                Some(slot) => self.active_slot = slot,
                None => self.finish("lost", ctx, sink),
            }
        }
    }

    fn attempt_capture(&mut self, ctx: &mut StateContext, sink: &mut StateSink) {
        if !ctx.session.player.take_item(CAPTURE_DEVICE_SLUG, 1) {
            return;
        }
        let record = match ctx.db.item(CAPTURE_DEVICE_SLUG) {
            Ok(record) => record.clone(),
            Err(err) => {
                error!("[Totem combat] {}", err);
                return;
            }
        };
        let result = item::apply_item(&record, &mut self.wild, ctx.rng);
        let outcome = result.capture.unwrap_or(crate::formula::CaptureOutcome {
            success: false,
            num_shakes: 0,
        });
        ctx.bus.emit(
            "capture_attempt",
            serde_json::json!({
                "monster": self.wild.slug,
                "success": outcome.success,
                "num_shakes": outcome.num_shakes,
            }),
            None,
        );
        if outcome.success {
            let mut caught = self.wild.clone();
            caught.end_combat();
            if ctx.session.player.party.len() < PARTY_LIMIT {
                ctx.session.player.party.push(caught);
            } else {
                // Party full: the monster is released. A storage box is a
                // presentation concern, not the engine's.
                info!("[Totem combat] Party full, released '{}'", self.wild.slug);
            }
            self.finish("captured", ctx, sink);
        } else {
            // The wild monster gets a free turn while the device fails.
            self.wild_attack(ctx);
            self.end_of_turn(ctx, sink);
        }
    }
}

impl GameState for CombatState {
    fn name(&self) -> &'static str {
        "CombatState"
    }

    fn update(&mut self, _dt: f32, ctx: &mut StateContext, sink: &mut StateSink) {
        if self.phase == CombatPhase::Fighting && ctx.session.player.party.is_empty() {
            // Battles cannot run against an empty party.
            self.finish("aborted", ctx, sink);
        }
    }

    fn process_event(
        &mut self,
        input: InputEvent,
        ctx: &mut StateContext,
        sink: &mut StateSink,
    ) -> Option<InputEvent> {
        if self.phase != CombatPhase::Fighting {
            return None;
        }
        match input {
            InputEvent::Confirm => {
                self.player_attack(ctx);
                if !self.wild.is_fainted() {
                    self.wild_attack(ctx);
                }
                self.end_of_turn(ctx, sink);
            }
            InputEvent::Cancel => {
                self.attempt_capture(ctx, sink);
            }
            _ => {}
        }
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
