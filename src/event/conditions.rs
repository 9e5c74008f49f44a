//! The standard condition set. Each predicate reads world state through
//! the context; the only writes are to the per-predicate persist map used
//! for edge triggering.

use bevy::prelude::*;

use crate::components::{Direction, TilePoint};
use crate::event::{condition_params, ConditionPersist, EventCondition, EventContext, Registries};
use crate::map::MapCondition;
use crate::script::schema::{opt, req, ParamKind, ParamSpec};

pub fn register_all(registries: &mut Registries) {
    registries.register_condition("variable_is", VARIABLE_IS, Box::new(VariableIs));
    registries.register_condition("party_size", PARTY_SIZE, Box::new(PartySize));
    registries.register_condition("player_moved", &[], Box::new(PlayerMoved));
    registries.register_condition("player_at", &[], Box::new(PlayerAt));
    registries.register_condition("player_facing_tile", &[], Box::new(PlayerFacingTile));
    registries.register_condition("player_facing_npc", FACING_NPC, Box::new(PlayerFacingNpc));
    registries.register_condition("to_talk", FACING_NPC, Box::new(PlayerFacingNpc));
    registries.register_condition("npc_facing", NPC_FACING, Box::new(NpcFacing));
    registries.register_condition("has_item", HAS_ITEM, Box::new(HasItem));
    registries.register_condition("money_is", MONEY_IS, Box::new(MoneyIs));
    registries.register_condition("music_playing", MUSIC_PLAYING, Box::new(MusicPlaying));
}

const VARIABLE_IS: &[ParamSpec] = &[
    req("value1", ParamKind::Str),
    req("operation", ParamKind::Str),
    req("value2", ParamKind::Str),
];

const PARTY_SIZE: &[ParamSpec] = &[req("operator", ParamKind::Str), req("value", ParamKind::Int)];

const FACING_NPC: &[ParamSpec] = &[req("npc_slug", ParamKind::Str)];

const NPC_FACING: &[ParamSpec] = &[
    req("npc_slug", ParamKind::Str),
    req("direction", ParamKind::Direction),
];

const HAS_ITEM: &[ParamSpec] = &[
    req("item_slug", ParamKind::Str),
    opt("quantity", ParamKind::Int),
];

const MONEY_IS: &[ParamSpec] = &[req("operator", ParamKind::Str), req("amount", ParamKind::Int)];

const MUSIC_PLAYING: &[ParamSpec] = &[req("track", ParamKind::Str)];

/// Resolve a script operand that is either a number literal or the name
/// of a numeric game variable.
fn number_or_variable(ctx: &EventContext, operand: &str) -> Option<f64> {
    if let Ok(number) = operand.parse::<f64>() {
        return Some(number);
    }
    match ctx.session.get_variable(operand).and_then(|v| v.as_number()) {
        Some(number) => Some(number),
        None => {
            warn!(
                "[Totem condition] '{}' is neither a number nor a numeric variable",
                operand
            );
            None
        }
    }
}

/// `variable_is <value1>,<operation>,<value2>` with numeric comparison.
struct VariableIs;

impl EventCondition for VariableIs {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        let Some(params) = condition_params(VARIABLE_IS, condition) else {
            return false;
        };
        let (Some(left), Some(right)) = (
            number_or_variable(ctx, &params.string(0)),
            number_or_variable(ctx, &params.string(2)),
        ) else {
            return false;
        };
        match params.string(1).as_str() {
            "==" => left == right,
            "!=" => left != right,
            ">" => left > right,
            ">=" => left >= right,
            "<" => left < right,
            "<=" => left <= right,
            other => {
                error!("[Totem condition] variable_is: invalid operation '{}'", other);
                false
            }
        }
    }
}

/// `party_size <operator>,<value>` over the player's party.
struct PartySize;

impl EventCondition for PartySize {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        let Some(params) = condition_params(PARTY_SIZE, condition) else {
            return false;
        };
        let size = ctx.session.player.party.len() as i64;
        let value = params.int(1);
        match params.string(0).as_str() {
            "equals" => size == value,
            "less_than" => size < value,
            "greater_than" => size > value,
            other => {
                error!("[Totem condition] party_size: invalid operator '{}'", other);
                false
            }
        }
    }
}

/// Edge-triggered "the player just moved into this tile".
///
/// True only on the frame the player's movement destination settles in the
/// trigger rect after having been elsewhere; while the player stands still
/// inside it the predicate stays false, so walk-on triggers fire once per
/// entry instead of every frame.
struct PlayerMoved;

impl EventCondition for PlayerMoved {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        persist: &mut ConditionPersist,
    ) -> bool {
        let player = &ctx.session.player;
        let destination = player.move_destination;
        let key = condition.identity();

        let last: Option<TilePoint> = persist
            .get(&key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .flatten();

        let stopped = destination.is_none();
        let collide_next = destination.map_or(false, |d| condition.rect.contains(d));

        // Seed the memory the first time the player is near this trigger.
        if last.is_none() && (stopped || collide_next) {
            persist.insert(key.clone(), serde_json::json!(destination));
        }

        let moved = destination != last;
        let collided = condition.rect.contains(player.tile_pos);

        persist.insert(key.clone(), serde_json::json!(destination));

        if collided && moved && last.is_some() {
            persist.insert(key, serde_json::Value::Null);
            true
        } else {
            false
        }
    }
}

/// Level-triggered "the player is inside this rect".
struct PlayerAt;

impl EventCondition for PlayerAt {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        condition.rect.contains(ctx.session.player.tile_pos)
    }
}

/// The tile the player is facing lies inside the event rect.
struct PlayerFacingTile;

impl EventCondition for PlayerFacingTile {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        condition.rect.contains(ctx.session.player.facing_tile())
    }
}

/// The player stands adjacent to the named NPC, facing it. A missing NPC
/// is a runtime precondition failure: logged, and the predicate is false.
struct PlayerFacingNpc;

impl EventCondition for PlayerFacingNpc {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        let Some(params) = condition_params(FACING_NPC, condition) else {
            return false;
        };
        let slug = params.string(0);
        match ctx.session.character(&slug) {
            Some(npc) => ctx.session.player.facing_tile() == npc.tile_pos,
            None => {
                warn!("[Totem condition] no character '{}' on this map", slug);
                false
            }
        }
    }
}

/// `npc_facing <npc>,<direction>`.
struct NpcFacing;

impl EventCondition for NpcFacing {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        let Some(params) = condition_params(NPC_FACING, condition) else {
            return false;
        };
        let slug = params.string(0);
        let direction: Direction = params.direction(1);
        match ctx.session.character(&slug) {
            Some(npc) => npc.facing == direction,
            None => {
                warn!("[Totem condition] no character '{}' on this map", slug);
                false
            }
        }
    }
}

/// `has_item <slug>[,quantity]`, quantity defaulting to one.
struct HasItem;

impl EventCondition for HasItem {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        let Some(params) = condition_params(HAS_ITEM, condition) else {
            return false;
        };
        let quantity = params.int_opt(1).unwrap_or(1).max(0) as u32;
        ctx.session.player.item_quantity(&params.string(0)) >= quantity
    }
}

/// `money_is <operator>,<amount>`.
struct MoneyIs;

impl EventCondition for MoneyIs {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        let Some(params) = condition_params(MONEY_IS, condition) else {
            return false;
        };
        let money = ctx.session.player.money;
        let amount = params.int(1);
        match params.string(0).as_str() {
            "equals" => money == amount,
            "less_than" => money < amount,
            "greater_than" => money > amount,
            other => {
                error!("[Totem condition] money_is: invalid operator '{}'", other);
                false
            }
        }
    }
}

/// `music_playing <track>`; the track name is free-form and never split.
struct MusicPlaying;

impl EventCondition for MusicPlaying {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        _persist: &mut ConditionPersist,
    ) -> bool {
        let Some(params) = condition_params(MUSIC_PLAYING, condition) else {
            return false;
        };
        ctx.audio.is_playing(&params.string(0))
    }
}
