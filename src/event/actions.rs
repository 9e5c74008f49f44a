//! The standard action set. Factories schema-check the raw map parameters
//! and hand the engine a typed, boxed action instance.

use bevy::prelude::*;

use crate::components::{Direction, TilePoint};
use crate::encounter;
use crate::event::{
    action_params, ActionStatus, EventAction, EventContext, Registries,
};
use crate::map::MapAction;
use crate::monster::Monster;
use crate::script::schema::{opt, req, ParamKind, ParamSpec};
use crate::script::ScriptError;
use crate::session::{Character, GameValue, PendingTeleport};
use crate::states::combat::CombatState;
use crate::states::dialog::DialogState;
use crate::states::transition::FadeTransitionState;

/// Sentinel that ends a dialog chain and waits for the box to close.
const CHAIN_END: &str = "${end}";

pub fn register_all(registries: &mut Registries) {
    registries.register_action("dialog", DIALOG, new_dialog);
    registries.register_action("translated_dialog", DIALOG, new_translated_dialog);
    registries.register_action("dialog_chain", DIALOG, new_dialog_chain);
    registries.register_action(
        "translated_dialog_chain",
        DIALOG,
        new_translated_dialog_chain,
    );
    registries.register_action("teleport", TELEPORT, new_teleport);
    registries.register_action("transition_teleport", TRANSITION_TELEPORT, new_transition_teleport);
    registries.register_action("screen_transition", SCREEN_TRANSITION, new_screen_transition);
    registries.register_action("wait", WAIT, new_wait);
    registries.register_action("wait_for_secs", WAIT, new_wait);
    registries.register_action("random_encounter", RANDOM_ENCOUNTER, new_random_encounter);
    registries.register_action("start_battle", START_BATTLE, new_start_battle);
    registries.register_action("set_monster_health", SET_MONSTER_HEALTH, new_set_monster_health);
    registries.register_action("set_monster_level", SET_MONSTER_LEVEL, new_set_monster_level);
    registries.register_action("set_monster_status", SET_MONSTER_STATUS, new_set_monster_status);
    registries.register_action("set_variable", SET_VARIABLE, new_set_variable);
    registries.register_action("create_npc", CREATE_NPC, new_create_npc);
    registries.register_action("npc_face", NPC_FACE, new_npc_face);
    registries.register_action("add_monster", ADD_MONSTER, new_add_monster);
    registries.register_action("play_music", PLAY_MUSIC, new_play_music);
}

const DIALOG: &[ParamSpec] = &[req("text", ParamKind::Str)];
const TELEPORT: &[ParamSpec] = &[
    req("map_name", ParamKind::Str),
    req("x", ParamKind::Int),
    req("y", ParamKind::Int),
];
const TRANSITION_TELEPORT: &[ParamSpec] = &[
    req("map_name", ParamKind::Str),
    req("x", ParamKind::Int),
    req("y", ParamKind::Int),
    req("transition_secs", ParamKind::Float),
];
const SCREEN_TRANSITION: &[ParamSpec] = &[opt("transition_secs", ParamKind::Float)];
const WAIT: &[ParamSpec] = &[req("seconds", ParamKind::Float)];
const RANDOM_ENCOUNTER: &[ParamSpec] = &[
    req("encounter_slug", ParamKind::Str),
    opt("total_prob", ParamKind::Float),
];
const START_BATTLE: &[ParamSpec] = &[req("npc_slug", ParamKind::Str)];
const SET_MONSTER_HEALTH: &[ParamSpec] = &[
    opt("slot", ParamKind::Int),
    opt("health", ParamKind::Float),
];
const SET_MONSTER_LEVEL: &[ParamSpec] = &[opt("slot", ParamKind::Int), req("level", ParamKind::Int)];
const SET_MONSTER_STATUS: &[ParamSpec] = &[opt("slot", ParamKind::Int), opt("status", ParamKind::Str)];
const SET_VARIABLE: &[ParamSpec] = &[req("name", ParamKind::Str), req("value", ParamKind::Str)];
const CREATE_NPC: &[ParamSpec] = &[
    req("npc_slug", ParamKind::Str),
    req("x", ParamKind::Int),
    req("y", ParamKind::Int),
    opt("facing", ParamKind::Direction),
];
const NPC_FACE: &[ParamSpec] = &[req("npc_slug", ParamKind::Str), req("target", ParamKind::Str)];
const ADD_MONSTER: &[ParamSpec] = &[req("monster_slug", ParamKind::Str), req("level", ParamKind::Int)];
const PLAY_MUSIC: &[ParamSpec] = &[req("track", ParamKind::Str)];

/// A battle needs a party with at least one conscious monster.
fn check_battle_legal(player: &Character) -> bool {
    player.party.iter().any(|monster| !monster.is_fainted())
}

// ---------------------------------------------------------------------------
// Dialogs

/// `dialog <text>`: open a modal text box and wait for it to close.
struct DialogAction {
    text: String,
    translated: bool,
}

fn new_dialog(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(DIALOG, action)?;
    Ok(Box::new(DialogAction {
        text: params.string(0),
        translated: false,
    }))
}

fn new_translated_dialog(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(DIALOG, action)?;
    Ok(Box::new(DialogAction {
        text: params.string(0),
        translated: true,
    }))
}

impl EventAction for DialogAction {
    fn start(&mut self, ctx: &mut EventContext) {
        let text = if self.translated {
            ctx.db.translate(&self.text).to_string()
        } else {
            self.text.clone()
        };
        ctx.bus.emit("dialog_open", serde_json::json!({ "text": text }), None);
        ctx.stack.push(Box::new(DialogState::new(vec![text], None)));
    }

    fn update(&mut self, ctx: &mut EventContext) -> ActionStatus {
        if ctx.stack.has_state::<DialogState>() {
            ActionStatus::Running
        } else {
            ActionStatus::Done
        }
    }
}

/// `dialog_chain <text>`: append to an open dialog, or open one. The
/// `${end}` sentinel instead waits for the box to be read and closed, so a
/// run of chain actions reads as one dialog.
struct DialogChainAction {
    text: String,
    translated: bool,
}

fn new_dialog_chain(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(DIALOG, action)?;
    Ok(Box::new(DialogChainAction {
        text: params.string(0),
        translated: false,
    }))
}

fn new_translated_dialog_chain(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(DIALOG, action)?;
    Ok(Box::new(DialogChainAction {
        text: params.string(0),
        translated: true,
    }))
}

impl DialogChainAction {
    fn is_end(&self) -> bool {
        self.text == CHAIN_END
    }
}

impl EventAction for DialogChainAction {
    fn start(&mut self, ctx: &mut EventContext) {
        if self.is_end() {
            return;
        }
        let text = if self.translated {
            ctx.db.translate(&self.text).to_string()
        } else {
            self.text.clone()
        };
        match ctx.stack.find_state_mut::<DialogState>() {
            Some(dialog) => dialog.append(text),
            None => {
                ctx.bus
                    .emit("dialog_open", serde_json::json!({ "text": text }), None);
                ctx.stack.push(Box::new(DialogState::new(vec![text], None)));
            }
        }
    }

    fn update(&mut self, ctx: &mut EventContext) -> ActionStatus {
        if self.is_end() && ctx.stack.has_state::<DialogState>() {
            ActionStatus::Running
        } else {
            ActionStatus::Done
        }
    }
}

// ---------------------------------------------------------------------------
// Movement between maps

/// `teleport <map>,<x>,<y>`: move the player, changing maps if needed. The
/// move is staged on the session; during a screen transition it is applied
/// at the fade apex so the swap is never visible.
struct TeleportAction {
    map_name: String,
    position: TilePoint,
}

fn new_teleport(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(TELEPORT, action)?;
    Ok(Box::new(TeleportAction {
        map_name: params.string(0),
        position: TilePoint::new(params.int(1) as i32, params.int(2) as i32),
    }))
}

impl EventAction for TeleportAction {
    fn start(&mut self, ctx: &mut EventContext) {
        ctx.session.player.cancel_movement();
        ctx.session.pending_teleport = Some(PendingTeleport {
            map_name: self.map_name.clone(),
            position: self.position,
        });
    }
}

/// `transition_teleport <map>,<x>,<y>,<secs>`: fade out, teleport at full
/// opacity, fade back in.
struct TransitionTeleportAction {
    map_name: String,
    position: TilePoint,
    transition_secs: f32,
    superseded: bool,
}

fn new_transition_teleport(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(TRANSITION_TELEPORT, action)?;
    Ok(Box::new(TransitionTeleportAction {
        map_name: params.string(0),
        position: TilePoint::new(params.int(1) as i32, params.int(2) as i32),
        transition_secs: params.float(3) as f32,
        superseded: false,
    }))
}

impl EventAction for TransitionTeleportAction {
    fn start(&mut self, ctx: &mut EventContext) {
        if ctx.session.pending_teleport.is_some() {
            // Another teleport is already in flight; let it win.
            self.superseded = true;
            return;
        }
        ctx.session.in_transition = true;
        ctx.stack
            .push(Box::new(FadeTransitionState::new(self.transition_secs)));
        ctx.session.player.cancel_movement();
        ctx.session.pending_teleport = Some(PendingTeleport {
            map_name: self.map_name.clone(),
            position: self.position,
        });
    }

    fn update(&mut self, ctx: &mut EventContext) -> ActionStatus {
        // A cross-map teleport discards this instance wholesale when the
        // map changes; this wait only finishes same-map transitions.
        if self.superseded
            || (ctx.session.pending_teleport.is_none() && !ctx.session.in_transition)
        {
            ActionStatus::Done
        } else {
            ActionStatus::Running
        }
    }
}

/// `screen_transition [secs]`: a fade with nothing behind it.
struct ScreenTransitionAction {
    transition_secs: f32,
}

fn new_screen_transition(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(SCREEN_TRANSITION, action)?;
    Ok(Box::new(ScreenTransitionAction {
        transition_secs: params.float_opt(0).unwrap_or(0.3) as f32,
    }))
}

impl EventAction for ScreenTransitionAction {
    fn start(&mut self, ctx: &mut EventContext) {
        ctx.session.in_transition = true;
        ctx.stack
            .push(Box::new(FadeTransitionState::new(self.transition_secs)));
    }

    fn update(&mut self, ctx: &mut EventContext) -> ActionStatus {
        if ctx.stack.has_state::<FadeTransitionState>() {
            ActionStatus::Running
        } else {
            ActionStatus::Done
        }
    }
}

// ---------------------------------------------------------------------------
// Waiting

/// `wait <secs>` / `wait_for_secs <secs>`: hold this event's action list
/// for a game-clock duration. Not retried: a map change mid-wait discards
/// the instance.
struct WaitAction {
    seconds: f32,
    elapsed: f32,
}

fn new_wait(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(WAIT, action)?;
    Ok(Box::new(WaitAction {
        seconds: params.float(0) as f32,
        elapsed: 0.0,
    }))
}

impl EventAction for WaitAction {
    fn update(&mut self, ctx: &mut EventContext) -> ActionStatus {
        self.elapsed += ctx.dt;
        if self.elapsed >= self.seconds {
            ActionStatus::Done
        } else {
            ActionStatus::Running
        }
    }
}

// ---------------------------------------------------------------------------
// Battles

/// `random_encounter <table>[,total_prob]`: roll the encounter table; on a
/// hit, queue a battle behind a flash transition. A miss is a silent
/// no-op.
struct RandomEncounterAction {
    encounter_slug: String,
    total_prob: Option<f32>,
    battle_started: bool,
}

fn new_random_encounter(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(RANDOM_ENCOUNTER, action)?;
    Ok(Box::new(RandomEncounterAction {
        encounter_slug: params.string(0),
        total_prob: params.float_opt(1).map(|v| v as f32),
        battle_started: false,
    }))
}

impl EventAction for RandomEncounterAction {
    fn start(&mut self, ctx: &mut EventContext) {
        if !check_battle_legal(&ctx.session.player) {
            return;
        }
        let table = match ctx.db.encounter(&self.encounter_slug) {
            Ok(record) => record,
            Err(err) => {
                error!("[Totem event] random_encounter: {}", err);
                return;
            }
        };
        let Some(entry) = encounter::choose_encounter(
            &table.monsters,
            self.total_prob,
            ctx.config.encounter_rate_modifier,
            ctx.rng,
        ) else {
            return;
        };
        let record = match ctx.db.monster(&entry.monster) {
            Ok(record) => record,
            Err(err) => {
                error!("[Totem event] random_encounter: {}", err);
                return;
            }
        };
        let wild = encounter::spawn_encounter(entry, record, ctx.rng);
        info!(
            "[Totem event] Wild {} (level {}) appeared",
            wild.slug, wild.level
        );
        ctx.bus.emit(
            "encounter_started",
            serde_json::json!({ "monster": wild.slug, "level": wild.level }),
            None,
        );
        ctx.session.player.cancel_movement();
        // Queue the battle behind a flash: when the fade pops itself the
        // queued combat state replaces it with no frame in between.
        ctx.stack.queue(Box::new(CombatState::new(wild)));
        ctx.session.in_transition = true;
        ctx.stack.push(Box::new(FadeTransitionState::new(0.25)));
        self.battle_started = true;
    }

    fn update(&mut self, ctx: &mut EventContext) -> ActionStatus {
        if !self.battle_started {
            return ActionStatus::Done;
        }
        let busy = ctx.stack.has_queued()
            || ctx.stack.has_state::<FadeTransitionState>()
            || ctx.stack.has_state::<CombatState>();
        if busy {
            ActionStatus::Running
        } else {
            ActionStatus::Done
        }
    }
}

/// `start_battle <npc>`: fight the named NPC's lead monster.
struct StartBattleAction {
    npc_slug: String,
    battle_started: bool,
}

fn new_start_battle(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(START_BATTLE, action)?;
    Ok(Box::new(StartBattleAction {
        npc_slug: params.string(0),
        battle_started: false,
    }))
}

impl EventAction for StartBattleAction {
    fn start(&mut self, ctx: &mut EventContext) {
        if !check_battle_legal(&ctx.session.player) {
            warn!("[Totem event] start_battle: player has no conscious monsters");
            return;
        }
        let Some(npc) = ctx.session.npcs.get(&self.npc_slug) else {
            warn!("[Totem event] start_battle: no NPC '{}'", self.npc_slug);
            return;
        };
        let Some(lead) = npc.party.iter().find(|m| !m.is_fainted()).cloned() else {
            warn!(
                "[Totem event] start_battle: NPC '{}' has no conscious monsters",
                self.npc_slug
            );
            return;
        };
        ctx.bus.emit(
            "battle_started",
            serde_json::json!({ "npc": self.npc_slug, "monster": lead.slug }),
            None,
        );
        ctx.session.player.cancel_movement();
        ctx.stack.queue(Box::new(CombatState::new(lead)));
        ctx.session.in_transition = true;
        ctx.stack.push(Box::new(FadeTransitionState::new(0.25)));
        self.battle_started = true;
    }

    fn update(&mut self, ctx: &mut EventContext) -> ActionStatus {
        if !self.battle_started {
            return ActionStatus::Done;
        }
        let busy = ctx.stack.has_queued()
            || ctx.stack.has_state::<FadeTransitionState>()
            || ctx.stack.has_state::<CombatState>();
        if busy {
            ActionStatus::Running
        } else {
            ActionStatus::Done
        }
    }
}

// ---------------------------------------------------------------------------
// Party maintenance
//
// The set_monster_* actions are broadcast-or-targeted: with a slot they
// touch that party member, without one they touch the whole party. An
// empty party makes them a no-op.

fn for_party_slot(
    ctx: &mut EventContext,
    slot: Option<i64>,
    mut apply: impl FnMut(&mut Monster),
) {
    let party = &mut ctx.session.player.party;
    if party.is_empty() {
        return;
    }
    match slot {
        None => {
            for monster in party.iter_mut() {
                apply(monster);
            }
        }
        Some(slot) => match party.get_mut(slot.max(0) as usize) {
            Some(monster) => apply(monster),
            None => error!("[Totem event] invalid monster slot {}", slot),
        },
    }
}

/// `set_monster_health [slot][,fraction]`: restore to a fraction of max
/// hp, full without a fraction.
struct SetMonsterHealthAction {
    slot: Option<i64>,
    health: Option<f64>,
}

fn new_set_monster_health(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(SET_MONSTER_HEALTH, action)?;
    Ok(Box::new(SetMonsterHealthAction {
        slot: params.int_opt(0),
        health: params.float_opt(1),
    }))
}

impl EventAction for SetMonsterHealthAction {
    fn start(&mut self, ctx: &mut EventContext) {
        let health = self.health;
        if let Some(value) = health {
            if !(0.0..=1.0).contains(&value) {
                error!(
                    "[Totem event] set_monster_health: fraction {} outside [0, 1]",
                    value
                );
                return;
            }
        }
        for_party_slot(ctx, self.slot, |monster| match health {
            None => monster.current_hp = monster.hp,
            Some(fraction) => monster.current_hp = (monster.hp as f64 * fraction) as u32,
        });
    }
}

/// `set_monster_level [slot],<level>`.
struct SetMonsterLevelAction {
    slot: Option<i64>,
    level: u32,
}

fn new_set_monster_level(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(SET_MONSTER_LEVEL, action)?;
    Ok(Box::new(SetMonsterLevelAction {
        slot: params.int_opt(0),
        level: params.int(1).max(1) as u32,
    }))
}

impl EventAction for SetMonsterLevelAction {
    fn start(&mut self, ctx: &mut EventContext) {
        let level = self.level;
        for_party_slot(ctx, self.slot, |monster| monster.set_level(level));
    }
}

/// `set_monster_status [slot][,status]`: apply a status, or clear all
/// statuses without one.
struct SetMonsterStatusAction {
    slot: Option<i64>,
    status: Option<String>,
}

fn new_set_monster_status(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(SET_MONSTER_STATUS, action)?;
    Ok(Box::new(SetMonsterStatusAction {
        slot: params.int_opt(0),
        status: params.string_opt(1),
    }))
}

impl EventAction for SetMonsterStatusAction {
    fn start(&mut self, ctx: &mut EventContext) {
        let status = self.status.clone();
        for_party_slot(ctx, self.slot, |monster| match &status {
            None => monster.clear_statuses(),
            Some(slug) => monster.apply_status(slug.clone()),
        });
    }
}

/// `add_monster <slug>,<level>`: grant the player a monster, if the party
/// has room.
struct AddMonsterAction {
    monster_slug: String,
    level: u32,
}

fn new_add_monster(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(ADD_MONSTER, action)?;
    Ok(Box::new(AddMonsterAction {
        monster_slug: params.string(0),
        level: params.int(1).max(1) as u32,
    }))
}

impl EventAction for AddMonsterAction {
    fn start(&mut self, ctx: &mut EventContext) {
        const PARTY_LIMIT: usize = 6;
        if ctx.session.player.party.len() >= PARTY_LIMIT {
            warn!(
                "[Totem event] add_monster: party full, ignoring '{}'",
                self.monster_slug
            );
            return;
        }
        match Monster::spawn(ctx.db, &self.monster_slug, self.level) {
            Ok(monster) => {
                ctx.bus.emit(
                    "monster_added",
                    serde_json::json!({ "monster": monster.slug, "level": monster.level }),
                    None,
                );
                ctx.session.player.party.push(monster);
            }
            Err(err) => error!("[Totem event] add_monster: {}", err),
        }
    }
}

// ---------------------------------------------------------------------------
// World tweaks

/// `set_variable <name>,<value>`: write a game variable. Values that look
/// numeric are stored as numbers.
struct SetVariableAction {
    name: String,
    value: String,
}

fn new_set_variable(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(SET_VARIABLE, action)?;
    Ok(Box::new(SetVariableAction {
        name: params.string(0),
        value: params.string(1),
    }))
}

impl EventAction for SetVariableAction {
    fn start(&mut self, ctx: &mut EventContext) {
        ctx.session
            .set_variable(self.name.clone(), GameValue::parse(&self.value));
    }
}

/// `create_npc <slug>,<x>,<y>[,facing]`: place a character on the current
/// map. NPCs belong to maps, so an `init` event usually does this.
struct CreateNpcAction {
    npc_slug: String,
    position: TilePoint,
    facing: Option<Direction>,
}

fn new_create_npc(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(CREATE_NPC, action)?;
    Ok(Box::new(CreateNpcAction {
        npc_slug: params.string(0),
        position: TilePoint::new(params.int(1) as i32, params.int(2) as i32),
        facing: params.direction_opt(3),
    }))
}

impl EventAction for CreateNpcAction {
    fn start(&mut self, ctx: &mut EventContext) {
        if ctx.session.npcs.contains_key(&self.npc_slug) {
            warn!(
                "[Totem event] create_npc: '{}' already exists on this map",
                self.npc_slug
            );
            return;
        }
        let mut npc = Character::new(self.npc_slug.clone(), self.position);
        if let Some(facing) = self.facing {
            npc.facing = facing;
        }
        ctx.session.npcs.insert(self.npc_slug.clone(), npc);
    }
}

/// `npc_face <npc>,<direction|character>`: turn a character toward a
/// direction or toward another character.
struct NpcFaceAction {
    npc_slug: String,
    target: String,
}

fn new_npc_face(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(NPC_FACE, action)?;
    Ok(Box::new(NpcFaceAction {
        npc_slug: params.string(0),
        target: params.string(1),
    }))
}

impl EventAction for NpcFaceAction {
    fn start(&mut self, ctx: &mut EventContext) {
        let facing = match Direction::parse(&self.target) {
            Some(direction) => Some(direction),
            None => {
                let npc_pos = ctx.session.character(&self.npc_slug).map(|c| c.tile_pos);
                let target_pos = ctx.session.character(&self.target).map(|c| c.tile_pos);
                match (npc_pos, target_pos) {
                    (Some(from), Some(to)) => Some(Direction::towards(from, to)),
                    _ => None,
                }
            }
        };
        let Some(facing) = facing else {
            warn!(
                "[Totem event] npc_face: cannot resolve target '{}'",
                self.target
            );
            return;
        };
        match ctx.session.character_mut(&self.npc_slug) {
            Some(npc) => npc.facing = facing,
            None => warn!("[Totem event] npc_face: no character '{}'", self.npc_slug),
        }
    }
}

/// `play_music <track>`: free-form track name, never comma-split.
struct PlayMusicAction {
    track: String,
}

fn new_play_music(action: &MapAction) -> Result<Box<dyn EventAction>, ScriptError> {
    let params = action_params(PLAY_MUSIC, action)?;
    Ok(Box::new(PlayMusicAction {
        track: params.string(0),
    }))
}

impl EventAction for PlayMusicAction {
    fn start(&mut self, ctx: &mut EventContext) {
        ctx.audio.play(&self.track, ctx.bus);
    }
}
