//! The per-frame event driver. Scans the loaded map's trigger events,
//! evaluates their condition lists, and walks the action lists of
//! triggered events until every action reports done.
//!
//! Actions inside one event run sequentially: instant actions chain within
//! a single frame, a pending one suspends the walk until the next frame.
//! Separate events run concurrently, updated in the order they triggered.
//! An event cannot trigger again while any of its actions is still live.
//! A map change discards every running instance and all condition memory.

use std::collections::HashMap;
use std::path::Path;

use bevy::prelude::*;

use crate::audio::MusicPlayer;
use crate::bus::GameEventBus;
use crate::clock::GameClock;
use crate::components::{GameConfig, GameRng, InputEvent};
use crate::db::ContentDb;
use crate::event::{
    ActionStatus, ConditionPersist, EventAction, EventContext, Registries,
};
use crate::map::{self, EventKind, EventObject, MapAction, MapCondition, MapData, MapError};
use crate::script::Operator;
use crate::session::Session;
use crate::states::transition::FadeTransitionState;
use crate::states::{StateContext, StateStack};

/// One triggered event working through its action list.
struct RunningEvent {
    event_id: u32,
    event_name: String,
    actions: Vec<MapAction>,
    index: usize,
    current: Option<Box<dyn EventAction>>,
}

#[derive(Resource)]
pub struct EventEngine {
    registries: Registries,
    /// FIFO by trigger order; at most one entry per event id.
    running: Vec<RunningEvent>,
    /// Per-predicate-class state, keyed by condition kind then identity.
    persist: HashMap<String, ConditionPersist>,
}

impl Default for EventEngine {
    fn default() -> Self {
        Self::new(Registries::standard())
    }
}

impl EventEngine {
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            running: Vec::new(),
            persist: HashMap::new(),
        }
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Drop everything tied to the current map. Called on map change.
    pub fn reset(&mut self) {
        self.running.clear();
        self.persist.clear();
    }

    /// One engine frame: evaluate triggers, then advance running events.
    pub fn update(&mut self, ctx: &mut EventContext) {
        self.check_conditions(ctx);
        self.update_running(ctx);
    }

    fn check_conditions(&mut self, ctx: &mut EventContext) {
        let events = ctx.session.map.events.clone();
        if !ctx.session.inits_done {
            ctx.session.inits_done = true;
            for event in events.iter().filter(|e| e.kind == EventKind::Init) {
                self.process_map_event(ctx, event);
            }
        }
        for event in events.iter().filter(|e| e.kind == EventKind::Standard) {
            self.process_map_event(ctx, event);
        }
    }

    /// Player input that fell through the state stack. The interact
    /// button evaluates interact-kind events.
    pub fn process_input(&mut self, ctx: &mut EventContext, input: InputEvent) {
        if !matches!(input, InputEvent::Confirm | InputEvent::Interact) {
            return;
        }
        let events = ctx.session.map.events.clone();
        for event in events.iter().filter(|e| e.kind == EventKind::Interact) {
            self.process_map_event(ctx, event);
        }
    }

    /// Conditions are ANDed in declaration order; any failure stops the
    /// scan. A passing event starts unless it is already running.
    fn process_map_event(&mut self, ctx: &mut EventContext, event: &EventObject) {
        let triggered = event
            .conditions
            .iter()
            .all(|condition| self.check_condition(ctx, condition));
        if triggered {
            self.start_event(ctx, event);
        }
    }

    fn check_condition(&mut self, ctx: &mut EventContext, condition: &MapCondition) -> bool {
        let Some(entry) = self.registries.condition(condition.kind.as_str()) else {
            error!(
                "[Totem event] condition '{}' is not implemented",
                condition.kind
            );
            return false;
        };
        let persist = self.persist.entry(condition.kind.clone()).or_default();
        let raw = entry.test(ctx, condition, persist);
        raw == (condition.operator == Operator::Is)
    }

    /// Register a running instance for the event unless one is already
    /// live, which de-duplicates re-triggers while actions are mid-flight.
    fn start_event(&mut self, ctx: &mut EventContext, event: &EventObject) {
        if self.running.iter().any(|r| r.event_id == event.id) {
            return;
        }
        debug!("[Totem event] starting map event '{}'", event.name);
        ctx.bus.emit(
            "event_triggered",
            serde_json::json!({ "id": event.id, "name": event.name, "rect": event.rect }),
            Some(event.name.clone()),
        );
        self.running.push(RunningEvent {
            event_id: event.id,
            event_name: event.name.clone(),
            actions: event.actions.clone(),
            index: 0,
            current: None,
        });
    }

    fn update_running(&mut self, ctx: &mut EventContext) {
        let mut i = 0;
        while i < self.running.len() {
            let finished = Self::advance_event(&self.registries, &mut self.running[i], ctx);
            if finished {
                self.running.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Advance one running event as far as it will go this frame. Returns
    /// true when its action list is exhausted (or aborted on a bad
    /// action).
    fn advance_event(registries: &Registries, event: &mut RunningEvent, ctx: &mut EventContext) -> bool {
        loop {
            if event.current.is_none() {
                let Some(map_action) = event.actions.get(event.index) else {
                    return true;
                };
                let Some(factory) = registries.action_factory(map_action.kind.as_str()) else {
                    error!(
                        "[Totem event] action '{}' is not implemented, aborting event '{}'",
                        map_action.kind, event.event_name
                    );
                    return true;
                };
                match factory(map_action) {
                    Ok(mut action) => {
                        action.start(ctx);
                        event.current = Some(action);
                    }
                    Err(err) => {
                        error!(
                            "[Totem event] disabling event '{}': {}",
                            event.event_name, err
                        );
                        return true;
                    }
                }
            }

            let Some(action) = event.current.as_mut() else {
                return true;
            };
            match action.update(ctx) {
                ActionStatus::Done => {
                    action.cleanup(ctx);
                    event.current = None;
                    event.index += 1;
                }
                ActionStatus::Running => return false,
            }
        }
    }
}

/// Resolve and load a map by name through the engine's registries, so
/// schema validation can disable broken events at load time.
pub fn load_map(
    config: &GameConfig,
    registries: &Registries,
    name: &str,
) -> Result<MapData, MapError> {
    let path = Path::new(&config.maps_dir).join(format!("{}.json", name));
    map::load_map_file(&path, &|event| registries.validate_event(event))
}

/// Buffered inputs mapped from the keyboard, drained on the fixed step.
#[derive(Resource, Default)]
pub struct InputQueue(pub Vec<InputEvent>);

pub struct EventEnginePlugin;

impl Plugin for EventEnginePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EventEngine>()
            .init_resource::<InputQueue>()
            .add_systems(Update, collect_keyboard_input)
            .add_systems(
                FixedUpdate,
                (route_player_input, run_event_engine, apply_pending_teleport).chain(),
            );
    }
}

fn collect_keyboard_input(
    keys: Option<Res<ButtonInput<KeyCode>>>,
    mut queue: ResMut<InputQueue>,
) {
    use crate::components::Direction;
    // Headless runs have no input plugin.
    let Some(keys) = keys else {
        return;
    };
    if keys.just_pressed(KeyCode::Space) || keys.just_pressed(KeyCode::Enter) {
        queue.0.push(InputEvent::Confirm);
    }
    if keys.just_pressed(KeyCode::Escape) || keys.just_pressed(KeyCode::KeyX) {
        queue.0.push(InputEvent::Cancel);
    }
    if keys.just_pressed(KeyCode::KeyE) {
        queue.0.push(InputEvent::Interact);
    }
    for (key, direction) in [
        (KeyCode::ArrowUp, Direction::Up),
        (KeyCode::ArrowDown, Direction::Down),
        (KeyCode::ArrowLeft, Direction::Left),
        (KeyCode::ArrowRight, Direction::Right),
    ] {
        if keys.just_pressed(key) {
            queue.0.push(InputEvent::Move(direction));
        }
    }
}

/// Offer buffered input to the state stack first; whatever the top state
/// declines falls through to the engine's interact scan.
#[allow(clippy::too_many_arguments)]
fn route_player_input(
    mut queue: ResMut<InputQueue>,
    mut engine: ResMut<EventEngine>,
    mut stack: ResMut<StateStack>,
    mut session: ResMut<Session>,
    db: Res<ContentDb>,
    mut rng: ResMut<GameRng>,
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    mut audio: ResMut<MusicPlayer>,
    mut bus: ResMut<GameEventBus>,
    time: Res<Time<Fixed>>,
) {
    for input in std::mem::take(&mut queue.0) {
        let unconsumed = {
            let mut state_ctx = StateContext {
                session: &mut session,
                db: &db,
                rng: &mut rng,
                clock: &clock,
                bus: &mut bus,
            };
            stack.process_event(input, &mut state_ctx)
        };
        if let Some(input) = unconsumed {
            let mut ctx = EventContext {
                session: &mut session,
                stack: &mut stack,
                db: &db,
                rng: &mut rng,
                clock: &clock,
                config: &config,
                audio: &mut audio,
                bus: &mut bus,
                dt: time.delta_secs(),
            };
            engine.process_input(&mut ctx, input);
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run_event_engine(
    mut engine: ResMut<EventEngine>,
    mut session: ResMut<Session>,
    mut stack: ResMut<StateStack>,
    db: Res<ContentDb>,
    mut rng: ResMut<GameRng>,
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    mut audio: ResMut<MusicPlayer>,
    mut bus: ResMut<GameEventBus>,
    time: Res<Time<Fixed>>,
) {
    let mut ctx = EventContext {
        session: &mut session,
        stack: &mut stack,
        db: &db,
        rng: &mut rng,
        clock: &clock,
        config: &config,
        audio: &mut audio,
        bus: &mut bus,
        dt: time.delta_secs(),
    };
    engine.update(&mut ctx);
}

/// Apply a staged teleport. Without a transition it applies immediately;
/// with one it waits for the fade apex so the swap is hidden. A cross-map
/// move loads the new map, resets the engine and replaces the session's
/// map wholesale.
fn apply_pending_teleport(
    mut engine: ResMut<EventEngine>,
    mut session: ResMut<Session>,
    mut stack: ResMut<StateStack>,
    config: Res<GameConfig>,
    mut bus: ResMut<GameEventBus>,
) {
    if session.pending_teleport.is_none() {
        return;
    }
    if let Some(fade) = stack.find_state_mut::<FadeTransitionState>() {
        if !fade.at_apex() {
            return;
        }
    }
    let Some(pending) = session.pending_teleport.take() else {
        return;
    };
    if pending.map_name == session.map.name {
        session.player.tile_pos = pending.position;
        session.player.cancel_movement();
        return;
    }
    match load_map(&config, engine.registries(), &pending.map_name) {
        Ok(map) => {
            info!("[Totem event] Changing map to '{}'", pending.map_name);
            session.change_map(map, pending.position);
            engine.reset();
            bus.emit(
                "map_changed",
                serde_json::json!({ "map": pending.map_name }),
                None,
            );
        }
        Err(err) => {
            error!("[Totem event] teleport failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::TilePoint;
    use crate::db::test_content::small_db;
    use crate::map::{build_event, EventKind, TileRect};
    use crate::monster::Monster;
    use crate::session::{Character, GameValue};
    use crate::states::dialog::DialogState;
    use crate::states::WorldState;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Arc;

    struct TestWorld {
        engine: EventEngine,
        session: Session,
        stack: StateStack,
        db: ContentDb,
        rng: GameRng,
        clock: GameClock,
        config: GameConfig,
        audio: MusicPlayer,
        bus: GameEventBus,
    }

    impl TestWorld {
        fn new() -> Self {
            let config = GameConfig {
                rng_seed: Some(42),
                ..GameConfig::default()
            };
            let mut stack = StateStack::default();
            stack.push(Box::new(WorldState));
            Self {
                engine: EventEngine::default(),
                session: Session::default(),
                stack,
                db: small_db(),
                rng: GameRng::from_config(&config),
                clock: GameClock::new(&config),
                config: config.clone(),
                audio: MusicPlayer::default(),
                bus: GameEventBus::default(),
            }
        }

        fn set_events(&mut self, events: Vec<EventObject>) {
            self.session.map.events = Arc::from(events);
            self.session.inits_done = false;
        }

        fn frame(&mut self) {
            let mut ctx = EventContext {
                session: &mut self.session,
                stack: &mut self.stack,
                db: &self.db,
                rng: &mut self.rng,
                clock: &self.clock,
                config: &self.config,
                audio: &mut self.audio,
                bus: &mut self.bus,
                dt: 1.0 / 60.0,
            };
            self.engine.update(&mut ctx);
        }

        fn interact(&mut self) {
            let mut ctx = EventContext {
                session: &mut self.session,
                stack: &mut self.stack,
                db: &self.db,
                rng: &mut self.rng,
                clock: &self.clock,
                config: &self.config,
                audio: &mut self.audio,
                bus: &mut self.bus,
                dt: 1.0 / 60.0,
            };
            self.engine.process_input(&mut ctx, InputEvent::Interact);
        }
    }

    fn event_at(
        id: u32,
        name: &str,
        kind: EventKind,
        rect: TileRect,
        properties: &[(&str, &str)],
    ) -> EventObject {
        let properties: StdHashMap<String, String> = properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        build_event(id, name, kind, rect, &properties).unwrap()
    }

    #[test]
    fn instant_actions_chain_within_one_frame() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![event_at(
            1,
            "greet",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[
                ("cond1", "is player_at"),
                ("act1", "set_variable step_one,done"),
                ("act2", "set_variable step_two,done"),
            ],
        )]);

        world.frame();
        assert_eq!(
            world.session.get_variable("step_one"),
            Some(&GameValue::Str("done".to_string()))
        );
        assert_eq!(
            world.session.get_variable("step_two"),
            Some(&GameValue::Str("done".to_string()))
        );
        assert_eq!(world.engine.running_count(), 0);
    }

    #[test]
    fn running_event_is_not_double_triggered() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![event_at(
            1,
            "slow_gate",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[
                ("cond1", "is player_at"),
                ("act1", "wait 5.0"),
                ("act2", "transition_teleport cave,3,3,0.5"),
            ],
        )]);

        // The condition holds every frame, but only one instance may run.
        world.frame();
        assert_eq!(world.engine.running_count(), 1);
        world.frame();
        world.frame();
        assert_eq!(world.engine.running_count(), 1);
    }

    #[test]
    fn is_not_operator_inverts_conditions() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(9, 9);
        world.set_events(vec![event_at(
            1,
            "away_trigger",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[
                ("cond1", "is_not player_at"),
                ("act1", "set_variable away,yes"),
            ],
        )]);

        world.frame();
        assert_eq!(
            world.session.get_variable("away"),
            Some(&GameValue::Str("yes".to_string()))
        );
    }

    #[test]
    fn unknown_condition_is_always_false() {
        let mut world = TestWorld::new();
        world.set_events(vec![event_at(
            1,
            "phantom",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[
                ("cond1", "is moon_phase full"),
                ("act1", "set_variable moon,yes"),
            ],
        )]);

        world.frame();
        assert_eq!(world.session.get_variable("moon"), None);
        assert_eq!(world.engine.running_count(), 0);
    }

    #[test]
    fn init_events_run_once_per_map() {
        let mut world = TestWorld::new();
        world.set_events(vec![event_at(
            1,
            "map_setup",
            EventKind::Init,
            TileRect::new(0, 0, 1, 1),
            &[("act1", "set_variable visits,1")],
        )]);

        world.frame();
        assert_eq!(
            world.session.get_variable("visits"),
            Some(&GameValue::Num(1.0))
        );
        world.session.set_variable("visits", GameValue::Num(99.0));
        world.frame();
        // Still 99: init events do not re-run.
        assert_eq!(
            world.session.get_variable("visits"),
            Some(&GameValue::Num(99.0))
        );
    }

    #[test]
    fn interact_events_need_the_button_and_facing() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(2, 3);
        world.session.player.facing = crate::components::Direction::Up;
        world.set_events(vec![event_at(
            1,
            "sign",
            EventKind::Interact,
            TileRect::new(2, 2, 1, 1),
            &[("act1", "dialog A weathered sign.")],
        )]);

        // No button press: nothing happens.
        world.frame();
        assert!(!world.stack.has_state::<DialogState>());

        world.interact();
        world.frame();
        assert!(world.stack.has_state::<DialogState>());

        // Facing away: the implicit player_facing_tile condition fails.
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(2, 3);
        world.session.player.facing = crate::components::Direction::Down;
        world.set_events(vec![event_at(
            1,
            "sign",
            EventKind::Interact,
            TileRect::new(2, 2, 1, 1),
            &[("act1", "dialog A weathered sign.")],
        )]);
        world.interact();
        world.frame();
        assert!(!world.stack.has_state::<DialogState>());
    }

    #[test]
    fn player_moved_fires_once_per_entry() {
        let mut world = TestWorld::new();
        world.set_events(vec![event_at(
            1,
            "doorway",
            EventKind::Standard,
            TileRect::new(5, 5, 1, 1),
            &[
                ("cond1", "is player_moved"),
                ("act1", "set_variable entries,1"),
            ],
        )]);

        // Stand outside the trigger for a frame so the edge detector arms.
        world.session.player.tile_pos = TilePoint::new(4, 5);
        world.frame();
        assert_eq!(world.session.get_variable("entries"), None);

        // Walk into the trigger tile.
        world.session.player.move_destination = Some(TilePoint::new(5, 5));
        world.frame();
        world.session.player.tile_pos = TilePoint::new(5, 5);
        world.session.player.move_destination = None;
        world.frame();
        assert_eq!(
            world.session.get_variable("entries"),
            Some(&GameValue::Num(1.0))
        );

        // Standing still inside the tile must not re-trigger.
        world.session.set_variable("entries", GameValue::Num(0.0));
        world.frame();
        world.frame();
        assert_eq!(
            world.session.get_variable("entries"),
            Some(&GameValue::Num(0.0))
        );
    }

    #[test]
    fn behav_talk_faces_the_npc_and_opens_dialog() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(3, 3);
        world.session.player.facing = crate::components::Direction::Right;
        world.session.npcs.insert(
            "npc_maple".to_string(),
            Character::new("npc_maple", TilePoint::new(4, 3)),
        );
        world.set_events(vec![event_at(
            1,
            "maple_talk",
            EventKind::Standard,
            TileRect::new(4, 3, 1, 1),
            &[("behav1", "talk npc_maple"), ("act1", "dialog Hello!")],
        )]);

        world.frame();
        assert!(world.stack.has_state::<DialogState>());
        // The NPC turned to face the player (player is to its left).
        assert_eq!(
            world.session.npcs["npc_maple"].facing,
            crate::components::Direction::Left
        );
    }

    #[test]
    fn dialog_chain_appends_until_the_end_sentinel() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![event_at(
            1,
            "long_story",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[
                ("cond1", "is player_at"),
                ("act1", "dialog_chain Once upon a time"),
                ("act2", "dialog_chain there was a monster"),
                ("act3", "dialog_chain ${end}"),
            ],
        )]);

        world.frame();
        let dialog = world.stack.find_state_mut::<DialogState>().unwrap();
        assert_eq!(dialog.current_line(), Some("Once upon a time"));
        assert_eq!(dialog.remaining(), 1);
        // The ${end} action keeps the event alive until the box closes.
        assert_eq!(world.engine.running_count(), 1);
    }

    #[test]
    fn wait_holds_the_action_list() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![event_at(
            1,
            "slow_reveal",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[
                ("cond1", "is player_at"),
                ("act1", "wait 0.05"),
                ("act2", "set_variable revealed,yes"),
            ],
        )]);

        world.frame();
        assert_eq!(world.session.get_variable("revealed"), None);
        // 0.05s at 60Hz is four frames.
        for _ in 0..4 {
            world.frame();
        }
        assert_eq!(
            world.session.get_variable("revealed"),
            Some(&GameValue::Str("yes".to_string()))
        );
    }

    #[test]
    fn set_monster_health_broadcasts_without_a_slot() {
        let mut world = TestWorld::new();
        for slug in ["rootling", "cindertail"] {
            let mut monster = Monster::spawn(&world.db, slug, 5).unwrap();
            monster.take_damage(10);
            world.session.player.party.push(monster);
        }
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![event_at(
            1,
            "healer",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[("cond1", "is player_at"), ("act1", "set_monster_health")],
        )]);

        world.frame();
        for monster in &world.session.player.party {
            assert_eq!(monster.current_hp, monster.hp);
        }
    }

    #[test]
    fn set_monster_health_targets_a_slot() {
        let mut world = TestWorld::new();
        for slug in ["rootling", "cindertail"] {
            let mut monster = Monster::spawn(&world.db, slug, 5).unwrap();
            monster.take_damage(10);
            world.session.player.party.push(monster);
        }
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![event_at(
            1,
            "healer",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[("cond1", "is player_at"), ("act1", "set_monster_health 1")],
        )]);

        world.frame();
        let party = &world.session.player.party;
        assert_eq!(party[0].current_hp, party[0].hp - 10);
        assert_eq!(party[1].current_hp, party[1].hp);
    }

    #[test]
    fn set_monster_actions_noop_on_empty_party() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![event_at(
            1,
            "healer",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[
                ("cond1", "is player_at"),
                ("act1", "set_monster_health"),
                ("act2", "set_monster_level ,10"),
                ("act3", "set_monster_status ,poison"),
                ("act4", "set_variable after,yes"),
            ],
        )]);

        // Must not panic or stall; the follow-up action still runs.
        world.frame();
        assert_eq!(
            world.session.get_variable("after"),
            Some(&GameValue::Str("yes".to_string()))
        );
    }

    #[test]
    fn schema_mismatch_disables_only_that_event() {
        let mut world = TestWorld::new();
        let registries = Registries::standard();
        let good = event_at(
            1,
            "good",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[("cond1", "is player_at"), ("act1", "set_variable ok,yes")],
        );
        let bad = event_at(
            2,
            "bad",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &[("cond1", "is player_at"), ("act1", "teleport cave,north,9")],
        );
        assert!(registries.validate_event(&good).is_ok());
        assert!(registries.validate_event(&bad).is_err());

        // The loader keeps validated events only; the good one still runs.
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![good]);
        world.frame();
        assert_eq!(
            world.session.get_variable("ok"),
            Some(&GameValue::Str("yes".to_string()))
        );
    }

    #[test]
    fn teleport_within_a_transition_waits_for_the_apex() {
        let mut world = TestWorld::new();
        world.session.player.tile_pos = TilePoint::new(0, 0);
        world.set_events(vec![event_at(
            1,
            "cave_mouth",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            // Same-map transition teleport: the move is applied at the
            // fade apex without reloading anything.
            &[
                ("cond1", "is player_moved"),
                ("act1", "transition_teleport village,7,8,0.1"),
            ],
        )]);
        world.session.map.name = "village".to_string();

        // Walk onto the trigger.
        world.session.player.move_destination = Some(TilePoint::new(0, 0));
        world.frame();
        world.session.player.move_destination = None;
        world.frame();

        assert!(world.session.in_transition);
        assert!(world.session.pending_teleport.is_some());
        assert!(world.stack.has_state::<FadeTransitionState>());
    }
}
