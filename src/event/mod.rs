//! The scripted-event framework: condition and action interfaces, the
//! registries that map script names onto them, and the world context both
//! are given while running.
//!
//! Registries are populated by explicit registration at startup; a script
//! name is either in the table or it is a content error, logged and
//! contained to the event that used it.

pub mod actions;
pub mod conditions;
pub mod engine;

use std::collections::HashMap;

use crate::audio::MusicPlayer;
use crate::bus::GameEventBus;
use crate::clock::GameClock;
use crate::components::{GameConfig, GameRng};
use crate::db::ContentDb;
use crate::map::{EventObject, MapAction, MapCondition};
use crate::script::schema::{self, ParamSpec, Params};
use crate::script::ScriptError;
use crate::session::Session;
use crate::states::StateStack;

/// Everything an action or condition may touch while executing. One frame
/// owns the whole world tree; there is no other mutator.
pub struct EventContext<'a> {
    pub session: &'a mut Session,
    pub stack: &'a mut StateStack,
    pub db: &'a ContentDb,
    pub rng: &'a mut GameRng,
    pub clock: &'a GameClock,
    pub config: &'a GameConfig,
    pub audio: &'a mut MusicPlayer,
    pub bus: &'a mut GameEventBus,
    /// Seconds since the previous fixed-step frame.
    pub dt: f32,
}

/// Per-predicate-class persistent storage, keyed by a condition's string
/// identity. Used by edge-triggered predicates to remember the previous
/// frame; cleared on map change.
pub type ConditionPersist = HashMap<String, serde_json::Value>;

/// A named predicate over world state. Implementations are stateless; the
/// few that need memory use the persist map.
pub trait EventCondition: Send + Sync {
    fn test(
        &self,
        ctx: &mut EventContext,
        condition: &MapCondition,
        persist: &mut ConditionPersist,
    ) -> bool;
}

/// One poll of a running action.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActionStatus {
    Running,
    Done,
}

/// A resumable operation driven by the event engine.
///
/// `start` runs exactly once when the instance is created; `update` runs
/// every frame (including the first) until it returns [`ActionStatus::Done`];
/// `cleanup` runs exactly once after that. The default `update` finishes
/// immediately, so an action that does not override it is fire-and-forget.
pub trait EventAction: Send + Sync {
    fn start(&mut self, _ctx: &mut EventContext) {}

    fn update(&mut self, _ctx: &mut EventContext) -> ActionStatus {
        ActionStatus::Done
    }

    fn cleanup(&mut self, _ctx: &mut EventContext) {}
}

pub type ActionFactory = fn(&MapAction) -> Result<Box<dyn EventAction>, ScriptError>;

struct ConditionEntry {
    schema: &'static [ParamSpec],
    condition: Box<dyn EventCondition>,
}

struct ActionEntry {
    schema: &'static [ParamSpec],
    factory: ActionFactory,
}

/// String name -> implementation tables for conditions and actions.
#[derive(Default)]
pub struct Registries {
    conditions: HashMap<&'static str, ConditionEntry>,
    actions: HashMap<&'static str, ActionEntry>,
}

impl Registries {
    /// The full standard registry: every shipped condition and action.
    pub fn standard() -> Self {
        let mut registries = Self::default();
        conditions::register_all(&mut registries);
        actions::register_all(&mut registries);
        registries
    }

    pub fn register_condition(
        &mut self,
        name: &'static str,
        schema: &'static [ParamSpec],
        condition: Box<dyn EventCondition>,
    ) {
        self.conditions
            .insert(name, ConditionEntry { schema, condition });
    }

    pub fn register_action(
        &mut self,
        name: &'static str,
        schema: &'static [ParamSpec],
        factory: ActionFactory,
    ) {
        self.actions.insert(name, ActionEntry { schema, factory });
    }

    pub fn condition(&self, name: &str) -> Option<&dyn EventCondition> {
        self.conditions.get(name).map(|entry| &*entry.condition)
    }

    pub fn action_factory(&self, name: &str) -> Option<ActionFactory> {
        self.actions.get(name).map(|entry| entry.factory)
    }

    /// Schema-check every condition and action of an event whose name is
    /// known. Unknown names pass here: an unknown condition evaluates
    /// always-false at runtime and an unknown action is logged and
    /// skipped, neither disables the event at load.
    pub fn validate_event(&self, event: &EventObject) -> Result<(), ScriptError> {
        for condition in &event.conditions {
            if let Some(entry) = self.conditions.get(condition.kind.as_str()) {
                schema::parse_params(entry.schema, &condition.parameters).map_err(|source| {
                    ScriptError::Parameters {
                        kind: "condition",
                        name: condition.kind.clone(),
                        source,
                    }
                })?;
            }
        }
        for action in &event.actions {
            if let Some(entry) = self.actions.get(action.kind.as_str()) {
                schema::parse_params(entry.schema, &action.parameters).map_err(|source| {
                    ScriptError::Parameters {
                        kind: "action",
                        name: action.kind.clone(),
                        source,
                    }
                })?;
            }
        }
        Ok(())
    }
}

/// Parse an action's raw parameters against its schema; factories call
/// this so a typed mismatch surfaces as a [`ScriptError`], not a cast.
pub fn action_params(
    schema: &'static [ParamSpec],
    action: &MapAction,
) -> Result<Params, ScriptError> {
    schema::parse_params(schema, &action.parameters).map_err(|source| ScriptError::Parameters {
        kind: "action",
        name: action.kind.clone(),
        source,
    })
}

/// Parse a condition's raw parameters against its schema. Validation ran
/// at map load, so failures here mean the schema and registry disagree;
/// the caller treats that as condition-false.
pub fn condition_params(schema: &'static [ParamSpec], condition: &MapCondition) -> Option<Params> {
    schema::parse_params(schema, &condition.parameters).ok()
}
