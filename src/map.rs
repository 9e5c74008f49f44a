//! Map-side event data: tile rectangles, parsed conditions and actions,
//! and loading of map descriptor files.
//!
//! Everything here is immutable once the map is loaded. A map change
//! replaces the whole [`MapData`] wholesale; nothing from the previous map
//! survives it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use bevy::prelude::*;
use thiserror::Error;

use crate::components::TilePoint;
use crate::script::{self, Operator, ScriptError};

/// Axis-aligned rectangle in tile space.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct TileRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl TileRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: TilePoint) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }
}

/// A region-scoped trigger predicate, parsed from a `cond<N>` property.
#[derive(Clone, Debug)]
pub struct MapCondition {
    /// Predicate name, looked up in the condition registry.
    pub kind: String,
    pub parameters: Vec<String>,
    /// The owning event's rectangle, copied here because several
    /// predicates test positions against it.
    pub rect: TileRect,
    pub operator: Operator,
    /// Property key this came from (`cond1`, ...), kept for log messages
    /// and as part of the persist identity of stateful predicates.
    pub name: String,
}

impl MapCondition {
    /// Stable identity for the per-predicate persist store.
    pub fn identity(&self) -> String {
        format!(
            "{}:{}:{},{},{},{}",
            self.kind,
            self.parameters.join(","),
            self.rect.x,
            self.rect.y,
            self.rect.width,
            self.rect.height
        )
    }
}

/// One step of an event's action list, parsed from an `act<N>` property.
#[derive(Clone, Debug)]
pub struct MapAction {
    pub kind: String,
    pub parameters: Vec<String>,
    pub name: String,
}

/// When the engine considers an event for triggering.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EventKind {
    /// Checked every frame.
    #[default]
    Standard,
    /// Checked once, on the first frame after the map loads.
    Init,
    /// Checked only when the player presses the interact button.
    Interact,
}

impl EventKind {
    fn parse(s: &str) -> Self {
        match s {
            "init" => Self::Init,
            "interact" => Self::Interact,
            _ => Self::Standard,
        }
    }
}

/// A tile-rectangle-scoped bundle of conditions and actions.
#[derive(Clone, Debug)]
pub struct EventObject {
    pub id: u32,
    pub name: String,
    pub kind: EventKind,
    pub rect: TileRect,
    pub conditions: Vec<MapCondition>,
    pub actions: Vec<MapAction>,
}

/// The currently loaded map. Owned by the session; replaced wholesale on
/// map change. Events are shared out to the engine via `Arc` so a frame
/// can iterate them while actions mutate the rest of the world.
#[derive(Clone, Debug, Default)]
pub struct MapData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub events: Arc<[EventObject]>,
}

#[derive(Error, Debug)]
pub enum MapError {
    #[error("cannot read map file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse map file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(serde::Deserialize)]
struct RawMap {
    name: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    events: Vec<RawMapEvent>,
}

#[derive(serde::Deserialize)]
struct RawMapEvent {
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    x: i32,
    y: i32,
    #[serde(default)]
    width: i32,
    #[serde(default)]
    height: i32,
    #[serde(default)]
    properties: HashMap<String, String>,
}

/// Build one [`EventObject`] from its raw property map.
///
/// Property keys sort in natural order, so `cond2` contributes before
/// `cond10`. A `behav talk <npc>` shorthand prepends an implicit `to_talk`
/// condition and an `npc_face` action. Events of type `interact` get a
/// trailing implicit `player_facing_tile` condition.
pub fn build_event(
    id: u32,
    name: &str,
    kind: EventKind,
    rect: TileRect,
    properties: &HashMap<String, String>,
) -> Result<EventObject, ScriptError> {
    let mut keys: Vec<&String> = properties.keys().collect();
    keys.sort_by(|a, b| script::natural_cmp(a, b));

    let mut conditions = Vec::new();
    let mut actions = Vec::new();

    for key in keys {
        let value = &properties[key];
        if key.starts_with("cond") {
            let (operator, kind, parameters) = script::parse_condition_string(value)?;
            conditions.push(MapCondition {
                kind,
                parameters,
                rect,
                operator,
                name: key.clone(),
            });
        } else if key.starts_with("act") {
            let (kind, parameters) = script::parse_action_string(value)?;
            actions.push(MapAction {
                kind,
                parameters,
                name: key.clone(),
            });
        } else if key.starts_with("behav") {
            let (behavior, args) = script::parse_behav_string(value)?;
            match behavior.as_str() {
                "talk" => {
                    conditions.insert(
                        0,
                        MapCondition {
                            kind: "to_talk".to_string(),
                            parameters: args.clone(),
                            rect,
                            operator: Operator::Is,
                            name: key.clone(),
                        },
                    );
                    let npc = args.first().cloned().unwrap_or_default();
                    actions.insert(
                        0,
                        MapAction {
                            kind: "npc_face".to_string(),
                            parameters: vec![npc, "player".to_string()],
                            name: key.clone(),
                        },
                    );
                }
                other => {
                    return Err(ScriptError::UnknownBehavior {
                        name: other.to_string(),
                    })
                }
            }
        } else {
            return Err(ScriptError::UnknownProperty { key: key.clone() });
        }
    }

    if kind == EventKind::Interact {
        conditions.push(MapCondition {
            kind: "player_facing_tile".to_string(),
            parameters: Vec::new(),
            rect,
            operator: Operator::Is,
            name: String::new(),
        });
    }

    Ok(EventObject {
        id,
        name: name.to_string(),
        kind,
        rect,
        conditions,
        actions,
    })
}

/// Load a map descriptor from disk.
///
/// `validate` is the registry-backed schema check; an event that fails to
/// parse or validate is logged and dropped, and the rest of the map still
/// loads. Only an unreadable or unparseable file is an error.
pub fn load_map_file(
    path: &Path,
    validate: &dyn Fn(&EventObject) -> Result<(), ScriptError>,
) -> Result<MapData, MapError> {
    let text = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let raw: RawMap = serde_json::from_str(&text).map_err(|source| MapError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(map_from_raw(raw, validate))
}

fn map_from_raw(raw: RawMap, validate: &dyn Fn(&EventObject) -> Result<(), ScriptError>) -> MapData {
    let mut events = Vec::with_capacity(raw.events.len());
    for raw_event in &raw.events {
        let rect = TileRect::new(raw_event.x, raw_event.y, raw_event.width, raw_event.height);
        let built = build_event(
            raw_event.id,
            &raw_event.name,
            EventKind::parse(&raw_event.kind),
            rect,
            &raw_event.properties,
        )
        .and_then(|event| validate(&event).map(|()| event));
        match built {
            Ok(event) => events.push(event),
            Err(err) => {
                warn!(
                    "[Totem map] Disabling event '{}' (id {}) in map '{}': {}",
                    raw_event.name, raw_event.id, raw.name, err
                );
            }
        }
    }
    MapData {
        name: raw.name,
        width: raw.width,
        height: raw.height,
        events: events.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn rect_contains_is_half_open() {
        let rect = TileRect::new(2, 3, 2, 1);
        assert!(rect.contains(TilePoint::new(2, 3)));
        assert!(rect.contains(TilePoint::new(3, 3)));
        assert!(!rect.contains(TilePoint::new(4, 3)));
        assert!(!rect.contains(TilePoint::new(2, 4)));
    }

    #[test]
    fn event_properties_sort_naturally() {
        let properties = props(&[
            ("act10", "set_variable last,yes"),
            ("act2", "set_variable middle,yes"),
            ("act1", "set_variable first,yes"),
            ("cond1", "is player_moved"),
        ]);
        let event = build_event(
            7,
            "walk_trigger",
            EventKind::Standard,
            TileRect::new(0, 0, 1, 1),
            &properties,
        )
        .unwrap();
        let order: Vec<&str> = event.actions.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(order, vec!["act1", "act2", "act10"]);
        assert_eq!(event.conditions.len(), 1);
    }

    #[test]
    fn behav_talk_expands_to_condition_and_action() {
        let properties = props(&[("behav1", "talk npc_maple"), ("act1", "dialog Hi there")]);
        let event = build_event(
            1,
            "maple",
            EventKind::Standard,
            TileRect::new(5, 5, 1, 1),
            &properties,
        )
        .unwrap();
        assert_eq!(event.conditions[0].kind, "to_talk");
        assert_eq!(event.conditions[0].parameters, vec!["npc_maple"]);
        assert_eq!(event.actions[0].kind, "npc_face");
        assert_eq!(event.actions[0].parameters, vec!["npc_maple", "player"]);
        assert_eq!(event.actions[1].kind, "dialog");
    }

    #[test]
    fn interact_events_get_facing_condition() {
        let event = build_event(
            2,
            "sign",
            EventKind::Interact,
            TileRect::new(1, 1, 1, 1),
            &props(&[("act1", "dialog A weathered sign.")]),
        )
        .unwrap();
        assert_eq!(event.conditions.last().unwrap().kind, "player_facing_tile");
    }

    #[test]
    fn bad_events_are_dropped_not_fatal() {
        let raw = RawMap {
            name: "test".to_string(),
            width: 10,
            height: 10,
            events: vec![
                RawMapEvent {
                    id: 1,
                    name: "broken".to_string(),
                    kind: String::new(),
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1,
                    properties: props(&[("cond1", "maybe player_moved")]),
                },
                RawMapEvent {
                    id: 2,
                    name: "fine".to_string(),
                    kind: String::new(),
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1,
                    properties: props(&[("act1", "dialog Still here")]),
                },
            ],
        };
        let map = map_from_raw(raw, &|_| Ok(()));
        assert_eq!(map.events.len(), 1);
        assert_eq!(map.events[0].name, "fine");
    }
}
