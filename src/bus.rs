use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const MAX_EVENTS: usize = 500;

/// One gameplay event as seen by the presentation layer. The payload is
/// free-form JSON so UI widgets can consume it without a type per event.
#[derive(Serialize, Clone)]
pub struct BusEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
    /// Name of the originating map event, if any.
    pub source: Option<String>,
}

/// Bounded buffer of recent gameplay events. Engine subsystems emit into it;
/// dialogs, transitions and debug overlays read from it.
#[derive(Resource, Default)]
pub struct GameEventBus {
    pub recent: VecDeque<BusEvent>,
    pub frame: u64,
    pub dropped_events: u64,
    last_overflow_log_frame: u64,
}

impl GameEventBus {
    pub fn emit(
        &mut self,
        name: impl Into<String>,
        data: serde_json::Value,
        source: Option<String>,
    ) {
        self.recent.push_back(BusEvent {
            name: name.into(),
            data,
            frame: self.frame,
            source,
        });
        if self.recent.len() > MAX_EVENTS {
            let excess = self.recent.len() - MAX_EVENTS;
            for _ in 0..excess {
                self.recent.pop_front();
            }
            self.dropped_events = self.dropped_events.saturating_add(excess as u64);
            if self.frame.saturating_sub(self.last_overflow_log_frame) >= 60 {
                self.last_overflow_log_frame = self.frame;
                warn!(
                    "[Totem bus] Dropped {} buffered events (total dropped: {})",
                    excess, self.dropped_events
                );
            }
        }
    }
}

pub struct GameEventBusPlugin;

impl Plugin for GameEventBusPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GameEventBus::default())
            .add_systems(FixedUpdate, tick_event_frame);
    }
}

fn tick_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame = bus.frame.saturating_add(1);
}
