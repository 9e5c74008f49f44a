//! Music playback model. Rendering of actual audio is the framework's
//! business; the engine only tracks which track is (supposed to be)
//! playing so scripts can start music and test `music_playing`.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bus::GameEventBus;

fn default_volume() -> f32 {
    1.0
}

fn default_looping() -> bool {
    true
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MusicDefinition {
    pub path: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_looping")]
    pub looping: bool,
}

#[derive(Resource, Default)]
pub struct MusicPlayer {
    pub tracks: HashMap<String, MusicDefinition>,
    current: Option<String>,
    /// The current track had no definition and plays as silence.
    silent_stand_in: bool,
}

impl MusicPlayer {
    /// Load track definitions from `<content>/music.json`. The file is
    /// optional; without it every track plays as a silent stand-in.
    pub fn load(content_dir: &std::path::Path) -> Self {
        let path = content_dir.join("music.json");
        let tracks = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<HashMap<String, MusicDefinition>>(&text) {
                Ok(tracks) => tracks,
                Err(err) => {
                    error!("[Totem audio] Cannot parse {}: {}", path.display(), err);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            tracks,
            ..Self::default()
        }
    }
    /// Start a named track. An unknown name substitutes a silent stand-in
    /// rather than failing, so a missing file never takes down a script.
    pub fn play(&mut self, name: &str, bus: &mut GameEventBus) {
        if self.current.as_deref() == Some(name) {
            return;
        }
        self.silent_stand_in = !self.tracks.contains_key(name);
        if self.silent_stand_in {
            error!("[Totem audio] Unknown music track '{}', playing silence", name);
        }
        self.current = Some(name.to_string());
        bus.emit(
            "music_started",
            serde_json::json!({ "track": name, "silent": self.silent_stand_in }),
            None,
        );
    }

    pub fn stop(&mut self) {
        self.current = None;
        self.silent_stand_in = false;
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_playing(&self, name: &str) -> bool {
        self.current.as_deref() == Some(name)
    }
}

pub struct MusicPlugin;

impl Plugin for MusicPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MusicPlayer>();
    }
}
