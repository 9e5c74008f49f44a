mod audio;
mod bus;
mod clock;
mod components;
mod db;
mod encounter;
mod event;
mod formula;
mod item;
mod map;
mod monster;
mod script;
mod session;
mod states;
mod technique;

use std::path::Path;

use bevy::prelude::*;

use components::{GameConfig, GameRng, HeadlessMode, TilePoint};
use db::ContentDb;
use event::engine::EventEngine;
use event::Registries;
use session::Session;

#[derive(serde::Deserialize, Default)]
struct StartupConfig {
    window_title: Option<String>,
    window_width: Option<f32>,
    window_height: Option<f32>,
    #[serde(default)]
    game: GameConfig,
}

fn load_startup_config() -> StartupConfig {
    let path = std::env::var("TOTEM_GAME_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "game.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<StartupConfig>(&contents) {
            Ok(cfg) => {
                println!("[Totem] Loaded startup config from {}", path);
                cfg
            }
            Err(e) => {
                eprintln!("[Totem] Failed to parse {}: {}", path, e);
                StartupConfig::default()
            }
        },
        Err(_) => StartupConfig::default(),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");

    let startup = load_startup_config();
    let config = startup.game.clone();

    // Content is a hard requirement: a database that fails to load means
    // a broken install, not something to limp past.
    let content = match ContentDb::load(Path::new(&config.content_dir)) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("[Totem] Failed to load content database: {}", err);
            std::process::exit(1);
        }
    };

    let registries = Registries::standard();
    let starting_map = match event::engine::load_map(&config, &registries, &config.starting_map) {
        Ok(map) => map,
        Err(err) => {
            eprintln!(
                "[Totem] Failed to load starting map '{}': {}",
                config.starting_map, err
            );
            map::MapData::default()
        }
    };

    let mut app = App::new();
    app.insert_resource(HeadlessMode(headless));

    if headless {
        app.add_plugins(MinimalPlugins);
        println!("[Totem] Starting in HEADLESS mode");
    } else {
        let window_title = startup.window_title.unwrap_or_else(|| "Totem".to_string());
        let window_width = startup.window_width.unwrap_or(960.0);
        let window_height = startup.window_height.unwrap_or(540.0);
        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: window_title,
                resolution: (window_width, window_height).into(),
                present_mode: bevy::window::PresentMode::AutoVsync,
                ..default()
            }),
            ..default()
        }));
        println!("[Totem] Starting in WINDOWED mode");
    }

    app.insert_resource(GameRng::from_config(&config))
        .insert_resource(audio::MusicPlayer::load(Path::new(&config.content_dir)))
        .insert_resource(clock::GameClock::new(&config))
        .insert_resource(Session::new(starting_map, TilePoint::new(0, 0)))
        .insert_resource(content)
        .insert_resource(EventEngine::new(registries))
        .insert_resource(config)
        .insert_resource(Time::<Fixed>::from_hz(60.0))
        .add_plugins(bus::GameEventBusPlugin)
        .add_plugins(clock::GameClockPlugin)
        .add_plugins(audio::MusicPlugin)
        .add_plugins(states::StateStackPlugin)
        .add_plugins(event::engine::EventEnginePlugin);

    app.run();
}
