use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use log::error;

use map_events::Engine;
use map_events::config::GameConfig;
use map_events::engine::{Button, Direction, EngineEvent, InputSnapshot, Output, WorldState};
use map_events::map::{DirectorySource, TileLayer};

fn flush_output(out: Output) {
    for ev in &out.events {
        match ev {
            EngineEvent::DialogRequested { key } => {
                println!("[dialog] {} (type 'dismiss' to close)", key)
            }
            EngineEvent::TextDialogRequested { text } => {
                println!("[dialog] \"{}\" (type 'dismiss' to close)", text)
            }
            EngineEvent::TransitionRequested {
                map,
                tile_x,
                tile_y,
                duration,
            } => println!(
                "[transition] {} at ({}, {}), fade {:.2}s",
                map, tile_x, tile_y, duration
            ),
            EngineEvent::MusicRequested { track } => println!("[music] {}", track),
            EngineEvent::MusicStopped => println!("[music] stopped"),
        }
    }

    for err in &out.errors {
        println!("[error] {}", err);
    }
}

fn describe(engine: &Engine, world: &WorldState) {
    let Some(map) = engine.map() else {
        println!("No map loaded.");
        return;
    };

    let (tx, ty) = map.tile_of(world.position);
    println!(
        "{} ({}x{}) tile ({}, {}) facing {}",
        map.slug, map.width, map.height, tx, ty, world.facing
    );
    match &world.music {
        Some(track) => println!("Music: {}", track),
        None => println!("Music: none"),
    }

    let names = |layers: Vec<&TileLayer>| {
        layers
            .iter()
            .filter(|l| l.visible && !l.is_empty())
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("Below player: {}", names(map.layers_below_player().collect()));
    println!("Above player: {}", names(map.layers_above_player().collect()));
    if engine.is_awaiting_dialog() {
        println!("A dialog is open.");
    }
}

/// Run `frames` ticks with `held` down, printing whatever each one produced.
fn run_frames(engine: &mut Engine, world: &mut WorldState, held: &[Button], frames: u32) {
    let input = InputSnapshot::holding(held.iter().copied());
    for _ in 0..frames {
        flush_output(engine.tick(world, &input));
    }
}

fn main() -> io::Result<()> {
    env_logger::init();

    let config_path: PathBuf = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("maps/game.toml"));

    let config = match GameConfig::load(&config_path) {
        Ok(c) => {
            println!("Using config file: {}", config_path.display());
            c
        }
        Err(e) => {
            eprintln!("Failed to load config '{}': {e}", config_path.display());
            std::process::exit(1);
        }
    };

    let source = DirectorySource::new(config.maps_dir.clone());
    println!("Reading maps from {}", source.root().display());
    let mut engine = Engine::new(source);
    let mut world = WorldState::default();
    world.facing = config.facing;

    let [start_x, start_y] = config.start_tile;
    if let Err(e) = engine.enter_map(&mut world, &config.start_map, start_x, start_y) {
        error!("failed to enter start map: {}", e);
        eprintln!("Failed to load start map '{}': {e}", config.start_map);
        std::process::exit(1);
    }

    println!("Welcome to {}!", config.name);
    println!("Commands: up/down/left/right, face <dir>, press <button>, hold <button> <frames>,");
    println!("          tick [frames], dismiss, where, zones, quit.\n");

    describe(&engine, &world);
    run_frames(&mut engine, &mut world, &[], 1);

    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        let bytes_read = stdin.read_line(&mut input)?;
        if bytes_read == 0 {
            println!("\nGoodbye.");
            break;
        }

        let input = input.trim().to_lowercase();
        let mut parts = input.split_whitespace();
        let Some(verb) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();

        match verb {
            "quit" | "exit" => {
                println!("Goodbye.");
                break;
            }
            "up" | "down" | "left" | "right" | "u" | "d" | "l" | "r" => {
                if engine.is_awaiting_dialog() {
                    println!("A dialog is open. Type 'dismiss' first.");
                    continue;
                }
                let dir = match verb {
                    "up" | "u" => Direction::Up,
                    "down" | "d" => Direction::Down,
                    "left" | "l" => Direction::Left,
                    _ => Direction::Right,
                };
                if !engine.try_step(&mut world, dir) {
                    println!("Something blocks the way.");
                }
                run_frames(&mut engine, &mut world, &[], 1);
            }
            "face" => match args.first().map(|d| d.parse::<Direction>()) {
                Some(Ok(dir)) => {
                    world.facing = dir;
                    run_frames(&mut engine, &mut world, &[], 1);
                }
                Some(Err(e)) => println!("{}", e),
                None => println!("Face which way?"),
            },
            "press" | "hold" => {
                let Some(name) = args.first() else {
                    println!("Which button?");
                    continue;
                };
                let button = match name.parse::<Button>() {
                    Ok(b) => b,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                let frames = if verb == "hold" {
                    args.get(1).and_then(|n| n.parse().ok()).unwrap_or(30)
                } else {
                    1
                };
                run_frames(&mut engine, &mut world, &[button], frames);
                // Release so the next press is a fresh edge
                run_frames(&mut engine, &mut world, &[], 1);
            }
            "tick" | "wait" => {
                let frames = args.first().and_then(|n| n.parse().ok()).unwrap_or(1);
                run_frames(&mut engine, &mut world, &[], frames);
            }
            "dismiss" => {
                if engine.dismiss_dialog() {
                    run_frames(&mut engine, &mut world, &[], 1);
                } else {
                    println!("No dialog is open.");
                }
            }
            "where" | "look" => describe(&engine, &world),
            "zones" => {
                let zones = engine.zones_overlapping(world.position);
                if zones.is_empty() {
                    println!("No zones here.");
                }
                for zone in zones {
                    println!(
                        "{} '{}' ({} conditions, {} actions)",
                        zone.id,
                        zone.name,
                        zone.conditions.len(),
                        zone.actions.len()
                    );
                }
            }
            _ => println!("I don't understand that command."),
        }
    }

    Ok(())
}
