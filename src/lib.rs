pub mod config;
pub mod engine;
pub mod error;
pub mod map;

use std::collections::HashSet;

use log::{debug, info, warn};

use engine::{
    Completion, EngineEvent, InputSnapshot, Output, SpatialIndex, WorldState, conditions_met,
    run_actions,
};
use error::{EngineError, LoadError, ScriptError};
use map::{EventZone, MapModel, MapSource, Point, Rect, Teleport, ZoneId, map_stem};

pub use map::{load_map, load_map_from_str};

/// Position inside a zone's action list where execution continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionCursor {
    /// Index into `MapModel::zones`.
    pub zone: usize,
    pub next_action: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A dialog is open; nothing is evaluated until it is dismissed.
    AwaitingDialog(ActionCursor),
    /// Dismissed; the next tick finishes the parked action list first.
    Resuming(ActionCursor),
}

struct ActiveMap {
    model: MapModel,
    index: SpatialIndex,
}

/// The map event engine: owns the active map and steps it one frame at a time.
pub struct Engine {
    source: Box<dyn MapSource>,
    active: Option<ActiveMap>,
    state: SchedulerState,
    /// Zones whose script errors were already logged at warn level.
    reported: HashSet<ZoneId>,
}

#[cfg(feature = "wasm")]
mod wasm_bindings {
    use super::*;
    use serde::Serialize;
    use serde_wasm_bindgen::{from_value, to_value};
    use std::collections::HashMap;
    use wasm_bindgen::prelude::*;

    use crate::engine::{Button, Direction};
    use crate::map::MemorySource;

    #[derive(Serialize)]
    struct WasmTickResult {
        events: Vec<EngineEvent>,
        errors: Vec<String>,
    }

    #[wasm_bindgen]
    pub struct WasmEngine {
        engine: Engine,
        world: WorldState,
    }

    #[wasm_bindgen]
    impl WasmEngine {
        /// Create an engine over `{ name: tomlDocument }` and enter `start_map`.
        #[wasm_bindgen(constructor)]
        pub fn new(
            maps: JsValue,
            start_map: &str,
            tile_x: i32,
            tile_y: i32,
        ) -> Result<WasmEngine, JsValue> {
            let docs: HashMap<String, String> =
                from_value(maps).map_err(|e| JsValue::from_str(&e.to_string()))?;

            let mut source = MemorySource::new();
            for (name, doc) in docs {
                source.insert_map(&name, doc);
            }

            let mut engine = Engine::new(source);
            let mut world = WorldState::default();
            engine
                .enter_map(&mut world, start_map, tile_x, tile_y)
                .map_err(|e| JsValue::from_str(&e.to_string()))?;

            Ok(WasmEngine { engine, world })
        }

        /// Step one frame. `held` is a comma-separated list of button names.
        #[wasm_bindgen]
        pub fn tick(&mut self, held: &str) -> JsValue {
            let buttons = held
                .split(',')
                .filter_map(|b| b.trim().parse::<Button>().ok());
            let out = self
                .engine
                .tick(&mut self.world, &InputSnapshot::holding(buttons));

            to_value(&WasmTickResult {
                events: out.events,
                errors: out.errors.iter().map(|e| e.to_string()).collect(),
            })
            .unwrap_or(JsValue::NULL)
        }

        #[wasm_bindgen]
        pub fn dismiss_dialog(&mut self) -> bool {
            self.engine.dismiss_dialog()
        }

        /// Move one tile if nothing blocks the way. Returns whether the player moved.
        #[wasm_bindgen]
        pub fn walk(&mut self, direction: &str) -> bool {
            match direction.parse::<Direction>() {
                Ok(dir) => self.engine.try_step(&mut self.world, dir),
                Err(_) => false,
            }
        }

        #[wasm_bindgen]
        pub fn world(&self) -> JsValue {
            to_value(&(
                self.world.position,
                self.world.facing,
                &self.world.map_slug,
                &self.world.music,
            ))
            .unwrap_or(JsValue::NULL)
        }
    }
}

impl Engine {
    pub fn new(source: impl MapSource + 'static) -> Self {
        Engine {
            source: Box::new(source),
            active: None,
            state: SchedulerState::Idle,
            reported: HashSet::new(),
        }
    }

    /// Load `name` and make it the active map. On failure the previous map stays active.
    pub fn load_map(&mut self, name: &str) -> Result<&MapModel, LoadError> {
        let model = map::load_map(self.source.as_ref(), name)?;
        Ok(self.activate(model))
    }

    /// Load a map and place the player on it, e.g. at startup or after loading a save.
    ///
    /// The current map stays active if the map fails to load or the tile is off it.
    pub fn enter_map(
        &mut self,
        world: &mut WorldState,
        name: &str,
        tile_x: i32,
        tile_y: i32,
    ) -> Result<(), EngineError> {
        let model = map::load_map(self.source.as_ref(), name)?;
        let origin = model
            .tile_origin(tile_x, tile_y)
            .ok_or_else(|| EngineError::InvalidDestination {
                map: name.to_string(),
                tile_x,
                tile_y,
            })?;

        let model = self.activate(model);
        world.position = origin;
        world.map_slug = model.slug.clone();
        Ok(())
    }

    fn activate(&mut self, model: MapModel) -> &MapModel {
        let index = SpatialIndex::build(&model);
        self.state = SchedulerState::Idle;
        self.reported.clear();
        &self.active.insert(ActiveMap { model, index }).model
    }

    pub fn map(&self) -> Option<&MapModel> {
        self.active.as_ref().map(|a| &a.model)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_awaiting_dialog(&self) -> bool {
        matches!(self.state, SchedulerState::AwaitingDialog(_))
    }

    /// Zones of the active map containing `point`, in declared order.
    pub fn zones_overlapping(&self, point: Point) -> Vec<&EventZone> {
        match &self.active {
            Some(a) => a
                .index
                .zones_overlapping(point)
                .into_iter()
                .map(|i| &a.model.zones[i])
                .collect(),
            None => Vec::new(),
        }
    }

    /// True if `rect` is blocked on the active map. With no map loaded everything is blocked.
    pub fn collides(&self, rect: &Rect) -> bool {
        match &self.active {
            Some(a) => a.index.collides(rect),
            None => true,
        }
    }

    /// Face `dir` and move one tile that way unless blocked.
    pub fn try_step(&self, world: &mut WorldState, dir: engine::Direction) -> bool {
        world.facing = dir;
        let Some(active) = &self.active else {
            return false;
        };

        let target = active.model.facing_rect(world.position, dir);
        if active.index.collides(&target) {
            return false;
        }
        world.position = Point::new(target.x, target.y);
        true
    }

    /// Signal that the dialog collaborator closed the open dialog.
    pub fn dismiss_dialog(&mut self) -> bool {
        match self.state {
            SchedulerState::AwaitingDialog(cursor) => {
                self.state = SchedulerState::Resuming(cursor);
                true
            }
            _ => false,
        }
    }

    /// Run one frame: latch input, evaluate candidate zones in declared order,
    /// and execute every zone whose conditions hold.
    pub fn tick(&mut self, world: &mut WorldState, input: &InputSnapshot) -> Output {
        let mut out = Output::new();
        world.latch_input(input);

        let Some(active) = &self.active else {
            out.error(EngineError::NoActiveMap);
            return out;
        };
        let model = &active.model;

        let mut transition: Option<Teleport> = None;

        match self.state {
            SchedulerState::AwaitingDialog(_) => return out,
            SchedulerState::Resuming(cursor) => {
                self.state = SchedulerState::Idle;
                let zone = &model.zones[cursor.zone];
                debug!("resuming zone {} at action {}", zone.id, cursor.next_action);

                match run_actions(zone, cursor.next_action, world, &mut out) {
                    Ok(Completion::Finished) => {}
                    Ok(Completion::Suspended { next_action }) => {
                        self.state = SchedulerState::AwaitingDialog(ActionCursor {
                            zone: cursor.zone,
                            next_action,
                        });
                        return out;
                    }
                    Ok(Completion::Transition(t)) => transition = Some(t),
                    Err(e) => report(&mut self.reported, &mut out, e),
                }
            }
            SchedulerState::Idle => {}
        }

        if transition.is_none() {
            let anchor = model.anchor_rect(world.position);
            let facing = model.facing_rect(world.position, world.facing);

            for zi in active.index.candidates(&anchor, &facing) {
                let zone = &model.zones[zi];

                match conditions_met(zone, model, world) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        report(&mut self.reported, &mut out, e);
                        continue;
                    }
                }

                debug!("zone {} ('{}') fired", zone.id, zone.name);

                match run_actions(zone, 0, world, &mut out) {
                    Ok(Completion::Finished) => {}
                    Ok(Completion::Suspended { next_action }) => {
                        self.state = SchedulerState::AwaitingDialog(ActionCursor {
                            zone: zi,
                            next_action,
                        });
                        return out;
                    }
                    Ok(Completion::Transition(t)) => {
                        transition = Some(t);
                        break;
                    }
                    Err(e) => report(&mut self.reported, &mut out, e),
                }
            }
        }

        if let Some(t) = transition {
            self.transition(world, &t, &mut out);
        }

        out
    }

    /// Swap in the destination map, or report why it could not be used.
    fn transition(&mut self, world: &mut WorldState, t: &Teleport, out: &mut Output) {
        let invalid = || EngineError::InvalidDestination {
            map: t.map.clone(),
            tile_x: t.tile_x,
            tile_y: t.tile_y,
        };

        // Instant teleports within the map only reposition the player
        if let Some(current) = self.map() {
            if t.fade.is_none() && current.slug == map_stem(&t.map) {
                match current.tile_origin(t.tile_x, t.tile_y) {
                    Some(origin) => world.position = origin,
                    None => {
                        warn!("teleport to ({}, {}) is off the map", t.tile_x, t.tile_y);
                        out.error(invalid());
                    }
                }
                return;
            }
        }

        let model = match map::load_map(self.source.as_ref(), &t.map) {
            Ok(model) => model,
            Err(LoadError::NotFound(_)) => {
                warn!("transition target '{}' not found", t.map);
                out.error(EngineError::TransitionTargetMissing(t.map.clone()));
                return;
            }
            Err(e) => {
                warn!("transition to '{}' failed: {}", t.map, e);
                out.error(EngineError::TransitionFailed {
                    slug: t.map.clone(),
                    source: e,
                });
                return;
            }
        };

        let Some(origin) = model.tile_origin(t.tile_x, t.tile_y) else {
            warn!(
                "transition to '{}' rejected: tile ({}, {}) is off the map",
                t.map, t.tile_x, t.tile_y
            );
            out.error(invalid());
            return;
        };

        let model = self.activate(model);
        world.position = origin;
        world.map_slug = model.slug.clone();
        info!(
            "transition to '{}' at tile ({}, {})",
            model.slug, t.tile_x, t.tile_y
        );
        out.push(EngineEvent::TransitionRequested {
            map: t.map.clone(),
            tile_x: t.tile_x,
            tile_y: t.tile_y,
            duration: t.fade.unwrap_or(0.0),
        });
    }
}

/// Log a zone's script error (loudly the first time) and surface it to the caller.
fn report(reported: &mut HashSet<ZoneId>, out: &mut Output, err: ScriptError) {
    if reported.insert(err.zone()) {
        warn!("skipping zone: {}", err);
    } else {
        debug!("skipping zone: {}", err);
    }
    out.error(err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Button, Direction};
    use crate::map::MemorySource;

    const HALL: &str = r#"
[map]
width = 6
height = 6
tilewidth = 16
tileheight = 16
[map.properties]
slug = "hall"

[[objectgroup]]
name = "Collisions"
[[objectgroup.object]]
id = 1
type = "collision"
x = 80
y = 0
width = 16
height = 96

[[objectgroup]]
name = "Events"
[[objectgroup.object]]
id = 10
name = "Sign"
type = "event"
x = 32
y = 0
width = 16
height = 16
[objectgroup.object.properties]
cond1 = "is player_facing_tile"
cond2 = "is button_pressed INTERACT"
act1 = "translated_dialog sign_text"
act2 = "set_variable read_sign:yes"
act3 = "translated_dialog sign_more"
act4 = "player_face down"

[[objectgroup.object]]
id = 11
name = "Hop"
type = "event"
x = 0
y = 80
width = 16
height = 16
[objectgroup.object.properties]
cond1 = "is player_at"
act1 = "teleport hall.tmx,4,4"

[[objectgroup.object]]
id = 12
name = "Broken"
type = "event"
x = 64
y = 64
width = 16
height = 16
[objectgroup.object.properties]
cond1 = "is player_at"
act1 = "spawn_npc rival"
"#;

    fn engine() -> (Engine, WorldState) {
        let mut engine = Engine::new(MemorySource::new().with_map("hall", HALL));
        let mut world = WorldState::default();
        engine.enter_map(&mut world, "hall", 2, 1).unwrap();
        world.facing = Direction::Up;
        (engine, world)
    }

    #[test]
    fn test_tick_without_map_reports_error() {
        let mut engine = Engine::new(MemorySource::new());
        let mut world = WorldState::default();
        let out = engine.tick(&mut world, &InputSnapshot::new());
        assert!(matches!(out.errors[..], [EngineError::NoActiveMap]));
    }

    #[test]
    fn test_dialog_parks_and_resumes_cursor() {
        let (mut engine, mut world) = engine();
        let press = InputSnapshot::holding([Button::Interact]);

        let out = engine.tick(&mut world, &press);
        assert_eq!(out.dialog_key(), Some("sign_text"));
        assert_eq!(
            engine.state(),
            SchedulerState::AwaitingDialog(ActionCursor {
                zone: 0,
                next_action: 1
            })
        );

        // Nothing runs while the dialog is open
        let out = engine.tick(&mut world, &InputSnapshot::new());
        assert!(out.is_empty());
        assert!(!world.variables.contains_key("read_sign"));

        assert!(engine.dismiss_dialog());
        assert!(!engine.dismiss_dialog());

        let out = engine.tick(&mut world, &InputSnapshot::new());
        assert_eq!(out.dialog_key(), Some("sign_more"));
        assert_eq!(world.variables.get("read_sign").map(String::as_str), Some("yes"));
        assert_eq!(world.facing, Direction::Up);

        assert!(engine.dismiss_dialog());
        let out = engine.tick(&mut world, &InputSnapshot::new());
        assert!(out.events.is_empty());
        assert_eq!(world.facing, Direction::Down);
        assert_eq!(engine.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_key_held_through_dialog_does_not_refire() {
        let (mut engine, mut world) = engine();
        let press = InputSnapshot::holding([Button::Interact]);

        engine.tick(&mut world, &press);
        engine.tick(&mut world, &press);
        engine.dismiss_dialog();
        engine.tick(&mut world, &press);
        engine.dismiss_dialog();
        engine.tick(&mut world, &press);
        assert_eq!(engine.state(), SchedulerState::Idle);

        world.facing = Direction::Up;
        let out = engine.tick(&mut world, &press);
        assert!(out.events.is_empty());
        assert!(!engine.is_awaiting_dialog());
    }

    #[test]
    fn test_instant_teleport_on_same_map_keeps_map() {
        let (mut engine, mut world) = engine();
        world.position = Point::new(0, 80);

        let out = engine.tick(&mut world, &InputSnapshot::new());
        assert!(out.transition().is_none());
        assert!(out.errors.is_empty());
        assert_eq!(world.position, Point::new(64, 64));
    }

    #[test]
    fn test_instant_teleport_off_the_map_is_rejected() {
        let doc = HALL.replace("teleport hall.tmx,4,4", "teleport hall.tmx,9,9");
        let mut engine = Engine::new(MemorySource::new().with_map("hall", doc));
        let mut world = WorldState::default();
        engine.enter_map(&mut world, "hall", 0, 5).unwrap();

        let out = engine.tick(&mut world, &InputSnapshot::new());
        assert!(matches!(
            &out.errors[..],
            [EngineError::InvalidDestination { tile_x: 9, tile_y: 9, .. }]
        ));
        assert_eq!(world.position, Point::new(0, 80));
    }

    #[test]
    fn test_unknown_action_is_reported_each_frame() {
        let (mut engine, mut world) = engine();
        world.position = Point::new(64, 64);

        for _ in 0..2 {
            let out = engine.tick(&mut world, &InputSnapshot::new());
            assert!(matches!(
                out.errors[..],
                [EngineError::Script(ScriptError::UnknownAction { .. })]
            ));
        }
    }

    #[test]
    fn test_try_step_respects_collisions() {
        let (engine, mut world) = engine();
        world.position = Point::new(64, 32);

        assert!(!engine.try_step(&mut world, Direction::Right));
        assert_eq!(world.facing, Direction::Right);
        assert_eq!(world.position, Point::new(64, 32));

        assert!(engine.try_step(&mut world, Direction::Left));
        assert_eq!(world.position, Point::new(48, 32));

        world.position = Point::new(0, 32);
        assert!(!engine.try_step(&mut world, Direction::Left));
    }
}
