use log::debug;

use crate::engine::output::{EngineEvent, Output};
use crate::engine::state::WorldState;
use crate::error::ScriptError;
use crate::map::{Action, EventZone, Teleport};

/// What the scheduler has to do after one action ran.
enum Flow {
    Continue,
    Suspend,
    Transition(Teleport),
}

/// How a run over a zone's action list ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Finished,
    /// A dialog is open; resume at `next_action` once it is dismissed.
    Suspended { next_action: usize },
    /// The remaining actions were abandoned for a teleport.
    Transition(Teleport),
}

/// Execute `zone.actions[from..]` in order against `world`.
///
/// Unknown actions anywhere in the remaining list fail the run before any
/// side effect happens.
pub fn run_actions(
    zone: &EventZone,
    from: usize,
    world: &mut WorldState,
    out: &mut Output,
) -> Result<Completion, ScriptError> {
    let remaining = zone.actions.get(from..).unwrap_or(&[]);

    if let Some(Action::Unknown(verb)) = remaining.iter().find(|a| a.is_unknown()) {
        return Err(ScriptError::UnknownAction {
            zone: zone.id,
            name: zone.name.clone(),
            verb: verb.clone(),
        });
    }

    for (offset, action) in remaining.iter().enumerate() {
        match apply_action(action, world, out) {
            Flow::Continue => {}
            Flow::Suspend => {
                return Ok(Completion::Suspended {
                    next_action: from + offset + 1,
                });
            }
            Flow::Transition(teleport) => return Ok(Completion::Transition(teleport)),
        }
    }

    Ok(Completion::Finished)
}

fn apply_action(action: &Action, world: &mut WorldState, out: &mut Output) -> Flow {
    match action {
        Action::TransitionTeleport(t) | Action::Teleport(t) => Flow::Transition(t.clone()),
        Action::PlayerFace(dir) => {
            world.facing = *dir;
            Flow::Continue
        }
        Action::PlayMusic(track) => {
            if !world.is_playing(track) {
                world.music = Some(track.clone());
                out.push(EngineEvent::MusicRequested {
                    track: track.clone(),
                });
            } else {
                debug!("music '{}' already playing", track);
            }
            Flow::Continue
        }
        Action::StopMusic => {
            if world.music.take().is_some() {
                out.push(EngineEvent::MusicStopped);
            }
            Flow::Continue
        }
        Action::TranslatedDialog(key) => {
            out.push(EngineEvent::DialogRequested { key: key.clone() });
            Flow::Suspend
        }
        Action::Dialog(text) => {
            out.push(EngineEvent::TextDialogRequested { text: text.clone() });
            Flow::Suspend
        }
        Action::SetVariable { key, value } => {
            world.variables.insert(key.clone(), value.clone());
            Flow::Continue
        }
        // Rejected up front in `run_actions`
        Action::Unknown(_) => Flow::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::Direction;
    use crate::map::{Rect, ZoneId, ZoneScope, parse_action};

    fn zone(actions: &[&str]) -> EventZone {
        EventZone {
            id: ZoneId(1),
            name: "Zone".into(),
            rect: Rect::new(0, 0, 16, 16),
            conditions: Vec::new(),
            actions: actions.iter().map(|a| parse_action(a).unwrap()).collect(),
            scope: ZoneScope::Positional,
        }
    }

    #[test]
    fn test_actions_run_in_order() {
        let z = zone(&["player_face up", "set_variable seen:tv", "player_face left"]);
        let mut world = WorldState::default();
        let mut out = Output::new();

        assert_eq!(
            run_actions(&z, 0, &mut world, &mut out),
            Ok(Completion::Finished)
        );
        assert_eq!(world.facing, Direction::Left);
        assert_eq!(world.variables.get("seen").map(String::as_str), Some("tv"));
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_teleport_abandons_remaining_actions() {
        let z = zone(&[
            "transition_teleport town.tmx,1,2,0.5",
            "play_music music_town",
        ]);
        let mut world = WorldState::default();
        let mut out = Output::new();

        let done = run_actions(&z, 0, &mut world, &mut out).unwrap();
        assert!(matches!(done, Completion::Transition(ref t) if t.map == "town.tmx"));
        assert_eq!(world.music, None);
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_play_music_is_idempotent() {
        let z = zone(&["play_music music_home"]);
        let mut world = WorldState::default();
        let mut out = Output::new();

        run_actions(&z, 0, &mut world, &mut out).unwrap();
        run_actions(&z, 0, &mut world, &mut out).unwrap();
        assert_eq!(
            out.events,
            vec![EngineEvent::MusicRequested {
                track: "music_home".into()
            }]
        );
        assert!(world.is_playing("music_home"));
    }

    #[test]
    fn test_stop_music() {
        let z = zone(&["stop_music"]);
        let mut world = WorldState::default();
        world.music = Some("music_home".into());
        let mut out = Output::new();

        run_actions(&z, 0, &mut world, &mut out).unwrap();
        assert_eq!(out.events, vec![EngineEvent::MusicStopped]);
        assert_eq!(world.music, None);
    }

    #[test]
    fn test_dialog_suspends_and_resumes() {
        let z = zone(&[
            "translated_dialog rival_tv",
            "player_face up",
            "dialog Later, then.",
            "player_face right",
        ]);
        let mut world = WorldState::default();
        let mut out = Output::new();

        assert_eq!(
            run_actions(&z, 0, &mut world, &mut out),
            Ok(Completion::Suspended { next_action: 1 })
        );
        assert_eq!(world.facing, Direction::Down);
        assert_eq!(out.dialog_key(), Some("rival_tv"));

        assert_eq!(
            run_actions(&z, 1, &mut world, &mut out),
            Ok(Completion::Suspended { next_action: 3 })
        );
        assert_eq!(world.facing, Direction::Up);

        assert_eq!(
            run_actions(&z, 3, &mut world, &mut out),
            Ok(Completion::Finished)
        );
        assert_eq!(world.facing, Direction::Right);
    }

    #[test]
    fn test_unknown_action_runs_nothing() {
        let z = zone(&["player_face up", "spawn_npc rival"]);
        let mut world = WorldState::default();
        let mut out = Output::new();

        assert_eq!(
            run_actions(&z, 0, &mut world, &mut out),
            Err(ScriptError::UnknownAction {
                zone: ZoneId(1),
                name: "Zone".into(),
                verb: "spawn_npc".into(),
            })
        );
        assert_eq!(world.facing, Direction::Down);
    }
}
