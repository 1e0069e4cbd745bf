//! Closed condition and action vocabulary for event zones.
//!
//! Script lines are parsed once at load time. A line reads
//! `[is|not] <verb> [arg,arg,...]`; actions take no `is`/`not` modifier.
//! Verbs outside the vocabulary are kept as `Unknown` so the zone can be
//! reported and skipped at runtime while the rest of the map stays usable.

use crate::engine::{Button, Direction};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    PlayerAt,
    PlayerFacing(Direction),
    PlayerFacingTile,
    ButtonPressed(Button),
    MusicPlaying(String),
    /// `value: None` only requires the variable to be present.
    VariableSet {
        key: String,
        value: Option<String>,
    },
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub negated: bool,
    pub predicate: Predicate,
}

impl Condition {
    /// Positional conditions tie a zone to the player's surroundings.
    pub fn is_positional(&self) -> bool {
        !self.negated
            && matches!(
                self.predicate,
                Predicate::PlayerAt | Predicate::PlayerFacingTile
            )
    }
}

/// Destination of a teleport, in tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct Teleport {
    pub map: String,
    pub tile_x: i32,
    pub tile_y: i32,
    /// Fade duration in seconds; `None` for an instant teleport.
    pub fade: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    TransitionTeleport(Teleport),
    Teleport(Teleport),
    PlayerFace(Direction),
    PlayMusic(String),
    StopMusic,
    TranslatedDialog(String),
    Dialog(String),
    SetVariable { key: String, value: String },
    Unknown(String),
}

impl Action {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Action::Unknown(_))
    }
}

fn split_first_word(s: &str) -> (&str, &str) {
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn split_args(rest: &str) -> Vec<&str> {
    if rest.trim().is_empty() {
        return Vec::new();
    }
    rest.split(',').map(str::trim).collect()
}

fn expect_args(verb: &str, args: &[&str], count: usize) -> Result<(), String> {
    if args.len() != count || args.iter().any(|a| a.is_empty()) {
        return Err(format!(
            "'{}' expects {} argument(s), got {}",
            verb,
            count,
            args.len()
        ));
    }
    Ok(())
}

fn one_arg<'a>(verb: &str, args: &[&'a str]) -> Result<&'a str, String> {
    expect_args(verb, args, 1)?;
    Ok(args[0])
}

fn parse_key_value(verb: &str, raw: &str) -> Result<(String, Option<String>), String> {
    match raw.split_once(':') {
        Some((key, value)) => {
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("'{}' has an empty variable name", verb));
            }
            Ok((key.to_string(), Some(value.trim().to_string())))
        }
        None => Ok((raw.trim().to_string(), None)),
    }
}

fn parse_tile_coord(verb: &str, raw: &str) -> Result<i32, String> {
    raw.parse::<i32>()
        .map_err(|_| format!("'{}' has an invalid tile coordinate '{}'", verb, raw))
}

fn parse_teleport(verb: &str, args: &[&str], with_fade: bool) -> Result<Teleport, String> {
    expect_args(verb, args, if with_fade { 4 } else { 3 })?;

    let fade = if with_fade {
        let secs = args[3]
            .parse::<f32>()
            .map_err(|_| format!("'{}' has an invalid fade duration '{}'", verb, args[3]))?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(format!("'{}' fade duration must be >= 0", verb));
        }
        Some(secs)
    } else {
        None
    };

    Ok(Teleport {
        map: args[0].to_string(),
        tile_x: parse_tile_coord(verb, args[1])?,
        tile_y: parse_tile_coord(verb, args[2])?,
        fade,
    })
}

pub fn parse_condition(raw: &str) -> Result<Condition, String> {
    let line = raw.trim();
    if line.is_empty() {
        return Err("empty condition".to_string());
    }

    let (first, rest) = split_first_word(line);
    let (negated, verb, rest) = match first {
        "is" => {
            let (verb, rest) = split_first_word(rest);
            (false, verb, rest)
        }
        "not" => {
            let (verb, rest) = split_first_word(rest);
            (true, verb, rest)
        }
        _ => (false, first, rest),
    };

    if verb.is_empty() {
        return Err(format!("condition '{}' has no verb", line));
    }

    let args = split_args(rest);

    let predicate = match verb {
        "player_at" => Predicate::PlayerAt,
        "player_facing" => Predicate::PlayerFacing(one_arg(verb, &args)?.parse()?),
        "player_facing_tile" => Predicate::PlayerFacingTile,
        "button_pressed" => Predicate::ButtonPressed(one_arg(verb, &args)?.parse()?),
        "music_playing" => Predicate::MusicPlaying(one_arg(verb, &args)?.to_string()),
        "variable_set" => {
            let (key, value) = parse_key_value(verb, one_arg(verb, &args)?)?;
            Predicate::VariableSet { key, value }
        }
        other => Predicate::Unknown(other.to_string()),
    };

    Ok(Condition { negated, predicate })
}

pub fn parse_action(raw: &str) -> Result<Action, String> {
    let line = raw.trim();
    if line.is_empty() {
        return Err("empty action".to_string());
    }

    let (verb, rest) = split_first_word(line);
    let args = split_args(rest);

    let action = match verb {
        "transition_teleport" => Action::TransitionTeleport(parse_teleport(verb, &args, true)?),
        "teleport" => Action::Teleport(parse_teleport(verb, &args, false)?),
        "player_face" => Action::PlayerFace(one_arg(verb, &args)?.parse()?),
        "play_music" => Action::PlayMusic(one_arg(verb, &args)?.to_string()),
        "stop_music" => Action::StopMusic,
        "translated_dialog" => Action::TranslatedDialog(one_arg(verb, &args)?.to_string()),
        // Dialog text may contain commas; keep the remainder verbatim.
        "dialog" => {
            if rest.is_empty() {
                return Err("'dialog' needs text".to_string());
            }
            Action::Dialog(rest.to_string())
        }
        "set_variable" => match parse_key_value(verb, one_arg(verb, &args)?)? {
            (key, Some(value)) => Action::SetVariable { key, value },
            (key, None) => {
                return Err(format!(
                    "'set_variable' expects <key>:<value>, got '{}'",
                    key
                ));
            }
        },
        other => Action::Unknown(other.to_string()),
    };

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_modifiers() {
        let c = parse_condition("is player_at").unwrap();
        assert!(!c.negated);
        assert_eq!(c.predicate, Predicate::PlayerAt);

        let c = parse_condition("not music_playing music_home").unwrap();
        assert!(c.negated);
        assert_eq!(c.predicate, Predicate::MusicPlaying("music_home".into()));

        let c = parse_condition("player_facing down").unwrap();
        assert!(!c.negated);
        assert_eq!(c.predicate, Predicate::PlayerFacing(Direction::Down));
    }

    #[test]
    fn test_button_names() {
        let c = parse_condition("is button_pressed K_RETURN").unwrap();
        assert_eq!(c.predicate, Predicate::ButtonPressed(Button::Interact));
        assert!(parse_condition("is button_pressed K_BOGUS").is_err());
    }

    #[test]
    fn test_unknown_verbs_are_kept() {
        let c = parse_condition("is npc_exists rival").unwrap();
        assert_eq!(c.predicate, Predicate::Unknown("npc_exists".into()));

        let a = parse_action("spawn_npc rival").unwrap();
        assert!(a.is_unknown());
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        assert!(parse_condition("is player_facing sideways").is_err());
        assert!(parse_condition("is player_facing").is_err());
        assert!(parse_condition("not").is_err());
        assert!(parse_action("transition_teleport town.tmx,1,2").is_err());
        assert!(parse_action("transition_teleport town.tmx,x,2,0.3").is_err());
        assert!(parse_action("transition_teleport town.tmx,1,2,-1").is_err());
        assert!(parse_action("set_variable only_key").is_err());
        assert!(parse_action("dialog").is_err());
    }

    #[test]
    fn test_transition_teleport_payload() {
        let a = parse_action("transition_teleport spyder_paper_town.tmx,32,6,0.3").unwrap();
        assert_eq!(
            a,
            Action::TransitionTeleport(Teleport {
                map: "spyder_paper_town.tmx".into(),
                tile_x: 32,
                tile_y: 6,
                fade: Some(0.3),
            })
        );

        let a = parse_action("teleport house.tmx, 2, 3").unwrap();
        assert_eq!(
            a,
            Action::Teleport(Teleport {
                map: "house.tmx".into(),
                tile_x: 2,
                tile_y: 3,
                fade: None,
            })
        );
    }

    #[test]
    fn test_dialog_keeps_commas() {
        let a = parse_action("dialog Hello, traveller.").unwrap();
        assert_eq!(a, Action::Dialog("Hello, traveller.".into()));
    }

    #[test]
    fn test_variables() {
        let c = parse_condition("is variable_set met_rival:yes").unwrap();
        assert_eq!(
            c.predicate,
            Predicate::VariableSet {
                key: "met_rival".into(),
                value: Some("yes".into())
            }
        );
        let c = parse_condition("not variable_set met_rival").unwrap();
        assert!(c.negated);
        assert_eq!(
            c.predicate,
            Predicate::VariableSet {
                key: "met_rival".into(),
                value: None
            }
        );
    }

    #[test]
    fn test_negated_positional_is_not_positional() {
        assert!(parse_condition("is player_at").unwrap().is_positional());
        assert!(!parse_condition("not player_at").unwrap().is_positional());
        assert!(
            !parse_condition("is player_facing up")
                .unwrap()
                .is_positional()
        );
    }
}
