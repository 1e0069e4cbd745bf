use crate::engine::state::WorldState;
use crate::error::ScriptError;
use crate::map::{Condition, EventZone, MapModel, Predicate};

/// True if every condition of `zone` holds (logical AND, short-circuit).
///
/// A zone with no conditions is eligible while the player's anchor overlaps
/// it. Unknown predicates fail the whole zone before anything is evaluated.
pub fn conditions_met(
    zone: &EventZone,
    map: &MapModel,
    world: &WorldState,
) -> Result<bool, ScriptError> {
    if let Some(verb) = zone.conditions.iter().find_map(|c| match &c.predicate {
        Predicate::Unknown(verb) => Some(verb),
        _ => None,
    }) {
        return Err(ScriptError::UnknownPredicate {
            zone: zone.id,
            name: zone.name.clone(),
            verb: verb.clone(),
        });
    }

    if zone.conditions.is_empty() {
        return Ok(map.anchor_rect(world.position).intersects(&zone.rect));
    }

    for cond in &zone.conditions {
        if !condition_holds(cond, zone, map, world) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn condition_holds(cond: &Condition, zone: &EventZone, map: &MapModel, world: &WorldState) -> bool {
    let value = match &cond.predicate {
        Predicate::PlayerAt => map.anchor_rect(world.position).intersects(&zone.rect),
        Predicate::PlayerFacing(dir) => world.facing == *dir,
        Predicate::PlayerFacingTile => map
            .facing_rect(world.position, world.facing)
            .intersects(&zone.rect),
        Predicate::ButtonPressed(button) => world.pressed.contains(button),
        Predicate::MusicPlaying(track) => world.is_playing(track),
        Predicate::VariableSet { key, value } => match value {
            Some(v) => world.variables.get(key) == Some(v),
            None => world.variables.contains_key(key),
        },
        // Rejected up front in `conditions_met`
        Predicate::Unknown(_) => return false,
    };

    value != cond.negated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::{Button, Direction, InputSnapshot};
    use crate::map::{Point, load_map_from_str};

    fn zone_map(conditions: &[&str]) -> MapModel {
        let mut props = String::new();
        for (i, c) in conditions.iter().enumerate() {
            props.push_str(&format!("cond{} = \"{}\"\n", i + 1, c));
        }
        let doc = format!(
            r#"
[map]
width = 8
height = 8
tilewidth = 16
tileheight = 16
[map.properties]
slug = "cond_test"

[[objectgroup]]
name = "Events"
[[objectgroup.object]]
id = 1
name = "Zone"
type = "event"
x = 32
y = 32
width = 16
height = 16
[objectgroup.object.properties]
act1 = "player_face up"
{props}
"#
        );
        load_map_from_str(&doc).unwrap()
    }

    fn check(map: &MapModel, world: &WorldState) -> Result<bool, ScriptError> {
        conditions_met(&map.zones[0], map, world)
    }

    #[test]
    fn test_player_at_uses_anchor_rect() {
        let map = zone_map(&["is player_at"]);
        let mut world = WorldState::new(Point::new(32, 32), Direction::Down);
        assert_eq!(check(&map, &world), Ok(true));

        world.position = Point::new(24, 32);
        assert_eq!(check(&map, &world), Ok(true));

        world.position = Point::new(48, 32);
        assert_eq!(check(&map, &world), Ok(false));
    }

    #[test]
    fn test_player_at_and_facing() {
        let map = zone_map(&["is player_at", "is player_facing down"]);
        let mut world = WorldState::new(Point::new(32, 32), Direction::Down);
        assert_eq!(check(&map, &world), Ok(true));

        for dir in [Direction::Up, Direction::Left, Direction::Right] {
            world.facing = dir;
            assert_eq!(check(&map, &world), Ok(false));
        }
    }

    #[test]
    fn test_player_facing_tile_looks_one_tile_ahead() {
        let map = zone_map(&["is player_facing_tile"]);
        let mut world = WorldState::new(Point::new(32, 16), Direction::Down);
        assert_eq!(check(&map, &world), Ok(true));

        // Standing on the zone itself is not facing it
        world.position = Point::new(32, 32);
        assert_eq!(check(&map, &world), Ok(false));

        world.position = Point::new(16, 32);
        world.facing = Direction::Right;
        assert_eq!(check(&map, &world), Ok(true));
    }

    #[test]
    fn test_negated_music() {
        let map = zone_map(&["not music_playing music_home"]);
        let mut world = WorldState::default();
        assert_eq!(check(&map, &world), Ok(true));

        world.music = Some("music_home".into());
        assert_eq!(check(&map, &world), Ok(false));

        world.music = Some("music_battle".into());
        assert_eq!(check(&map, &world), Ok(true));
    }

    #[test]
    fn test_button_pressed_is_edge_triggered() {
        let map = zone_map(&["is button_pressed K_RETURN"]);
        let mut world = WorldState::default();
        let hold = InputSnapshot::holding([Button::Interact]);

        world.latch_input(&hold);
        assert_eq!(check(&map, &world), Ok(true));
        world.latch_input(&hold);
        assert_eq!(check(&map, &world), Ok(false));
    }

    #[test]
    fn test_variable_set() {
        let map = zone_map(&["is variable_set met_rival:yes", "not variable_set left_home"]);
        let mut world = WorldState::default();
        assert_eq!(check(&map, &world), Ok(false));

        world.variables.insert("met_rival".into(), "yes".into());
        assert_eq!(check(&map, &world), Ok(true));

        world.variables.insert("left_home".into(), "1".into());
        assert_eq!(check(&map, &world), Ok(false));
    }

    #[test]
    fn test_no_conditions_means_overlap() {
        let map = zone_map(&[]);
        let mut world = WorldState::new(Point::new(32, 32), Direction::Down);
        assert_eq!(check(&map, &world), Ok(true));
        world.position = Point::new(0, 0);
        assert_eq!(check(&map, &world), Ok(false));
    }

    #[test]
    fn test_unknown_predicate_fails_closed() {
        // Fails even though the first condition is already false
        let map = zone_map(&["is player_facing up", "is npc_exists rival"]);
        let world = WorldState::default();
        assert_eq!(
            check(&map, &world),
            Err(ScriptError::UnknownPredicate {
                zone: map.zones[0].id,
                name: "Zone".into(),
                verb: "npc_exists".into(),
            })
        );
    }
}
