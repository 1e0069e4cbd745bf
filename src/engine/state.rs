use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::map::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit step in tile space; y grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!(
                "invalid direction '{}': expected up, down, left or right",
                other
            )),
        }
    }
}

/// Logical input buttons. Device mapping belongs to the input collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Interact,
    Back,
    Menu,
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both logical names and the legacy keyboard constants maps use.
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" | "K_UP" => Ok(Button::Up),
            "DOWN" | "K_DOWN" => Ok(Button::Down),
            "LEFT" | "K_LEFT" => Ok(Button::Left),
            "RIGHT" | "K_RIGHT" => Ok(Button::Right),
            "INTERACT" | "A" | "ENTER" | "RETURN" | "K_RETURN" | "K_SPACE" => {
                Ok(Button::Interact)
            }
            "BACK" | "B" | "CANCEL" | "ESCAPE" | "K_ESCAPE" => Ok(Button::Back),
            "MENU" | "START" | "K_TAB" => Ok(Button::Menu),
            other => Err(format!("unknown button '{}'", other)),
        }
    }
}

/// Buttons held down during one sampled frame.
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    pub held: HashSet<Button>,
}

impl InputSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding(buttons: impl IntoIterator<Item = Button>) -> Self {
        InputSnapshot {
            held: buttons.into_iter().collect(),
        }
    }
}

/// Live player and world state shared with the embedding application.
///
/// Conditions only ever see `&WorldState`; the action executor is the one
/// writer during a tick.
#[derive(Debug, Clone)]
pub struct WorldState {
    /// Top-left of the player's tile, in pixels.
    pub position: Point,
    pub facing: Direction,
    pub held: HashSet<Button>,
    /// Buttons that went down this frame.
    pub pressed: HashSet<Button>,
    pub music: Option<String>,
    pub map_slug: String,
    pub variables: HashMap<String, String>,
}

impl Default for WorldState {
    fn default() -> Self {
        WorldState::new(Point::default(), Direction::Down)
    }
}

impl WorldState {
    pub fn new(position: Point, facing: Direction) -> Self {
        WorldState {
            position,
            facing,
            held: HashSet::new(),
            pressed: HashSet::new(),
            music: None,
            map_slug: String::new(),
            variables: HashMap::new(),
        }
    }

    /// Record this frame's input and derive the newly-pressed edge set.
    pub(crate) fn latch_input(&mut self, input: &InputSnapshot) {
        self.pressed = input.held.difference(&self.held).copied().collect();
        self.held = input.held.clone();
    }

    pub fn is_playing(&self, track: &str) -> bool {
        self.music.as_deref() == Some(track)
    }
}
