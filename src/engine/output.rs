use serde::Serialize;

use crate::error::EngineError;

/// Requests the engine hands to its collaborators (dialog UI, renderer, audio).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    DialogRequested {
        key: String,
    },
    /// Untranslated dialog text.
    TextDialogRequested {
        text: String,
    },
    /// Emitted once the destination map is active; `duration` is the fade in seconds.
    TransitionRequested {
        map: String,
        tile_x: i32,
        tile_y: i32,
        duration: f32,
    },
    MusicRequested {
        track: String,
    },
    MusicStopped,
}

/// Everything one tick produced. No events means nothing happened.
#[derive(Default, Debug)]
pub struct Output {
    pub events: Vec<EngineEvent>,
    /// Recoverable problems; the frame loop carried on past them.
    pub errors: Vec<EngineError>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: EngineEvent) {
        self.events.push(event);
    }

    pub fn error(&mut self, err: impl Into<EngineError>) {
        self.errors.push(err.into());
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.errors.is_empty()
    }

    /// The transition this tick performed, if any.
    pub fn transition(&self) -> Option<&EngineEvent> {
        self.events
            .iter()
            .find(|e| matches!(e, EngineEvent::TransitionRequested { .. }))
    }

    pub fn dialog_key(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            EngineEvent::DialogRequested { key } => Some(key.as_str()),
            _ => None,
        })
    }
}
