use thiserror::Error;

use crate::map::ZoneId;

/// Failures while turning a map document into a `MapModel`.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("map '{0}' not found")]
    NotFound(String),

    #[error("IO error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed map document: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("malformed map: {0}")]
    Malformed(String),

    #[error("unresolved tileset: {0}")]
    UnresolvedTileset(String),
}

impl LoadError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        LoadError::Malformed(msg.into())
    }
}

/// Failures evaluating or executing a single zone's script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("zone {zone} ('{name}'): unknown condition '{verb}'")]
    UnknownPredicate {
        zone: ZoneId,
        name: String,
        verb: String,
    },

    #[error("zone {zone} ('{name}'): unknown action '{verb}'")]
    UnknownAction {
        zone: ZoneId,
        name: String,
        verb: String,
    },
}

impl ScriptError {
    pub fn zone(&self) -> ZoneId {
        match self {
            ScriptError::UnknownPredicate { zone, .. } | ScriptError::UnknownAction { zone, .. } => *zone,
        }
    }
}

/// Recoverable errors surfaced to the embedding application from `Engine::tick`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transition target '{0}' not found")]
    TransitionTargetMissing(String),

    #[error("transition to '{slug}' failed: {source}")]
    TransitionFailed {
        slug: String,
        #[source]
        source: LoadError,
    },

    #[error("tile ({tile_x}, {tile_y}) is outside map '{map}'")]
    InvalidDestination {
        map: String,
        tile_x: i32,
        tile_y: i32,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("no map is loaded")]
    NoActiveMap,
}

/// Failures reading the harness configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
