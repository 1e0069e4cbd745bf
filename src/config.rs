use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::Direction;
use crate::error::ConfigError;

#[derive(Deserialize)]
struct ConfigFile {
    game: GameConfig,
}

/// Startup settings for the harness binary, read from `game.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Relative paths are resolved against the config file's directory.
    #[serde(default = "default_maps_dir")]
    pub maps_dir: PathBuf,

    pub start_map: String,

    #[serde(default)]
    pub start_tile: [i32; 2],

    #[serde(default = "default_facing")]
    pub facing: Direction,
}

fn default_name() -> String {
    "map_events".to_string()
}

fn default_maps_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_facing() -> Direction {
    Direction::Down
}

impl GameConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        if file.game.start_map.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "game.start_map may not be empty".to_string(),
            ));
        }
        Ok(file.game)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::from_toml(&contents)?;
        if config.maps_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.maps_dir = parent.join(&config.maps_dir);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::from_toml("[game]\nstart_map = \"rival_downstairs\"\n").unwrap();
        assert_eq!(config.start_map, "rival_downstairs");
        assert_eq!(config.start_tile, [0, 0]);
        assert_eq!(config.facing, Direction::Down);
        assert_eq!(config.maps_dir, PathBuf::from("."));
    }

    #[test]
    fn test_full_config() {
        let config = GameConfig::from_toml(
            r#"
[game]
name = "Spyder"
maps_dir = "maps"
start_map = "rival_downstairs.tmx"
start_tile = [3, 4]
facing = "up"
"#,
        )
        .unwrap();
        assert_eq!(config.name, "Spyder");
        assert_eq!(config.start_tile, [3, 4]);
        assert_eq!(config.facing, Direction::Up);
    }

    #[test]
    fn test_empty_start_map_is_rejected() {
        assert!(matches!(
            GameConfig::from_toml("[game]\nstart_map = \"\"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            GameConfig::load(Path::new("/no/such/game.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
