use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// Where map documents and external tileset metadata come from.
pub trait MapSource {
    fn read_map(&self, name: &str) -> Result<String, LoadError>;
    fn read_tileset(&self, path: &str) -> Result<String, LoadError>;
}

/// Strip a `.tmx`/`.toml` extension so `town.tmx` and `town` name the same map.
pub fn map_stem(name: &str) -> &str {
    let name = name.trim();
    name.strip_suffix(".tmx")
        .or_else(|| name.strip_suffix(".toml"))
        .unwrap_or(name)
}

/// Reads `<root>/<stem>.toml` for maps and `<root>/<path>` for tilesets.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, path: PathBuf, name: &str) -> Result<String, LoadError> {
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(name.to_string()),
            _ => LoadError::Io {
                path: path.display().to_string(),
                source: e,
            },
        })
    }
}

impl MapSource for DirectorySource {
    fn read_map(&self, name: &str) -> Result<String, LoadError> {
        let path = self.root.join(format!("{}.toml", map_stem(name)));
        self.read(path, name)
    }

    fn read_tileset(&self, path: &str) -> Result<String, LoadError> {
        self.read(self.root.join(path), path)
    }
}

/// In-memory documents, keyed by map stem and tileset path.
#[derive(Default)]
pub struct MemorySource {
    maps: HashMap<String, String>,
    tilesets: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(mut self, name: &str, doc: impl Into<String>) -> Self {
        self.insert_map(name, doc);
        self
    }

    pub fn with_tileset(mut self, path: &str, doc: impl Into<String>) -> Self {
        self.tilesets.insert(path.to_string(), doc.into());
        self
    }

    pub fn insert_map(&mut self, name: &str, doc: impl Into<String>) {
        self.maps.insert(map_stem(name).to_string(), doc.into());
    }
}

impl MapSource for MemorySource {
    fn read_map(&self, name: &str) -> Result<String, LoadError> {
        self.maps
            .get(map_stem(name))
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }

    fn read_tileset(&self, path: &str) -> Result<String, LoadError> {
        self.tilesets
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_stem() {
        assert_eq!(map_stem("spyder_paper_town.tmx"), "spyder_paper_town");
        assert_eq!(map_stem("house.toml"), "house");
        assert_eq!(map_stem("house"), "house");
    }

    #[test]
    fn test_memory_source_lookup_ignores_extension() {
        let src = MemorySource::new().with_map("town.tmx", "doc");
        assert_eq!(src.read_map("town").unwrap(), "doc");
        assert_eq!(src.read_map("town.tmx").unwrap(), "doc");
        assert!(matches!(
            src.read_map("cave"),
            Err(LoadError::NotFound(name)) if name == "cave"
        ));
    }

    #[test]
    fn test_directory_source_missing_file_is_not_found() {
        let src = DirectorySource::new("/definitely/not/a/real/dir");
        assert!(matches!(
            src.read_map("town.tmx"),
            Err(LoadError::NotFound(_))
        ));
    }
}
