use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::script::{Action, Condition};
use crate::engine::Direction;

///////////////////////////
/// GEOMETRY PRIMITIVES ///
///////////////////////////

/// A position in map pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

/// Axis-aligned rectangle in pixel space. Edges are half-open: `[x, x + width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn has_positive_extent(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// True if the two rectangles share any area. Touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/////////////////////
/// MAP STRUCTURE ///
/////////////////////

/// How the map behaves at its borders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EdgePolicy {
    #[default]
    Clamped,
    Wrapped,
    Other(String),
}

impl EdgePolicy {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "clamped" => EdgePolicy::Clamped,
            "wrapped" => EdgePolicy::Wrapped,
            other => EdgePolicy::Other(other.to_string()),
        }
    }
}

/// Identifier of an object (zone or collision rectangle) inside its map document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Global-id range owned by one tileset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    pub name: String,
    pub first_gid: u32,
    pub tile_count: u32,
    /// External metadata document, when the tileset was not inline.
    pub source: Option<String>,
}

impl Tileset {
    /// One past the last global id owned by this tileset.
    pub fn end_gid(&self) -> u32 {
        self.first_gid.saturating_add(self.tile_count)
    }

    pub fn contains(&self, gid: u32) -> bool {
        gid >= self.first_gid && gid < self.end_gid()
    }
}

/// A resolved cell of a tile layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRef {
    pub gid: u32,
    /// Index into `MapModel::tilesets`.
    pub tileset: usize,
    pub local_id: u32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub flip_diagonal: bool,
}

#[derive(Debug, Clone)]
pub struct TileLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub visible: bool,
    /// Composited after the player sprite.
    pub above_player: bool,
    pub tiles: Vec<Option<TileRef>>,
}

impl TileLayer {
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((y * self.width + x) as usize)
        } else {
            None
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Option<TileRef> {
        self.index(x, y)
            .and_then(|i| self.tiles.get(i).copied().flatten())
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    Collision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionRect {
    pub id: ZoneId,
    pub rect: Rect,
    pub kind: CollisionKind,
}

/// Whether a zone can only fire while the player is near it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneScope {
    /// Gated by the player's anchor or facing tile; found through the spatial index.
    Positional,
    /// Conditions never look at the player's position; checked every frame.
    Global,
}

impl ZoneScope {
    pub fn for_conditions(conditions: &[Condition]) -> Self {
        if conditions.is_empty() || conditions.iter().any(Condition::is_positional) {
            ZoneScope::Positional
        } else {
            ZoneScope::Global
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventZone {
    pub id: ZoneId,
    pub name: String,
    pub rect: Rect,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    pub scope: ZoneScope,
}

/// Runtime map type owned by the engine while it is displayed.
#[derive(Debug, Clone)]
pub struct MapModel {
    pub slug: String,
    /// Size in tiles.
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub edges: EdgePolicy,
    pub inside: bool,
    pub scenario: Option<String>,
    pub types: Option<String>,
    /// Map-level properties that have no dedicated field.
    pub properties: BTreeMap<String, String>,
    pub tilesets: Vec<Tileset>,
    pub layers: Vec<TileLayer>,
    pub collisions: Vec<CollisionRect>,
    pub zones: Vec<EventZone>,
}

impl MapModel {
    pub fn pixel_width(&self) -> i32 {
        (self.width * self.tile_width) as i32
    }

    pub fn pixel_height(&self) -> i32 {
        (self.height * self.tile_height) as i32
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.pixel_width(), self.pixel_height())
    }

    pub fn contains_tile(&self, tile_x: i32, tile_y: i32) -> bool {
        tile_x >= 0 && tile_y >= 0 && (tile_x as u32) < self.width && (tile_y as u32) < self.height
    }

    /// Pixel origin of a tile, or `None` if the tile lies outside the map.
    pub fn tile_origin(&self, tile_x: i32, tile_y: i32) -> Option<Point> {
        if !self.contains_tile(tile_x, tile_y) {
            return None;
        }
        let x = tile_x.checked_mul(self.tile_width as i32)?;
        let y = tile_y.checked_mul(self.tile_height as i32)?;
        Some(Point::new(x, y))
    }

    /// Tile coordinate containing a pixel position.
    pub fn tile_of(&self, p: Point) -> (i32, i32) {
        (
            p.x.div_euclid(self.tile_width as i32),
            p.y.div_euclid(self.tile_height as i32),
        )
    }

    /// The player's collision anchor: one tile, with its top-left at `position`.
    pub fn anchor_rect(&self, position: Point) -> Rect {
        Rect::new(
            position.x,
            position.y,
            self.tile_width as i32,
            self.tile_height as i32,
        )
    }

    /// The tile directly in front of the player.
    pub fn facing_rect(&self, position: Point, facing: Direction) -> Rect {
        let (dx, dy) = facing.delta();
        let rect = self
            .anchor_rect(position)
            .offset(dx * self.tile_width as i32, dy * self.tile_height as i32);

        if self.edges == EdgePolicy::Wrapped && self.width > 0 && self.height > 0 {
            Rect::new(
                rect.x.rem_euclid(self.pixel_width()),
                rect.y.rem_euclid(self.pixel_height()),
                rect.width,
                rect.height,
            )
        } else {
            rect
        }
    }

    pub fn zone_by_name(&self, name: &str) -> Option<&EventZone> {
        self.zones.iter().find(|z| z.name == name)
    }

    /// Layers composited beneath the player sprite, in render order.
    pub fn layers_below_player(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers.iter().filter(|l| !l.above_player)
    }

    pub fn layers_above_player(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers.iter().filter(|l| l.above_player)
    }
}
