use std::collections::HashSet;

use super::model::{MapModel, Rect};

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        ValidationError {
            message: msg.into(),
        }
    }
}

/// Largest accepted map, in tiles.
const MAX_MAP_CELLS: u64 = 1 << 22;

/// Largest accepted map side, in pixels. Leaves headroom for rectangles one
/// tile beyond the edge.
const MAX_PIXEL_EXTENT: u64 = 1 << 28;

pub fn validate_map(map: &MapModel) -> Vec<ValidationError> {
    let mut errors: Vec<ValidationError> = Vec::new();

    if map.slug.trim().is_empty() {
        errors.push(ValidationError::new("map slug may not be empty"));
    }

    if map.width == 0 || map.height == 0 {
        errors.push(ValidationError::new(format!(
            "map size {}x{} must be positive",
            map.width, map.height
        )));
    }

    if map.tile_width == 0 || map.tile_height == 0 {
        errors.push(ValidationError::new(format!(
            "tile size {}x{} must be positive",
            map.tile_width, map.tile_height
        )));
    }

    let cells = map.width as u64 * map.height as u64;
    if cells > MAX_MAP_CELLS {
        errors.push(ValidationError::new(format!(
            "map size {}x{} exceeds {} tiles",
            map.width, map.height, MAX_MAP_CELLS
        )));
    }

    let pixel_w = map.width as u64 * map.tile_width as u64;
    let pixel_h = map.height as u64 * map.tile_height as u64;
    if pixel_w > MAX_PIXEL_EXTENT || pixel_h > MAX_PIXEL_EXTENT {
        errors.push(ValidationError::new(format!(
            "map is {}x{} pixels, limit is {} per side",
            pixel_w, pixel_h, MAX_PIXEL_EXTENT
        )));
    }

    // Layers must cover the grid exactly
    let cells = cells as usize;
    for layer in &map.layers {
        if layer.tiles.len() != cells {
            errors.push(ValidationError::new(format!(
                "layer '{}' has {} cells, expected {}",
                layer.name,
                layer.tiles.len(),
                cells
            )));
        }
        for tile in layer.tiles.iter().flatten() {
            match map.tilesets.get(tile.tileset) {
                Some(ts) if ts.contains(tile.gid) => {}
                _ => errors.push(ValidationError::new(format!(
                    "layer '{}' references gid {} outside its tileset",
                    layer.name, tile.gid
                ))),
            }
        }
    }

    // Object ids are unique across collision and event objects
    let mut seen: HashSet<u32> = HashSet::new();

    for collision in &map.collisions {
        if !seen.insert(collision.id.0) {
            errors.push(ValidationError::new(format!(
                "duplicate object id {}",
                collision.id
            )));
        }
        check_extent(&collision.rect, &format!("collision {}", collision.id), &mut errors);
    }

    for zone in &map.zones {
        if !seen.insert(zone.id.0) {
            errors.push(ValidationError::new(format!(
                "duplicate zone id {} ('{}')",
                zone.id, zone.name
            )));
        }
        if zone.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("zone {} has no name", zone.id)));
        }
        check_extent(
            &zone.rect,
            &format!("zone {} ('{}')", zone.id, zone.name),
            &mut errors,
        );
    }

    errors
}

fn check_extent(rect: &Rect, label: &str, errors: &mut Vec<ValidationError>) {
    if !rect.has_positive_extent() {
        errors.push(ValidationError::new(format!(
            "{} has non-positive extent {}x{}",
            label, rect.width, rect.height
        )));
    }

    let in_range = |v: i32| v.unsigned_abs() as u64 <= MAX_PIXEL_EXTENT * 2;
    let span_ok = |origin: i32, extent: i32| {
        in_range(origin) && origin.checked_add(extent).is_some_and(in_range)
    };
    if !span_ok(rect.x, rect.width) || !span_ok(rect.y, rect.height) {
        errors.push(ValidationError::new(format!(
            "{} at ({}, {}) size {}x{} is out of range",
            label, rect.x, rect.y, rect.width, rect.height
        )));
    }
}
