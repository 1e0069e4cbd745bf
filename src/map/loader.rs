use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use super::model::{
    CollisionKind, CollisionRect, EdgePolicy, EventZone, MapModel, Rect, TileLayer, TileRef,
    Tileset, ZoneId, ZoneScope,
};
use super::script::{Action, Condition, Predicate, parse_action, parse_condition};
use super::source::MapSource;
use super::validator::{ValidationError, validate_map};
use crate::error::LoadError;

////////////////////
/// TOML STRUCTS ///
////////////////////

#[derive(Deserialize)]
struct MapFile {
    map: MapHeader,
    #[serde(default)]
    tileset: Vec<TilesetConfig>, // [[tileset]] blocks
    #[serde(default)]
    layer: Vec<LayerConfig>, // [[layer]] blocks
    #[serde(default)]
    objectgroup: Vec<ObjectGroupConfig>, // [[objectgroup]] blocks
}

#[derive(Deserialize)]
struct MapHeader {
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    properties: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize)]
struct TilesetConfig {
    firstgid: u32,

    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    tilecount: Option<u32>,

    /// External tileset document, resolved through the map source.
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize)]
struct TilesetFile {
    tileset: TilesetHeader,
}

#[derive(Deserialize)]
struct TilesetHeader {
    name: String,
    tilecount: u32,
}

#[derive(Deserialize)]
struct LayerConfig {
    name: String,

    #[serde(default)]
    data: Vec<u32>,

    #[serde(default = "default_true")]
    visible: bool,

    #[serde(default)]
    properties: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize)]
struct ObjectGroupConfig {
    #[serde(default)]
    name: String,

    #[serde(default)]
    object: Vec<ObjectConfig>, // [[objectgroup.object]]
}

#[derive(Deserialize)]
struct ObjectConfig {
    id: u32,

    #[serde(default)]
    name: String,

    #[serde(default, rename = "type")]
    kind: String,

    x: i32,
    y: i32,
    width: i32,
    height: i32,

    #[serde(default)]
    properties: BTreeMap<String, toml::Value>,
}

// Helper for serde default
fn default_true() -> bool {
    true
}

const FLIP_HORIZONTAL: u32 = 0x8000_0000;
const FLIP_VERTICAL: u32 = 0x4000_0000;
const FLIP_DIAGONAL: u32 = 0x2000_0000;
const GID_MASK: u32 = !(FLIP_HORIZONTAL | FLIP_VERTICAL | FLIP_DIAGONAL);

////////////////////////////
/// TOML PARSER FUNCTIONS ///
////////////////////////////

/// Public API: load a map by name through a `MapSource`.
pub fn load_map(source: &dyn MapSource, name: &str) -> Result<MapModel, LoadError> {
    let doc = source.read_map(name)?;
    build_map(&doc, Some(source))
}

/// Public API: load a self-contained map document (inline tilesets only).
pub fn load_map_from_str(doc: &str) -> Result<MapModel, LoadError> {
    build_map(doc, None)
}

fn build_map(doc: &str, source: Option<&dyn MapSource>) -> Result<MapModel, LoadError> {
    let map_file: MapFile = toml::from_str(doc)?;
    let header = map_file.map;

    let mut properties: BTreeMap<String, String> = header
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), property_string(v)))
        .collect();

    let slug = properties
        .remove("slug")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| LoadError::malformed("missing required map property 'slug'"))?;

    let edges = properties
        .remove("edges")
        .map(|e| EdgePolicy::parse(&e))
        .unwrap_or_default();

    let inside = match properties.remove("inside") {
        None => false,
        Some(v) => parse_bool(&v).ok_or_else(|| {
            LoadError::malformed(format!("map property 'inside' is not a boolean: '{}'", v))
        })?,
    };

    let scenario = properties.remove("scenario");
    let types = properties.remove("types");

    let tilesets = resolve_tilesets(map_file.tileset, source)?;

    let mut issues: Vec<ValidationError> = Vec::new();

    let layers: Vec<TileLayer> = map_file
        .layer
        .into_iter()
        .map(|lc| build_layer(lc, header.width, header.height, &tilesets, &mut issues))
        .collect();

    // Objects keep their declared order across groups
    let mut collisions: Vec<CollisionRect> = Vec::new();
    let mut zones: Vec<EventZone> = Vec::new();

    for group in map_file.objectgroup {
        for obj in group.object {
            let rect = Rect::new(obj.x, obj.y, obj.width, obj.height);
            match obj.kind.trim().to_ascii_lowercase().as_str() {
                "collision" => collisions.push(CollisionRect {
                    id: ZoneId(obj.id),
                    rect,
                    kind: CollisionKind::Collision,
                }),
                "event" => zones.push(build_zone(&slug, obj, rect)?),
                other => warn!(
                    "map '{}': skipping object {} in group '{}' with unsupported type '{}'",
                    slug, obj.id, group.name, other
                ),
            }
        }
    }

    let map = MapModel {
        slug,
        width: header.width,
        height: header.height,
        tile_width: header.tilewidth,
        tile_height: header.tileheight,
        edges,
        inside,
        scenario,
        types,
        properties,
        tilesets,
        layers,
        collisions,
        zones,
    };

    issues.extend(validate_map(&map));
    if !issues.is_empty() {
        let joined = issues
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(LoadError::Malformed(format!("map '{}': {}", map.slug, joined)));
    }

    info!(
        "loaded map '{}' ({}x{} tiles, {} layers, {} collisions, {} zones)",
        map.slug,
        map.width,
        map.height,
        map.layers.len(),
        map.collisions.len(),
        map.zones.len()
    );
    Ok(map)
}

fn property_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

////////////////////////////
/// TILESET HELPERS      ///
////////////////////////////

fn resolve_tilesets(
    configs: Vec<TilesetConfig>,
    source: Option<&dyn MapSource>,
) -> Result<Vec<Tileset>, LoadError> {
    let mut tilesets: Vec<Tileset> = Vec::new();

    for tc in configs {
        if tc.firstgid == 0 {
            return Err(LoadError::UnresolvedTileset(
                "tileset firstgid must be at least 1".to_string(),
            ));
        }

        let (name, tile_count) = match (tc.tilecount, &tc.source) {
            (Some(count), _) => (
                tc.name
                    .clone()
                    .or_else(|| tc.source.clone())
                    .unwrap_or_else(|| format!("tileset@{}", tc.firstgid)),
                count,
            ),
            (None, Some(path)) => {
                let header = read_external_tileset(path, source)?;
                (tc.name.clone().unwrap_or(header.name), header.tilecount)
            }
            (None, None) => {
                return Err(LoadError::malformed(format!(
                    "tileset at firstgid {} has neither tilecount nor source",
                    tc.firstgid
                )));
            }
        };

        tilesets.push(Tileset {
            name,
            first_gid: tc.firstgid,
            tile_count,
            source: tc.source,
        });
    }

    tilesets.sort_by_key(|t| t.first_gid);

    for pair in tilesets.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.end_gid() > b.first_gid {
            return Err(LoadError::UnresolvedTileset(format!(
                "tilesets '{}' (gids {}..{}) and '{}' (from gid {}) overlap",
                a.name,
                a.first_gid,
                a.end_gid(),
                b.name,
                b.first_gid
            )));
        }
    }

    Ok(tilesets)
}

fn read_external_tileset(
    path: &str,
    source: Option<&dyn MapSource>,
) -> Result<TilesetHeader, LoadError> {
    let source = source.ok_or_else(|| {
        LoadError::UnresolvedTileset(format!(
            "external tileset '{}' needs a map source",
            path
        ))
    })?;

    let doc = source
        .read_tileset(path)
        .map_err(|e| LoadError::UnresolvedTileset(format!("'{}': {}", path, e)))?;

    let file: TilesetFile = toml::from_str(&doc)
        .map_err(|e| LoadError::UnresolvedTileset(format!("'{}': {}", path, e)))?;

    Ok(file.tileset)
}

/// Map a raw cell value to a tile reference. `Err` carries the unresolvable gid.
fn resolve_gid(raw: u32, tilesets: &[Tileset]) -> Result<Option<TileRef>, u32> {
    let gid = raw & GID_MASK;
    if gid == 0 {
        return Ok(None);
    }

    // Tilesets are sorted; the owner is the last one starting at or before gid.
    let owner = tilesets
        .iter()
        .enumerate()
        .rev()
        .find(|(_, ts)| ts.first_gid <= gid);

    match owner {
        Some((index, ts)) if ts.contains(gid) => Ok(Some(TileRef {
            gid,
            tileset: index,
            local_id: gid - ts.first_gid,
            flip_horizontal: raw & FLIP_HORIZONTAL != 0,
            flip_vertical: raw & FLIP_VERTICAL != 0,
            flip_diagonal: raw & FLIP_DIAGONAL != 0,
        })),
        _ => Err(gid),
    }
}

fn build_layer(
    lc: LayerConfig,
    width: u32,
    height: u32,
    tilesets: &[Tileset],
    issues: &mut Vec<ValidationError>,
) -> TileLayer {
    let mut bad_gids: Vec<u32> = Vec::new();

    let tiles = lc
        .data
        .iter()
        .map(|&raw| match resolve_gid(raw, tilesets) {
            Ok(tile) => tile,
            Err(gid) => {
                bad_gids.push(gid);
                None
            }
        })
        .collect();

    if !bad_gids.is_empty() {
        bad_gids.sort_unstable();
        bad_gids.dedup();
        issues.push(ValidationError::new(format!(
            "layer '{}' has invalid tile references {:?}",
            lc.name, bad_gids
        )));
    }

    let above_player = lc
        .properties
        .get("above_player")
        .map(|v| parse_bool(&property_string(v)).unwrap_or(false))
        .unwrap_or_else(|| lc.name.eq_ignore_ascii_case("above player"));

    TileLayer {
        name: lc.name,
        width,
        height,
        visible: lc.visible,
        above_player,
        tiles,
    }
}

////////////////////////////
/// EVENT ZONE HELPERS   ///
////////////////////////////

/// Collect `<prefix>1..=<prefix>N` in order, rejecting gaps and duplicates.
fn numbered_properties(
    props: &BTreeMap<String, toml::Value>,
    prefix: &str,
) -> Result<Vec<String>, String> {
    let mut numbered: BTreeMap<u32, (String, String)> = BTreeMap::new();

    for (key, value) in props {
        let Some(digits) = key.strip_prefix(prefix) else {
            continue;
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let n: u32 = digits
            .parse()
            .map_err(|_| format!("property '{}' has an invalid index", key))?;
        if let Some((prev, _)) = numbered.insert(n, (key.clone(), property_string(value))) {
            return Err(format!("properties '{}' and '{}' share index {}", prev, key, n));
        }
    }

    let mut lines = Vec::with_capacity(numbered.len());
    for (expected, (n, (key, line))) in (1u32..).zip(numbered) {
        if n != expected {
            return Err(format!(
                "'{}{}' is missing (found '{}')",
                prefix, expected, key
            ));
        }
        lines.push(line);
    }
    Ok(lines)
}

fn build_zone(slug: &str, obj: ObjectConfig, rect: Rect) -> Result<EventZone, LoadError> {
    let label = format!("map '{}' zone {} ('{}')", slug, obj.id, obj.name);

    let conditions: Vec<Condition> = numbered_properties(&obj.properties, "cond")
        .map_err(|msg| LoadError::malformed(format!("{}: {}", label, msg)))?
        .iter()
        .map(|line| parse_condition(line))
        .collect::<Result<_, _>>()
        .map_err(|msg| LoadError::malformed(format!("{}: {}", label, msg)))?;

    let actions: Vec<Action> = numbered_properties(&obj.properties, "act")
        .map_err(|msg| LoadError::malformed(format!("{}: {}", label, msg)))?
        .iter()
        .map(|line| parse_action(line))
        .collect::<Result<_, _>>()
        .map_err(|msg| LoadError::malformed(format!("{}: {}", label, msg)))?;

    for cond in &conditions {
        if let Predicate::Unknown(verb) = &cond.predicate {
            warn!("{}: unknown condition '{}' will never pass", label, verb);
        }
    }
    for action in &actions {
        if let Action::Unknown(verb) = action {
            warn!("{}: unknown action '{}' disables this zone", label, verb);
        }
    }

    let extra: HashMap<&str, &toml::Value> = obj
        .properties
        .iter()
        .filter(|(k, _)| !is_script_key(k))
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    if !extra.is_empty() {
        debug!("{}: ignoring properties {:?}", label, extra.keys());
    }

    let scope = ZoneScope::for_conditions(&conditions);

    Ok(EventZone {
        id: ZoneId(obj.id),
        name: obj.name,
        rect,
        conditions,
        actions,
        scope,
    })
}

fn is_script_key(key: &str) -> bool {
    ["cond", "act"].iter().any(|prefix| {
        key.strip_prefix(prefix)
            .is_some_and(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
    })
}
