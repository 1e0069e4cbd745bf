mod loader;
mod model;
mod script;
mod source;
mod validator;

pub use loader::{load_map, load_map_from_str};

pub use model::{
    CollisionKind, CollisionRect, EdgePolicy, EventZone, MapModel, Point, Rect, TileLayer,
    TileRef, Tileset, ZoneId, ZoneScope,
};
pub use script::{Action, Condition, Predicate, Teleport, parse_action, parse_condition};
pub use source::{DirectorySource, MapSource, MemorySource, map_stem};
pub use validator::{ValidationError, validate_map};
