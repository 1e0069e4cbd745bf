mod actions;
mod conditions;
mod index;
mod output;
mod state;

pub use actions::{Completion, run_actions};

pub use conditions::conditions_met;

pub use index::SpatialIndex;
pub use output::{EngineEvent, Output};
pub use state::{Button, Direction, InputSnapshot, WorldState};
