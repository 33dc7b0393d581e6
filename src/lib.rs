pub mod math;
pub mod error;
pub mod grammar;
pub mod buffer;
pub mod turtle;
pub mod playback;
pub mod config;
pub mod render;
pub mod export;

pub use math::{Point2, to_radians, to_degrees, normalize_angle};
pub use error::{PenroseError, Result};
pub use grammar::{Grammar, GrammarEngine, PRESET_NAMES};
pub use buffer::{Bounds, GeometryBuffer, LineSegment};
pub use turtle::{
    Location, SharedLocation, Theme, TurtleConfig, TurtleInterpreter, TurtlePose, TurtleState,
    interpret, replay, shared_location
};
pub use playback::{Playback, PlaybackParams, PlaygroundController, TickReport};
pub use config::{Config, DEFAULT_CONFIG_PATH, MAX_GENERATIONS};
pub use render::{Canvas, spawn_visualizer};
pub use export::save_png;
