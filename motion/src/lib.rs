//! Trajectory generation and fixed-rate playback for a manipulator.
//!
//! Requests become a [`TrajectoryBuffer`] (minimum-jerk for two-point moves,
//! resampled waypoints for planned paths) which the [`PlaybackEngine`] plays
//! back one row per control tick.

pub mod buffer;
pub mod engine;
pub mod error;
pub mod minimum_jerk;
pub mod path;
pub mod regeneration;
pub mod resample;

pub use buffer::TrajectoryBuffer;
pub use engine::{
    EngineHandle, GripCommand, GripperSettings, Mode, MotionRequest, PlaybackEngine, PlaybackState,
    PointToPoint, Regeneration,
};
pub use error::{MotionError, Result};
pub use path::{PathPoint, PlannedPath};
pub use regeneration::RegenerationTask;
pub use resample::{ResampleMode, WaypointResampler};
