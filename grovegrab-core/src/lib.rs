pub mod classifier;
pub mod client;
mod commands;
pub mod error;
pub mod progress;
pub mod state;
pub mod tracker;
pub mod types;

pub use client::{ClientConfig, HttpTaskSource, RemoteTaskSource};
pub use error::{Error, Result};
pub use state::{LoadPhase, Snapshot};
pub use tracker::{Poller, TaskTracker};
pub use types::{
    DerivedSong, PendingGroup, SongList, SongStatus, Task, TaskKind, TaskStatus, Track,
    TrackStatus, TrackerConfig, TrackerEvent,
};
