#![warn(
    clippy::unwrap_used,
    clippy::cast_lossless,
    clippy::unimplemented,
    clippy::expect_used
)]
//! Quadtree tile scheduling.
//!
//! A [`QuadDisplayController`] keeps a bounded set of tiles ranked by
//! importance for the current view, decides each pass which of them to load,
//! subdivide, hide behind their children or drop, and hands the resulting
//! scene changes to the renderer as a [`ChangeSet`]. Loading goes through a
//! [`QuadLoader`]; the stock one, [`QuadTileLoader`], fetches through a
//! [`QuadDataSource`] and builds drawables with a [`TileBuilder`].
mod builder;
mod change_set;
mod clock;
mod config;
mod controller;
mod delegate;
mod error;
mod importance;
mod job_source;
mod loader;
mod node_info;
mod plugin;
mod quadtree;
mod tile_key;

#[cfg(test)]
mod testing;

pub use builder::{DrawableTileBuilder, TileBuilder, TilePayload};
pub use change_set::{ChangeRequest, ChangeSet, DrawableId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HeightRange, QuadDisplayConfig};
pub use controller::QuadDisplayController;
pub use delegate::{LoadEvent, QuadAdapter, QuadDataSource, QuadDataStructure, QuadLoader};
pub use error::{BuildError, ConfigError, FetchError};
pub use importance::ScreenImportance;
pub use job_source::{JobDataSource, TileFetcher};
pub use loader::{FetchCallback, FetchRequest, LoaderSettings, QuadTileLoader, WakeHook};
pub use node_info::{NodeInfo, TileAttrs};
pub use plugin::{QuadTiles, QuadTilesBudget, QuadTilesPlugin};
pub use quadtree::{FrameStatus, Quadtree, QuadtreeSettings};
pub use tile_key::TileKey;
