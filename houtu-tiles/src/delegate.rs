//! Collaborators the display controller calls into, or reports to.
use houtu_scene::{Rectangle, TilingScheme, ViewState};

use crate::{
    change_set::ChangeSet,
    error::FetchError,
    loader::FetchRequest,
    node_info::{NodeInfo, TileAttrs},
    tile_key::TileKey,
};

/// Describes the tiled coordinate space and ranks tiles for a view.
pub trait QuadDataStructure: Send + Sync {
    fn tiling_scheme(&self) -> &dyn TilingScheme;
    /// Tiles outside this extent are never considered.
    fn valid_extents(&self) -> Rectangle {
        self.tiling_scheme().get_rectangle()
    }
    fn min_zoom(&self) -> u32;
    fn max_zoom(&self) -> u32;
    /// Rank a tile for the given view. Larger is more important, zero means not visible.
    fn importance_for_tile(
        &self,
        key: TileKey,
        mbr: &Rectangle,
        view_state: &ViewState,
        attrs: &mut TileAttrs,
    ) -> f64;
    fn new_view_state(&self, _view_state: &ViewState) {}
    fn shutdown(&self) {}
}

/// Outcome of a fetch, as seen by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Loaded {
        key: TileKey,
        frame: usize,
    },
    Failed {
        key: TileKey,
        frame: usize,
        error: FetchError,
    },
}

/// Turns the controller's load decisions into fetches and geometry.
pub trait QuadLoader: Send + Sync {
    /// False while the loader cannot take more loads.
    fn is_ready(&self) -> bool;
    fn supports_multiple_frames(&self) -> bool {
        false
    }
    /// Gate for view updates. `is_initial` is set for the first view the controller sees.
    fn should_update(&mut self, _view_state: &ViewState, _is_initial: bool) -> bool {
        true
    }
    fn load_tile(&mut self, node: &mut NodeInfo, frame: usize);
    /// Cancel fetches and release geometry for a tile. Unknown tiles are ignored.
    fn unload_tile(&mut self, node: &NodeInfo);
    /// Completions that arrived since the last call, in arrival order.
    fn poll_completions(&mut self) -> Vec<LoadEvent>;
    /// Keep collecting changes, the pass is not done.
    fn update_without_flush(&mut self) {}
    /// Hand everything collected so far to `changes`.
    fn end_updates(&mut self, changes: &mut ChangeSet);
    fn has_local_fetches(&self) -> bool {
        false
    }
    fn set_display_frame(&mut self, _frame: usize) {}
    fn shutdown(&mut self, changes: &mut ChangeSet);
}

/// Fetches tile data for a [`QuadTileLoader`](crate::QuadTileLoader).
pub trait QuadDataSource: Send + Sync {
    fn max_simultaneous_fetches(&self) -> usize;
    /// Local tiles are cheap to get, e.g. already in a cache.
    fn tile_is_local(&self, _key: TileKey, _frame: usize) -> bool {
        false
    }
    /// Start fetching. The result goes through `request.callback`, on any thread.
    fn start_fetch(&self, request: FetchRequest, attrs: &mut TileAttrs);
    fn cancel_fetch(&self, _key: TileKey, _frame: usize) {}
}

/// Lets the host react to scheduler events, e.g. by requesting a redraw.
pub trait QuadAdapter: Send + Sync {
    fn tile_did_load(&self, _key: TileKey, _frame: usize) {}
    fn tile_did_not_load(&self, _key: TileKey, _frame: usize) {}
    fn wake_up(&self) {}
}
