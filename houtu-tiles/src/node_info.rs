use std::collections::BTreeSet;

use houtu_scene::Rectangle;

use crate::tile_key::TileKey;

/// Free-form per tile annotations shared between the importance callback and the data source.
pub type TileAttrs = serde_json::Map<String, serde_json::Value>;

/// State the quadtree keeps for one resident tile.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub key: TileKey,
    /// Extent of the tile in radians.
    pub mbr: Rectangle,
    pub importance: f64,
    /// Resident only to track coverage, no geometry of its own.
    pub phantom: bool,
    pub failed: bool,
    /// All four children are resident and covering this tile.
    pub child_coverage: bool,
    /// Animation frames being fetched.
    pub loading: BTreeSet<usize>,
    /// Animation frames that arrived.
    pub loaded: BTreeSet<usize>,
    pub attrs: TileAttrs,
}

impl NodeInfo {
    pub fn new(key: TileKey, mbr: Rectangle) -> Self {
        Self {
            key,
            mbr,
            importance: 0.0,
            phantom: false,
            failed: false,
            child_coverage: false,
            loading: BTreeSet::new(),
            loaded: BTreeSet::new(),
            attrs: TileAttrs::new(),
        }
    }
    pub fn is_loading(&self) -> bool {
        !self.loading.is_empty()
    }
    pub fn is_fully_loaded(&self, num_frames: usize) -> bool {
        (0..num_frames).all(|frame| self.loaded.contains(&frame))
    }
    /// Whether this tile, with whatever sits under it, draws its whole extent.
    pub fn covers(&self, num_frames: usize) -> bool {
        if self.failed {
            return false;
        }
        if self.phantom {
            self.child_coverage
        } else {
            self.is_fully_loaded(num_frames)
        }
    }
}
