use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use bevy::log::trace;
use houtu_scene::{Rectangle, ViewState};

use crate::{
    delegate::QuadDataStructure,
    node_info::{NodeInfo, TileAttrs},
    tile_key::TileKey,
};

/// Importance with the key as tie breaker, a strict total order.
///
/// For equal importance the smaller key ranks higher.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    importance: f64,
    key: TileKey,
}

impl Ranked {
    fn of(node: &NodeInfo) -> Self {
        Self {
            importance: node.importance,
            key: node.key,
        }
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Ranked {}
impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.importance
            .total_cmp(&other.importance)
            .then_with(|| other.key.cmp(&self.key))
    }
}

#[derive(Debug, Clone)]
pub struct QuadtreeSettings {
    pub min_level: u32,
    pub max_level: u32,
    /// Capacity of the index.
    pub max_nodes: usize,
    /// Unforced adds below this are declined.
    pub min_importance: f64,
    /// Frames a real tile needs before it covers its parent.
    pub num_frames: usize,
}

/// How far along an animation frame is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStatus {
    pub complete: bool,
    pub tiles_loaded: usize,
}

/// Bounded, importance ordered index of resident tiles.
pub struct Quadtree {
    data_structure: Arc<dyn QuadDataStructure>,
    settings: QuadtreeSettings,
    valid_extents: Rectangle,
    view_state: ViewState,
    nodes: HashMap<TileKey, NodeInfo>,
    by_importance: BTreeSet<Ranked>,
    evals: BTreeSet<Ranked>,
    evicted: Vec<NodeInfo>,
}

impl Quadtree {
    pub fn new(data_structure: Arc<dyn QuadDataStructure>, settings: QuadtreeSettings) -> Self {
        let valid_extents = data_structure.valid_extents();
        Self {
            data_structure,
            settings,
            valid_extents,
            view_state: ViewState::default(),
            nodes: HashMap::new(),
            by_importance: BTreeSet::new(),
            evals: BTreeSet::new(),
            evicted: Vec::new(),
        }
    }

    pub fn settings(&self) -> &QuadtreeSettings {
        &self.settings
    }
    pub fn view_state(&self) -> &ViewState {
        &self.view_state
    }
    pub fn set_view_state(&mut self, view_state: ViewState) {
        self.view_state = view_state;
    }
    pub fn set_min_importance(&mut self, min_importance: f64) {
        self.settings.min_importance = min_importance;
    }

    pub fn get(&self, key: &TileKey) -> Option<&NodeInfo> {
        self.nodes.get(key)
    }
    pub fn contains(&self, key: &TileKey) -> bool {
        self.nodes.contains_key(key)
    }
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.settings.max_nodes
    }
    pub fn num_evals(&self) -> usize {
        self.evals.len()
    }
    /// Resident keys, most important first.
    pub fn keys(&self) -> Vec<TileKey> {
        self.by_importance.iter().rev().map(|r| r.key).collect()
    }

    /// Extent and importance a tile would have if it were added now.
    pub fn rank_tile(&self, key: TileKey, attrs: &mut TileAttrs) -> (Rectangle, f64) {
        let mbr = self
            .data_structure
            .tiling_scheme()
            .tile_x_y_to_rectangle(key.x, key.y, key.level);
        let importance =
            self.data_structure
                .importance_for_tile(key, &mbr, &self.view_state, attrs);
        (mbr, if importance.is_nan() { 0.0 } else { importance })
    }

    /// Insert `key`, or refresh it in place when already resident.
    ///
    /// A full index only takes the tile if it outranks the least important
    /// node that is not loading, which is then evicted. Parents whose four
    /// children are now all resident, loaded or not, are pushed onto
    /// `newly_covered`. Callers still have to check `child_coverage` before
    /// hiding such a parent.
    pub fn add_tile(
        &mut self,
        key: TileKey,
        flag_for_eval: bool,
        is_child: bool,
        newly_covered: &mut Vec<TileKey>,
    ) -> bool {
        let added = self.insert(key, flag_for_eval, false);
        if added && is_child {
            if let Some(parent) = key.parent() {
                if self.contains(&parent) && parent.children().iter().all(|c| self.contains(c)) {
                    newly_covered.push(parent);
                }
            }
        }
        added
    }

    /// Insert `key` whatever its importance, evicting even a loading node if needed.
    pub fn force_add_tile(&mut self, key: TileKey, flag_for_eval: bool) -> bool {
        self.insert(key, flag_for_eval, true)
    }

    fn insert(&mut self, key: TileKey, flag_for_eval: bool, forced: bool) -> bool {
        if let Some(mut node) = self.nodes.remove(&key) {
            let ranked = Ranked::of(&node);
            self.by_importance.remove(&ranked);
            let was_evaluating = self.evals.remove(&ranked);
            let (_, importance) = self.rank_tile(key, &mut node.attrs);
            node.importance = importance;
            let ranked = Ranked::of(&node);
            self.by_importance.insert(ranked);
            if flag_for_eval || was_evaluating {
                self.evals.insert(ranked);
            }
            self.nodes.insert(key, node);
            return true;
        }

        if key.level > self.settings.max_level {
            return false;
        }
        let mut attrs = TileAttrs::new();
        let (mbr, importance) = self.rank_tile(key, &mut attrs);
        if !forced && importance < self.settings.min_importance {
            trace!("tile {} below min importance ({})", key, importance);
            return false;
        }
        if !mbr.intersects(&self.valid_extents) {
            trace!("tile {} outside valid extents", key);
            return false;
        }

        if self.is_full() {
            let victim = self
                .least_important_node(forced)
                .filter(|victim| forced || victim.importance < importance)
                .map(|victim| victim.key);
            match victim {
                Some(victim) => {
                    if let Some(node) = self.remove_tile(&victim) {
                        trace!("tile {} evicted for {}", victim, key);
                        self.evicted.push(node);
                    }
                }
                None => return false,
            }
        }

        let mut node = NodeInfo::new(key, mbr);
        node.importance = importance;
        node.attrs = attrs;
        let ranked = Ranked::of(&node);
        self.by_importance.insert(ranked);
        if flag_for_eval {
            self.evals.insert(ranked);
        }
        self.nodes.insert(key, node);
        true
    }

    /// Nodes pushed out by inserts since the last call. They still need unloading.
    pub fn take_evicted(&mut self) -> Vec<NodeInfo> {
        std::mem::take(&mut self.evicted)
    }

    pub fn remove_tile(&mut self, key: &TileKey) -> Option<NodeInfo> {
        let node = self.nodes.remove(key)?;
        let ranked = Ranked::of(&node);
        self.by_importance.remove(&ranked);
        self.evals.remove(&ranked);
        Some(node)
    }

    /// Pop the most important node still waiting for evaluation.
    pub fn pop_last_eval(&mut self) -> Option<NodeInfo> {
        let ranked = self.evals.pop_last()?;
        self.nodes.get(&ranked.key).cloned()
    }

    pub fn least_important_node(&self, even_if_loading: bool) -> Option<&NodeInfo> {
        self.by_importance
            .iter()
            .filter_map(|ranked| self.nodes.get(&ranked.key))
            .find(|node| even_if_loading || !node.is_loading())
    }

    pub fn clear_evals(&mut self) {
        self.evals = self.by_importance.clone();
    }

    pub fn flag_for_eval(&mut self, key: &TileKey) {
        if let Some(node) = self.nodes.get(key) {
            self.evals.insert(Ranked::of(node));
        }
    }

    /// Rank every resident node again against the current view.
    pub fn reevaluate_nodes(&mut self) {
        let keys: Vec<TileKey> = self.nodes.keys().copied().collect();
        let mut by_importance = BTreeSet::new();
        let mut evals = BTreeSet::new();
        for key in keys {
            let Some(mut node) = self.nodes.remove(&key) else {
                continue;
            };
            let was_evaluating = self.evals.contains(&Ranked::of(&node));
            let (_, importance) = self.rank_tile(key, &mut node.attrs);
            node.importance = importance;
            let ranked = Ranked::of(&node);
            by_importance.insert(ranked);
            if was_evaluating {
                evals.insert(ranked);
            }
            self.nodes.insert(key, node);
        }
        self.by_importance = by_importance;
        self.evals = evals;
    }

    pub fn children_for_node(&self, key: &TileKey) -> [TileKey; 4] {
        key.children()
    }

    pub fn children_evaluating(&self, key: &TileKey) -> bool {
        key.children().iter().any(|child| {
            self.nodes
                .get(child)
                .map_or(false, |node| self.evals.contains(&Ranked::of(node)))
        })
    }

    pub fn children_loading(&self, key: &TileKey) -> bool {
        key.children().iter().any(|child| {
            self.nodes
                .get(child)
                .map_or(false, |node| node.is_loading())
        })
    }

    pub fn set_loading(&mut self, key: &TileKey, frame: usize, loading: bool) {
        if let Some(node) = self.nodes.get_mut(key) {
            if loading {
                node.loading.insert(frame);
            } else {
                node.loading.remove(&frame);
            }
        }
    }

    /// A phantom has no geometry, so it forgets what it had loaded.
    pub fn set_phantom(&mut self, key: &TileKey, phantom: bool) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.phantom = phantom;
            if phantom {
                node.loaded.clear();
            }
        }
    }

    pub fn set_failed(&mut self, key: &TileKey, failed: bool) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.failed = failed;
        }
    }

    pub fn clear_fails(&mut self) {
        for node in self.nodes.values_mut() {
            node.failed = false;
        }
    }

    pub fn did_load(&mut self, key: &TileKey, frame: usize) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.loading.remove(&frame);
            node.loaded.insert(frame);
        }
    }

    pub fn set_attrs(&mut self, key: &TileKey, attrs: TileAttrs) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.attrs = attrs;
        }
    }

    fn covers(&self, key: &TileKey) -> bool {
        self.nodes
            .get(key)
            .map_or(false, |node| node.covers(self.settings.num_frames))
    }

    /// Recompute coverage of the ancestors of `key` after it changed.
    ///
    /// Parents that gained coverage, or kept it while still real, go to
    /// `covered`. Parents that lost it go to `uncovered`. The walk goes up
    /// as long as a parent's own coverage changes.
    pub fn update_parent_coverage(
        &mut self,
        key: &TileKey,
        covered: &mut Vec<TileKey>,
        uncovered: &mut Vec<TileKey>,
    ) {
        let mut current = *key;
        while let Some(parent_key) = current.parent() {
            let Some(parent) = self.nodes.get(&parent_key) else {
                break;
            };
            let was_covered = parent.child_coverage;
            let phantom = parent.phantom;
            let covered_before = self.covers(&parent_key);
            let now_covered = parent_key.children().iter().all(|c| self.covers(c));

            if let Some(parent) = self.nodes.get_mut(&parent_key) {
                parent.child_coverage = now_covered;
            }
            if now_covered && (!was_covered || !phantom) {
                covered.push(parent_key);
            }
            if was_covered && !now_covered {
                uncovered.push(parent_key);
            }

            if covered_before == self.covers(&parent_key) {
                break;
            }
            current = parent_key;
        }
    }

    /// Whether every real tile that started loading has `frame`.
    pub fn frame_is_loaded(&self, frame: usize) -> FrameStatus {
        let mut started = 0;
        let mut tiles_loaded = 0;
        for node in self.nodes.values() {
            if node.phantom || (node.loading.is_empty() && node.loaded.is_empty()) {
                continue;
            }
            started += 1;
            if node.loaded.contains(&frame) {
                tiles_loaded += 1;
            }
        }
        FrameStatus {
            complete: started > 0 && started == tiles_loaded,
            tiles_loaded,
        }
    }

    pub fn should_load_tile(&self, key: &TileKey) -> bool {
        self.nodes
            .get(key)
            .map_or(false, |node| node.importance >= self.settings.min_importance)
    }

    /// Nodes that fell below the importance threshold and can go.
    ///
    /// Base level tiles and tiles mid-fetch are kept.
    pub fn retire_candidates(&self) -> Vec<TileKey> {
        self.by_importance
            .iter()
            .take_while(|ranked| ranked.importance < self.settings.min_importance)
            .filter_map(|ranked| self.nodes.get(&ranked.key))
            .filter(|node| node.key.level > self.settings.min_level && !node.is_loading())
            .map(|node| node.key)
            .collect()
    }

    /// Remove every node, least important first.
    pub fn drain(&mut self) -> Vec<NodeInfo> {
        let order: Vec<TileKey> = self.by_importance.iter().map(|r| r.key).collect();
        self.by_importance.clear();
        self.evals.clear();
        order
            .into_iter()
            .filter_map(|key| self.nodes.remove(&key))
            .collect()
    }
}
