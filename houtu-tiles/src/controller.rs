use std::{collections::BTreeSet, sync::Arc, time::Duration};

use bevy::log::{debug, info, trace};
use houtu_scene::ViewState;
use instant::Instant;

use crate::{
    change_set::ChangeSet,
    clock::Clock,
    config::QuadDisplayConfig,
    delegate::{LoadEvent, QuadAdapter, QuadDataStructure, QuadLoader},
    error::ConfigError,
    node_info::TileAttrs,
    quadtree::{Quadtree, QuadtreeSettings},
    tile_key::TileKey,
};

/// Decides, pass by pass, which tiles to load, subdivide, hide and drop.
///
/// All methods run on one thread. Fetch results reach the controller through
/// [`QuadLoader::poll_completions`] at the start of each [`eval_step`](Self::eval_step).
pub struct QuadDisplayController {
    config: QuadDisplayConfig,
    data_structure: Arc<dyn QuadDataStructure>,
    loader: Box<dyn QuadLoader>,
    adapter: Option<Arc<dyn QuadAdapter>>,
    clock: Arc<dyn Clock>,
    quadtree: Quadtree,
    min_zoom: u32,
    max_zoom: u32,
    target_levels: BTreeSet<u32>,
    frame_order: Vec<usize>,
    /// Index into `frame_order`.
    cur_frame: usize,
    to_phantom: BTreeSet<TileKey>,
    /// Made real during this pass, not to be hidden again before the next.
    unphantomed: BTreeSet<TileKey>,
    pending_view: Option<ViewState>,
    last_view_update: Option<Instant>,
    first_view: bool,
    hold_since: Option<Instant>,
    enable: bool,
}

impl QuadDisplayController {
    pub fn new(
        config: QuadDisplayConfig,
        data_structure: Arc<dyn QuadDataStructure>,
        loader: Box<dyn QuadLoader>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let min_zoom = config.min_zoom.unwrap_or_else(|| data_structure.min_zoom());
        let max_zoom = config.max_zoom.unwrap_or_else(|| data_structure.max_zoom());
        if min_zoom > max_zoom {
            return Err(ConfigError::Invalid(format!(
                "min zoom {} is above max zoom {}",
                min_zoom, max_zoom
            )));
        }
        config.check_target_levels(min_zoom, max_zoom)?;

        let target_levels = config.target_levels.clone();
        let num_frames = if loader.supports_multiple_frames() {
            config.num_frames
        } else {
            1
        };
        let frame_order = if num_frames > 1 {
            config.frame_order()
        } else {
            vec![0]
        };
        let min_importance = if target_levels.is_empty() {
            config.min_importance
        } else {
            // single level mode keeps whatever is visible
            f64::MIN_POSITIVE
        };
        let quadtree = Quadtree::new(
            data_structure.clone(),
            QuadtreeSettings {
                min_level: min_zoom,
                max_level: max_zoom,
                max_nodes: config.max_tiles,
                min_importance,
                num_frames,
            },
        );
        info!(
            "quad display controller: zoom {}..={}, {} tiles max, {} frames",
            min_zoom, max_zoom, config.max_tiles, num_frames
        );

        Ok(Self {
            enable: config.enable,
            config,
            data_structure,
            loader,
            adapter: None,
            clock,
            quadtree,
            min_zoom,
            max_zoom,
            target_levels,
            frame_order,
            cur_frame: 0,
            to_phantom: BTreeSet::new(),
            unphantomed: BTreeSet::new(),
            pending_view: None,
            last_view_update: None,
            first_view: true,
            hold_since: None,
        })
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn QuadAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }
    pub fn set_adapter(&mut self, adapter: Arc<dyn QuadAdapter>) {
        self.adapter = Some(adapter);
    }

    pub fn config(&self) -> &QuadDisplayConfig {
        &self.config
    }
    pub fn quadtree(&self) -> &Quadtree {
        &self.quadtree
    }
    pub fn min_zoom(&self) -> u32 {
        self.min_zoom
    }
    pub fn max_zoom(&self) -> u32 {
        self.max_zoom
    }
    pub fn now(&self) -> Instant {
        self.clock.now()
    }
    pub fn is_enabled(&self) -> bool {
        self.enable
    }
    pub fn set_enable(&mut self, enable: bool) {
        if self.enable != enable {
            info!("quad display controller {}", if enable { "enabled" } else { "disabled" });
        }
        self.enable = enable;
    }

    /// Animation frame currently being loaded.
    pub fn current_frame(&self) -> usize {
        self.frame_order.get(self.cur_frame).copied().unwrap_or(0)
    }

    /// Show only `frame` of animated tiles.
    pub fn set_display_frame(&mut self, frame: usize) {
        self.loader.set_display_frame(frame);
    }

    fn target_mode(&self) -> bool {
        !self.target_levels.is_empty()
    }
    fn min_target(&self) -> u32 {
        self.target_levels.first().copied().unwrap_or(self.min_zoom)
    }
    fn max_target(&self) -> u32 {
        self.target_levels.last().copied().unwrap_or(self.max_zoom)
    }
    /// Levels that never show geometry of their own in single level mode.
    fn structural_phantom(&self, level: u32) -> bool {
        self.target_mode()
            && (level < self.min_target()
                || (level <= self.max_target() && !self.target_levels.contains(&level)))
    }
    fn depth_limit(&self) -> u32 {
        if self.target_mode() {
            self.max_target()
        } else {
            self.max_zoom
        }
    }
    fn animating(&self) -> bool {
        self.frame_order.len() > 1
    }

    /// Take a new camera position into account.
    ///
    /// In metered mode updates closer together than the view update period
    /// are held and applied by a later [`eval_step`](Self::eval_step).
    pub fn view_update(&mut self, view_state: ViewState) {
        if self.config.metered_mode && !self.view_update_due() {
            trace!("holding view update");
            self.pending_view = Some(view_state);
            return;
        }
        self.apply_view_update(view_state);
    }

    fn view_update_due(&self) -> bool {
        match self.last_view_update {
            Some(last) => {
                self.clock.now().duration_since(last) >= self.config.view_update_period()
            }
            None => true,
        }
    }

    fn apply_view_update(&mut self, view_state: ViewState) {
        self.pending_view = None;
        if !self.loader.should_update(&view_state, self.first_view) {
            trace!("loader skipped view update");
            return;
        }
        self.first_view = false;
        self.last_view_update = Some(self.clock.now());
        self.data_structure.new_view_state(&view_state);
        self.quadtree.set_view_state(view_state);
        self.quadtree.reevaluate_nodes();
        self.cur_frame = 0;
        self.reset_evaluation();
    }

    /// Flag every node for evaluation and make sure the base level is present.
    pub fn reset_evaluation(&mut self) {
        self.quadtree.clear_evals();
        let level = self.min_zoom;
        let (x_tiles, y_tiles) = {
            let scheme = self.data_structure.tiling_scheme();
            (
                scheme.get_number_of_x_tiles_at_level(level),
                scheme.get_number_of_y_tiles_at_level(level),
            )
        };
        for y in 0..y_tiles {
            for x in 0..x_tiles {
                let key = TileKey::new(x, y, level);
                let was_resident = self.quadtree.contains(&key);
                if self.quadtree.force_add_tile(key, true)
                    && !was_resident
                    && self.structural_phantom(level)
                {
                    self.quadtree.set_phantom(&key, true);
                }
            }
        }
        self.drain_evicted();
        debug!(
            "reset evaluation: {} tiles, {} to evaluate",
            self.quadtree.len(),
            self.quadtree.num_evals()
        );
    }

    /// Clear failures and evaluate everything again.
    pub fn refresh(&mut self) {
        info!("refreshing tiles");
        self.quadtree.clear_fails();
        self.reset_evaluation();
    }

    /// Drop every tile and start over from the base level.
    pub fn reset(&mut self) {
        info!("resetting {} tiles", self.quadtree.len());
        for node in self.quadtree.drain() {
            self.loader.unload_tile(&node);
        }
        self.to_phantom.clear();
        self.unphantomed.clear();
        self.cur_frame = 0;
        self.reset_evaluation();
    }

    pub fn shutdown(&mut self, changes: &mut ChangeSet) {
        info!("shutting down with {} tiles", self.quadtree.len());
        for node in self.quadtree.drain() {
            self.loader.unload_tile(&node);
        }
        self.to_phantom.clear();
        self.unphantomed.clear();
        self.pending_view = None;
        self.loader.shutdown(changes);
        self.data_structure.shutdown();
        self.enable = false;
    }

    /// Run one evaluation pass.
    ///
    /// Unless in greedy mode the pass stops once `available_fraction` of
    /// `frame_interval` has passed since `frame_start`. Returns whether
    /// anything changed.
    pub fn eval_step(
        &mut self,
        frame_start: Instant,
        frame_interval: Duration,
        available_fraction: f64,
        changes: &mut ChangeSet,
    ) -> bool {
        let mut something_happened = self.process_completions();
        if !self.enable || !self.loader.is_ready() {
            if something_happened {
                self.loader.end_updates(changes);
            }
            return something_happened;
        }
        if let Some(view_state) = self.pending_view {
            if self.view_update_due() {
                self.apply_view_update(view_state);
            }
        }

        let fraction = if available_fraction.is_nan() {
            1.0
        } else {
            available_fraction.clamp(0.0, 1.0)
        };
        let budget = frame_interval.mul_f64(fraction);
        let frame = self.current_frame();
        let mut evaluated = 0;
        while self.quadtree.num_evals() > 0 {
            if !self.config.greedy_mode && self.clock.now().duration_since(frame_start) > budget {
                debug!(
                    "out of time with {} tiles left to evaluate",
                    self.quadtree.num_evals()
                );
                break;
            }
            if !self.loader.is_ready() {
                break;
            }
            let Some(node) = self.quadtree.pop_last_eval() else {
                break;
            };
            evaluated += 1;
            if self.target_mode() {
                self.eval_target_node(node.key, frame);
            } else {
                self.eval_full_node(node.key, frame);
            }
        }
        if evaluated > 0 {
            something_happened = true;
        }

        if self.animating()
            && self.quadtree.num_evals() == 0
            && self.quadtree.frame_is_loaded(frame).complete
        {
            self.advance_frame();
        }

        for key in self.quadtree.retire_candidates() {
            self.retire(key);
            something_happened = true;
        }

        let flushed = self.flush_phantoms();
        if flushed > 0 {
            something_happened = true;
        }

        let more_work = self.quadtree.num_evals() > 0;
        let local_waiting = self.config.wait_for_local_loads && self.loader.has_local_fetches();
        if (more_work || local_waiting) && self.within_hold() {
            self.loader.update_without_flush();
        } else {
            self.hold_since = None;
            self.loader.end_updates(changes);
        }
        if more_work {
            if let Some(adapter) = &self.adapter {
                adapter.wake_up();
            }
        }
        if evaluated > 0 || flushed > 0 {
            debug!(
                "evaluated {} tiles, {} became phantoms, {} resident",
                evaluated,
                flushed,
                self.quadtree.len()
            );
        }
        something_happened
    }

    fn within_hold(&mut self) -> bool {
        let now = self.clock.now();
        let since = *self.hold_since.get_or_insert(now);
        now.duration_since(since) < self.config.full_load_timeout()
    }

    fn process_completions(&mut self) -> bool {
        let events = self.loader.poll_completions();
        let happened = !events.is_empty();
        for event in events {
            match event {
                LoadEvent::Loaded { key, frame } => self.tile_did_load(key, frame),
                LoadEvent::Failed { key, frame, error } => {
                    debug!("tile {} frame {} did not load: {}", key, frame, error);
                    self.tile_did_not_load(key, frame);
                }
            }
        }
        happened
    }

    fn eval_full_node(&mut self, key: TileKey, frame: usize) {
        let Some(node) = self.quadtree.get(&key) else {
            return;
        };
        if node.failed {
            trace!("skipping failed tile {}", key);
            return;
        }
        let needs_load =
            !node.phantom && !node.loading.contains(&frame) && !node.loaded.contains(&frame);
        if needs_load && key.level <= self.max_zoom && self.quadtree.should_load_tile(&key) {
            self.load_node(key, frame);
        } else if key.level < self.max_zoom {
            for child in key.children() {
                self.add_node(child, true);
            }
        }
    }

    fn eval_target_node(&mut self, key: TileKey, frame: usize) {
        let Some(node) = self.quadtree.get(&key).cloned() else {
            return;
        };
        let level = key.level;
        if level > self.max_target() {
            trace!("dropping tile {} above target levels", key);
            self.loader.unload_tile(&node);
            self.quadtree.remove_tile(&key);
            self.to_phantom.remove(&key);
            self.propagate_coverage(key);
            return;
        }
        if node.failed {
            return;
        }
        let needs_load = !node.loading.contains(&frame) && !node.loaded.contains(&frame);

        if level < self.min_target() {
            let child_failed = key
                .children()
                .iter()
                .any(|c| self.quadtree.get(c).map_or(false, |n| n.failed));
            if child_failed && needs_load {
                debug!("showing tile {} in place of failed children", key);
                self.load_node(key, frame);
            }
            for child in key.children() {
                self.add_node(child, true);
            }
        } else if self.target_levels.contains(&level) {
            if needs_load && !node.child_coverage {
                self.load_node(key, frame);
            }
            let started = self
                .quadtree
                .get(&key)
                .map_or(false, |n| n.loading.contains(&frame) || n.loaded.contains(&frame));
            if started && level < self.max_target() {
                for child in key.children() {
                    self.add_node(child, true);
                }
            }
        } else {
            for child in key.children() {
                self.add_node(child, true);
            }
        }
    }

    /// Add `key` for evaluation. Single level mode hides intermediate levels from the start.
    fn add_node(&mut self, key: TileKey, is_child: bool) -> bool {
        let was_resident = self.quadtree.contains(&key);
        let mut covered = Vec::new();
        let added = self.quadtree.add_tile(key, true, is_child, &mut covered);
        if added && !was_resident && self.structural_phantom(key.level) {
            self.quadtree.set_phantom(&key, true);
        }
        self.to_phantom.extend(covered);
        self.drain_evicted();
        added
    }

    fn drain_evicted(&mut self) {
        for node in self.quadtree.take_evicted() {
            self.loader.unload_tile(&node);
            self.to_phantom.remove(&node.key);
            self.propagate_coverage(node.key);
        }
    }

    /// Start loading `frame` of `key`, making room first if the index is full.
    fn load_node(&mut self, key: TileKey, frame: usize) -> bool {
        if !self.quadtree.contains(&key) {
            if self.quadtree.is_full() {
                let (_, importance) = self.quadtree.rank_tile(key, &mut TileAttrs::new());
                let victim = self
                    .quadtree
                    .least_important_node(true)
                    .filter(|victim| victim.importance < importance)
                    .cloned();
                let Some(victim) = victim else {
                    trace!("no room to load tile {}", key);
                    return false;
                };
                trace!("evicting tile {} to load {}", victim.key, key);
                self.loader.unload_tile(&victim);
                self.quadtree.remove_tile(&victim.key);
                self.to_phantom.remove(&victim.key);
                self.propagate_coverage(victim.key);
            }
            if !self.add_node(key, false) {
                return false;
            }
        }

        if self.quadtree.get(&key).map_or(false, |n| n.phantom) {
            self.quadtree.set_phantom(&key, false);
            self.unphantomed.insert(key);
        }
        self.to_phantom.remove(&key);
        self.quadtree.set_loading(&key, frame, true);
        let Some(mut node) = self.quadtree.get(&key).cloned() else {
            return false;
        };
        trace!("loading tile {} frame {}", key, frame);
        self.loader.load_tile(&mut node, frame);
        self.quadtree.set_attrs(&key, node.attrs);
        true
    }

    /// Give a phantom that lost its coverage its own geometry back.
    fn make_real(&mut self, key: TileKey) {
        let Some(node) = self.quadtree.get(&key) else {
            return;
        };
        if !node.phantom || node.failed || self.structural_phantom(key.level) {
            return;
        }
        trace!("tile {} is no longer covered", key);
        self.quadtree.set_phantom(&key, false);
        self.unphantomed.insert(key);
        self.to_phantom.remove(&key);
        self.quadtree.flag_for_eval(&key);
    }

    fn propagate_coverage(&mut self, key: TileKey) {
        let mut covered = Vec::new();
        let mut uncovered = Vec::new();
        self.quadtree
            .update_parent_coverage(&key, &mut covered, &mut uncovered);
        for parent in covered {
            if !self.quadtree.children_loading(&parent) {
                self.to_phantom.insert(parent);
            }
        }
        for parent in uncovered {
            self.make_real(parent);
        }
    }

    fn retire(&mut self, key: TileKey) {
        let Some(node) = self.quadtree.remove_tile(&key) else {
            return;
        };
        trace!("retiring tile {}", key);
        if !node.phantom {
            self.loader.unload_tile(&node);
        }
        self.to_phantom.remove(&key);
        self.propagate_coverage(key);
    }

    /// Hide the tiles queued this pass. Tiles made real during the pass wait for the next one.
    fn flush_phantoms(&mut self) -> usize {
        let mut queue: Vec<TileKey> = std::mem::take(&mut self.to_phantom).into_iter().collect();
        let mut carried = BTreeSet::new();
        let mut flushed = 0;
        while let Some(key) = queue.pop() {
            if self.unphantomed.contains(&key) {
                carried.insert(key);
                continue;
            }
            let Some(node) = self.quadtree.get(&key).cloned() else {
                continue;
            };
            // a failed child never covers, so fallback tiles stay real
            if node.phantom || !node.child_coverage {
                continue;
            }
            if self.quadtree.children_loading(&key) {
                carried.insert(key);
                continue;
            }
            trace!("tile {} becomes a phantom", key);
            self.loader.unload_tile(&node);
            self.quadtree.set_phantom(&key, true);
            flushed += 1;

            let mut covered = Vec::new();
            let mut uncovered = Vec::new();
            self.quadtree
                .update_parent_coverage(&key, &mut covered, &mut uncovered);
            queue.extend(covered);
            for parent in uncovered {
                self.make_real(parent);
            }
        }
        self.to_phantom = carried;
        self.unphantomed.clear();
        flushed
    }

    fn advance_frame(&mut self) {
        let count = self.frame_order.len();
        for step in 1..count {
            let index = (self.cur_frame + step) % count;
            let Some(frame) = self.frame_order.get(index).copied() else {
                continue;
            };
            if !self.quadtree.frame_is_loaded(frame).complete {
                info!("loading animation frame {}", frame);
                self.cur_frame = index;
                self.reset_evaluation();
                return;
            }
        }
    }

    /// A fetch finished. Late results for dropped tiles are ignored.
    pub fn tile_did_load(&mut self, key: TileKey, frame: usize) {
        let Some(node) = self.quadtree.get(&key) else {
            trace!("tile {} loaded after it was dropped", key);
            return;
        };
        if !node.loading.contains(&frame) {
            trace!("tile {} frame {} was not loading", key, frame);
            return;
        }
        self.quadtree.did_load(&key, frame);
        self.propagate_coverage(key);
        if key.level < self.depth_limit() {
            for child in key.children() {
                self.add_node(child, true);
            }
        }
        if let Some(adapter) = &self.adapter {
            adapter.tile_did_load(key, frame);
        }
    }

    /// A fetch failed. The tile stays resident as a failed phantom and its children are not tried.
    pub fn tile_did_not_load(&mut self, key: TileKey, frame: usize) {
        let Some(node) = self.quadtree.get(&key).cloned() else {
            trace!("tile {} failed after it was dropped", key);
            return;
        };
        if !node.loading.contains(&frame) {
            trace!("tile {} frame {} was not loading", key, frame);
            return;
        }
        if node.loading.len() > 1 || !node.loaded.is_empty() {
            self.loader.unload_tile(&node);
        }
        for loading in &node.loading {
            self.quadtree.set_loading(&key, *loading, false);
        }
        self.quadtree.set_phantom(&key, true);
        self.quadtree.set_failed(&key, true);
        self.to_phantom.remove(&key);

        if self.target_mode() {
            if let Some(parent) = key.parent() {
                let fallback = self.quadtree.get(&parent).map_or(false, |p| {
                    !p.failed && !p.loading.contains(&frame) && !p.loaded.contains(&frame)
                });
                if fallback {
                    debug!("loading tile {} in place of failed {}", parent, key);
                    self.load_node(parent, frame);
                }
            }
        }
        self.propagate_coverage(key);
        if let Some(adapter) = &self.adapter {
            adapter.tile_did_not_load(key, frame);
        }
    }
}
