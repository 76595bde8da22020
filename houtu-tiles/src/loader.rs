//! Fetch bookkeeping between the controller and a [`QuadDataSource`].
//!
//! The controller runs on one thread and fetches finish on any thread. Every
//! fetch gets a ticket in a table shared with its [`FetchCallback`]. A callback
//! only counts if its ticket is still current, so results for tiles that were
//! unloaded or reloaded in the meantime are dropped. Accepted results travel
//! over a channel and are turned into [`LoadEvent`]s when the controller polls.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bevy::log::{debug, trace, warn};
use houtu_scene::{Rectangle, ViewState};

use crate::{
    builder::{TileBuilder, TilePayload},
    change_set::ChangeSet,
    config::{HeightRange, QuadDisplayConfig},
    delegate::{LoadEvent, QuadDataSource, QuadLoader},
    error::FetchError,
    node_info::NodeInfo,
    tile_key::TileKey,
};

/// Called from fetch threads after a result was queued.
pub type WakeHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoaderSettings {
    /// Meters the camera has to move before a view update goes through.
    pub min_update_dist: f64,
    /// Camera heights the layer is shown at.
    pub visibility: Option<HeightRange>,
    pub num_frames: usize,
}

impl From<&QuadDisplayConfig> for LoaderSettings {
    fn from(config: &QuadDisplayConfig) -> Self {
        Self {
            min_update_dist: config.min_update_dist,
            visibility: config.visibility,
            num_frames: config.num_frames,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Ticket {
    id: u64,
    local: bool,
}

#[derive(Debug, Default)]
struct FetchTable {
    next_ticket: u64,
    in_flight: HashMap<(TileKey, usize), Ticket>,
    /// Finished fetches waiting for the controller to poll.
    landed: HashMap<(TileKey, usize), u64>,
}

fn lock(table: &Mutex<FetchTable>) -> MutexGuard<'_, FetchTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

struct FetchOutcome {
    key: TileKey,
    frame: usize,
    ticket: u64,
    result: Result<TilePayload, FetchError>,
}

/// One fetch for a data source to perform.
pub struct FetchRequest {
    pub key: TileKey,
    pub frame: usize,
    pub mbr: Rectangle,
    /// The data source said this tile is local.
    pub local: bool,
    pub callback: FetchCallback,
}

/// Reports the result of exactly one fetch. Safe to use from any thread.
pub struct FetchCallback {
    key: TileKey,
    frame: usize,
    ticket: u64,
    table: Arc<Mutex<FetchTable>>,
    outcome_tx: async_channel::Sender<FetchOutcome>,
    wake: Option<WakeHook>,
}

impl FetchCallback {
    pub fn key(&self) -> TileKey {
        self.key
    }
    pub fn frame(&self) -> usize {
        self.frame
    }
    /// The loader no longer wants this result.
    pub fn is_cancelled(&self) -> bool {
        lock(&self.table)
            .in_flight
            .get(&(self.key, self.frame))
            .map_or(true, |ticket| ticket.id != self.ticket)
    }
    pub fn tile_loaded(self, payload: TilePayload) {
        self.finish(Ok(payload));
    }
    pub fn tile_failed(self, error: FetchError) {
        self.finish(Err(error));
    }

    fn finish(self, result: Result<TilePayload, FetchError>) {
        let slot = (self.key, self.frame);
        {
            let mut table = lock(&self.table);
            match table.in_flight.get(&slot) {
                Some(ticket) if ticket.id == self.ticket => {}
                _ => {
                    trace!("dropping late result for tile {} frame {}", self.key, self.frame);
                    return;
                }
            }
            table.in_flight.remove(&slot);
            table.landed.insert(slot, self.ticket);
            let outcome = FetchOutcome {
                key: self.key,
                frame: self.frame,
                ticket: self.ticket,
                result,
            };
            if self.outcome_tx.try_send(outcome).is_err() {
                table.landed.remove(&slot);
                debug!("loader dropped before tile {} arrived", self.key);
                return;
            }
        }
        if let Some(wake) = &self.wake {
            wake();
        }
    }
}

/// The stock [`QuadLoader`]: fetches through a data source and builds through a [`TileBuilder`].
pub struct QuadTileLoader {
    data_source: Arc<dyn QuadDataSource>,
    builder: Box<dyn TileBuilder>,
    settings: LoaderSettings,
    table: Arc<Mutex<FetchTable>>,
    outcome_tx: async_channel::Sender<FetchOutcome>,
    outcome_recv: async_channel::Receiver<FetchOutcome>,
    wake: Option<WakeHook>,
    pending: ChangeSet,
    last_view: Option<ViewState>,
}

impl QuadTileLoader {
    pub fn new(
        data_source: Arc<dyn QuadDataSource>,
        builder: Box<dyn TileBuilder>,
        settings: LoaderSettings,
    ) -> Self {
        let (outcome_tx, outcome_recv) = async_channel::unbounded();
        Self {
            data_source,
            builder,
            settings,
            table: Arc::new(Mutex::new(FetchTable::default())),
            outcome_tx,
            outcome_recv,
            wake: None,
            pending: ChangeSet::new(),
            last_view: None,
        }
    }

    pub fn set_wake_hook(&mut self, wake: WakeHook) {
        self.wake = Some(wake);
    }

    pub fn num_in_flight(&self) -> usize {
        lock(&self.table).in_flight.len()
    }
}

impl QuadLoader for QuadTileLoader {
    fn is_ready(&self) -> bool {
        self.num_in_flight() < self.data_source.max_simultaneous_fetches()
            && !self.builder.swap_pending()
    }

    fn supports_multiple_frames(&self) -> bool {
        self.settings.num_frames > 1
    }

    fn should_update(&mut self, view_state: &ViewState, is_initial: bool) -> bool {
        if let Some(range) = self.settings.visibility {
            if !range.contains(view_state.height()) {
                trace!("height {} outside visibility range", view_state.height());
                return false;
            }
        }
        if !is_initial && self.settings.min_update_dist > 0.0 {
            if let Some(last) = &self.last_view {
                let ground = last.distance_to(view_state);
                let climb = last.height() - view_state.height();
                if (ground * ground + climb * climb).sqrt() < self.settings.min_update_dist {
                    return false;
                }
            }
        }
        self.last_view = Some(*view_state);
        true
    }

    fn load_tile(&mut self, node: &mut NodeInfo, frame: usize) {
        let key = node.key;
        let slot = (key, frame);
        let local = self.data_source.tile_is_local(key, frame);
        let (ticket, replaced) = {
            let mut table = lock(&self.table);
            table.next_ticket += 1;
            let id = table.next_ticket;
            table.landed.remove(&slot);
            let replaced = table.in_flight.insert(slot, Ticket { id, local }).is_some();
            (id, replaced)
        };
        if replaced {
            self.data_source.cancel_fetch(key, frame);
        }
        trace!("fetching tile {} frame {} (local: {})", key, frame, local);

        let request = FetchRequest {
            key,
            frame,
            mbr: node.mbr,
            local,
            callback: FetchCallback {
                key,
                frame,
                ticket,
                table: self.table.clone(),
                outcome_tx: self.outcome_tx.clone(),
                wake: self.wake.clone(),
            },
        };
        self.data_source.start_fetch(request, &mut node.attrs);
    }

    fn unload_tile(&mut self, node: &NodeInfo) {
        let key = node.key;
        let cancelled: Vec<usize> = {
            let mut table = lock(&self.table);
            let frames: Vec<usize> = table
                .in_flight
                .keys()
                .filter(|(k, _)| *k == key)
                .map(|(_, frame)| *frame)
                .collect();
            for frame in &frames {
                table.in_flight.remove(&(key, *frame));
            }
            table.landed.retain(|(k, _), _| *k != key);
            frames
        };
        for frame in cancelled {
            trace!("cancelling tile {} frame {}", key, frame);
            self.data_source.cancel_fetch(key, frame);
        }
        self.builder.remove_tile(key, &mut self.pending);
    }

    fn poll_completions(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(outcome) = self.outcome_recv.try_recv() {
            let slot = (outcome.key, outcome.frame);
            let current = {
                let mut table = lock(&self.table);
                if table.landed.get(&slot) == Some(&outcome.ticket) {
                    table.landed.remove(&slot);
                    true
                } else {
                    false
                }
            };
            if !current {
                trace!("tile {} was unloaded before its result was used", outcome.key);
                continue;
            }

            let FetchOutcome {
                key, frame, result, ..
            } = outcome;
            match result {
                Ok(payload) => {
                    match self.builder.build_tile(key, frame, payload, &mut self.pending) {
                        Ok(()) => events.push(LoadEvent::Loaded { key, frame }),
                        Err(e) => {
                            warn!("could not build tile {} frame {}: {}", key, frame, e);
                            events.push(LoadEvent::Failed {
                                key,
                                frame,
                                error: FetchError::Decode(e.to_string()),
                            });
                        }
                    }
                }
                Err(error) => {
                    warn!("tile {} frame {} failed: {}", key, frame, error);
                    events.push(LoadEvent::Failed { key, frame, error });
                }
            }
        }
        events
    }

    fn end_updates(&mut self, changes: &mut ChangeSet) {
        changes.append(&mut self.pending);
    }

    fn has_local_fetches(&self) -> bool {
        lock(&self.table).in_flight.values().any(|ticket| ticket.local)
    }

    fn set_display_frame(&mut self, frame: usize) {
        self.builder.set_display_frame(frame, &mut self.pending);
    }

    fn shutdown(&mut self, changes: &mut ChangeSet) {
        let cancelled: Vec<(TileKey, usize)> = {
            let mut table = lock(&self.table);
            table.landed.clear();
            table.in_flight.drain().map(|(slot, _)| slot).collect()
        };
        for (key, frame) in cancelled {
            self.data_source.cancel_fetch(key, frame);
        }
        while self.outcome_recv.try_recv().is_ok() {}
        changes.append(&mut self.pending);
    }
}
