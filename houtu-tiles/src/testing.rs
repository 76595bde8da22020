//! Recording doubles shared by the scheduler tests.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use houtu_scene::{GeographicTilingScheme, Rectangle, TilingScheme, ViewState};

use crate::{
    change_set::ChangeSet,
    delegate::{LoadEvent, QuadAdapter, QuadDataStructure, QuadLoader},
    error::FetchError,
    node_info::{NodeInfo, TileAttrs},
    tile_key::TileKey,
};

type ImportanceFn = Arc<dyn Fn(TileKey) -> f64 + Send + Sync>;

/// One root tile over the whole globe, every tile at importance 100 unless told otherwise.
#[derive(Clone)]
pub struct TestStructure {
    scheme: GeographicTilingScheme,
    min_zoom: u32,
    max_zoom: u32,
    valid_extents: Option<Rectangle>,
    importance: ImportanceFn,
    overrides: Arc<Mutex<HashMap<TileKey, f64>>>,
}

impl TestStructure {
    pub fn new(min_zoom: u32, max_zoom: u32) -> Self {
        Self {
            scheme: GeographicTilingScheme::single_root(Rectangle::MAX_VALUE),
            min_zoom,
            max_zoom,
            valid_extents: None,
            importance: Arc::new(|_| 100.0),
            overrides: Arc::new(Mutex::new(HashMap::new())),
        }
    }
    pub fn with_importance(mut self, f: impl Fn(TileKey) -> f64 + Send + Sync + 'static) -> Self {
        self.importance = Arc::new(f);
        self
    }
    pub fn with_valid_extents(mut self, extents: Rectangle) -> Self {
        self.valid_extents = Some(extents);
        self
    }
    pub fn set_importance(&self, key: TileKey, importance: f64) {
        self.overrides.lock().unwrap().insert(key, importance);
    }
}

impl QuadDataStructure for TestStructure {
    fn tiling_scheme(&self) -> &dyn TilingScheme {
        &self.scheme
    }
    fn valid_extents(&self) -> Rectangle {
        self.valid_extents
            .unwrap_or_else(|| self.scheme.get_rectangle())
    }
    fn min_zoom(&self) -> u32 {
        self.min_zoom
    }
    fn max_zoom(&self) -> u32 {
        self.max_zoom
    }
    fn importance_for_tile(
        &self,
        key: TileKey,
        _mbr: &Rectangle,
        _view_state: &ViewState,
        _attrs: &mut TileAttrs,
    ) -> f64 {
        if let Some(importance) = self.overrides.lock().unwrap().get(&key) {
            return *importance;
        }
        (self.importance)(key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoaderCall {
    Load(TileKey, usize),
    Unload(TileKey),
    UpdateWithoutFlush,
    EndUpdates,
    Shutdown,
}

struct LoaderState {
    calls: Vec<LoaderCall>,
    completions: Vec<LoadEvent>,
    ready: bool,
    should_update: bool,
}

/// Test side handle onto a [`RecordingLoader`] owned by a controller.
#[derive(Clone)]
pub struct LoaderProbe {
    state: Arc<Mutex<LoaderState>>,
}

impl LoaderProbe {
    pub fn calls(&self) -> Vec<LoaderCall> {
        self.state.lock().unwrap().calls.clone()
    }
    pub fn loads(&self) -> Vec<(TileKey, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LoaderCall::Load(key, frame) => Some((key, frame)),
                _ => None,
            })
            .collect()
    }
    pub fn unloads(&self) -> Vec<TileKey> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                LoaderCall::Unload(key) => Some(key),
                _ => None,
            })
            .collect()
    }
    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }
    pub fn complete(&self, key: TileKey, frame: usize) {
        self.state
            .lock()
            .unwrap()
            .completions
            .push(LoadEvent::Loaded { key, frame });
    }
    pub fn fail(&self, key: TileKey, frame: usize) {
        self.state.lock().unwrap().completions.push(LoadEvent::Failed {
            key,
            frame,
            error: FetchError::Network("unreachable".into()),
        });
    }
    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }
    pub fn set_should_update(&self, should_update: bool) {
        self.state.lock().unwrap().should_update = should_update;
    }
}

/// Records every call and completes loads only when the probe says so.
pub struct RecordingLoader {
    state: Arc<Mutex<LoaderState>>,
    multiple_frames: bool,
}

impl RecordingLoader {
    pub fn new() -> (Self, LoaderProbe) {
        let state = Arc::new(Mutex::new(LoaderState {
            calls: Vec::new(),
            completions: Vec::new(),
            ready: true,
            should_update: true,
        }));
        (
            Self {
                state: state.clone(),
                multiple_frames: false,
            },
            LoaderProbe { state },
        )
    }
    pub fn with_multiple_frames(mut self) -> Self {
        self.multiple_frames = true;
        self
    }
    fn record(&self, call: LoaderCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl QuadLoader for RecordingLoader {
    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }
    fn supports_multiple_frames(&self) -> bool {
        self.multiple_frames
    }
    fn should_update(&mut self, _view_state: &ViewState, _is_initial: bool) -> bool {
        self.state.lock().unwrap().should_update
    }
    fn load_tile(&mut self, node: &mut NodeInfo, frame: usize) {
        self.record(LoaderCall::Load(node.key, frame));
    }
    fn unload_tile(&mut self, node: &NodeInfo) {
        self.record(LoaderCall::Unload(node.key));
    }
    fn poll_completions(&mut self) -> Vec<LoadEvent> {
        std::mem::take(&mut self.state.lock().unwrap().completions)
    }
    fn update_without_flush(&mut self) {
        self.record(LoaderCall::UpdateWithoutFlush);
    }
    fn end_updates(&mut self, _changes: &mut ChangeSet) {
        self.record(LoaderCall::EndUpdates);
    }
    fn shutdown(&mut self, _changes: &mut ChangeSet) {
        self.record(LoaderCall::Shutdown);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    Loaded(TileKey, usize),
    NotLoaded(TileKey, usize),
    WakeUp,
}

#[derive(Default, Clone)]
pub struct RecordingAdapter {
    calls: Arc<Mutex<Vec<AdapterCall>>>,
}

impl RecordingAdapter {
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl QuadAdapter for RecordingAdapter {
    fn tile_did_load(&self, key: TileKey, frame: usize) {
        self.calls.lock().unwrap().push(AdapterCall::Loaded(key, frame));
    }
    fn tile_did_not_load(&self, key: TileKey, frame: usize) {
        self.calls
            .lock()
            .unwrap()
            .push(AdapterCall::NotLoaded(key, frame));
    }
    fn wake_up(&self) {
        self.calls.lock().unwrap().push(AdapterCall::WakeUp);
    }
}
