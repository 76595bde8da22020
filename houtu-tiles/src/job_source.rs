use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bevy::log::debug;
use houtu_jobs::{AsyncReturn, Context, Job, JobHandle, JobQueue};

use crate::{
    builder::TilePayload,
    delegate::QuadDataSource,
    error::FetchError,
    loader::{FetchCallback, FetchRequest},
    node_info::TileAttrs,
    tile_key::TileKey,
};

/// Gets the bytes of one tile, e.g. over the network.
pub trait TileFetcher: Send + Sync + 'static {
    fn fetch(&self, key: TileKey, frame: usize) -> AsyncReturn<Result<TilePayload, FetchError>>;
    fn is_local(&self, _key: TileKey, _frame: usize) -> bool {
        false
    }
}

struct FetchTileJob<F> {
    fetcher: Arc<F>,
    callback: FetchCallback,
    serial: u64,
}

impl<F: TileFetcher> Job for FetchTileJob<F> {
    type Outcome = (TileKey, usize, u64);

    fn name(&self) -> String {
        format!(
            "fetch tile {} frame {}",
            self.callback.key(),
            self.callback.frame()
        )
    }

    fn perform(self, ctx: Context) -> AsyncReturn<Self::Outcome> {
        let FetchTileJob {
            fetcher,
            callback,
            serial,
        } = self;
        Box::pin(async move {
            let key = callback.key();
            let frame = callback.frame();
            if ctx.is_cancelled() || callback.is_cancelled() {
                callback.tile_failed(FetchError::Cancelled);
                return (key, frame, serial);
            }
            let result = fetcher.fetch(key, frame).await;
            if ctx.is_cancelled() {
                callback.tile_failed(FetchError::Cancelled);
            } else {
                match result {
                    Ok(payload) => callback.tile_loaded(payload),
                    Err(error) => callback.tile_failed(error),
                }
            }
            (key, frame, serial)
        })
    }
}

#[derive(Default)]
struct Running {
    next_serial: u64,
    handles: HashMap<(TileKey, usize), (u64, JobHandle)>,
}

/// Data source running every fetch as a job on the async compute pool.
pub struct JobDataSource<F: TileFetcher> {
    fetcher: Arc<F>,
    max_fetches: usize,
    running: Mutex<Running>,
    finished: JobQueue<(TileKey, usize, u64)>,
}

impl<F: TileFetcher> JobDataSource<F> {
    pub fn new(fetcher: F, max_fetches: usize) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            max_fetches,
            running: Mutex::new(Running::default()),
            finished: JobQueue::new(),
        }
    }

    /// Jobs started and not yet seen finishing.
    pub fn num_running(&self) -> usize {
        self.running().handles.len()
    }

    fn running(&self) -> MutexGuard<'_, Running> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, frame, serial) in self.finished.drain() {
            let current = matches!(running.handles.get(&(key, frame)), Some((s, _)) if *s == serial);
            if current {
                running.handles.remove(&(key, frame));
            }
        }
        running
    }
}

impl<F: TileFetcher> QuadDataSource for JobDataSource<F> {
    fn max_simultaneous_fetches(&self) -> usize {
        self.max_fetches
    }

    fn tile_is_local(&self, key: TileKey, frame: usize) -> bool {
        self.fetcher.is_local(key, frame)
    }

    fn start_fetch(&self, request: FetchRequest, _attrs: &mut TileAttrs) {
        let slot = (request.key, request.frame);
        let mut running = self.running();
        running.next_serial += 1;
        let serial = running.next_serial;
        let handle = self.finished.spawn(FetchTileJob {
            fetcher: self.fetcher.clone(),
            callback: request.callback,
            serial,
        });
        if let Some((_, replaced)) = running.handles.insert(slot, (serial, handle)) {
            replaced.cancel();
        }
    }

    fn cancel_fetch(&self, key: TileKey, frame: usize) {
        if let Some((_, handle)) = self.running().handles.remove(&(key, frame)) {
            debug!("cancelling job '{}'", handle.name());
            handle.cancel();
        }
    }
}
