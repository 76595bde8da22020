use std::collections::BTreeMap;

use bevy::log::trace;

use crate::{
    change_set::{ChangeRequest, ChangeSet, DrawableId},
    error::BuildError,
    tile_key::TileKey,
};

/// Raw tile data as delivered by a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePayload {
    pub bytes: bytes::Bytes,
}

impl TilePayload {
    pub fn new(bytes: impl Into<bytes::Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Turns loaded tiles into renderer changes.
pub trait TileBuilder: Send + Sync {
    fn build_tile(
        &mut self,
        key: TileKey,
        frame: usize,
        payload: TilePayload,
        changes: &mut ChangeSet,
    ) -> Result<(), BuildError>;
    /// Remove every frame built for `key`.
    fn remove_tile(&mut self, key: TileKey, changes: &mut ChangeSet);
    /// Show only the geometry of `frame`.
    fn set_display_frame(&mut self, frame: usize, changes: &mut ChangeSet);
    /// True while the renderer still has to pick up a previous batch.
    fn swap_pending(&self) -> bool {
        false
    }
}

/// Keeps one drawable per tile and frame.
#[derive(Debug, Default)]
pub struct DrawableTileBuilder {
    next_id: DrawableId,
    drawables: BTreeMap<TileKey, BTreeMap<usize, DrawableId>>,
    display_frame: Option<usize>,
}

impl DrawableTileBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn drawable(&self, key: &TileKey, frame: usize) -> Option<DrawableId> {
        self.drawables.get(key)?.get(&frame).copied()
    }
    pub fn num_drawables(&self) -> usize {
        self.drawables.values().map(BTreeMap::len).sum()
    }
}

impl TileBuilder for DrawableTileBuilder {
    fn build_tile(
        &mut self,
        key: TileKey,
        frame: usize,
        payload: TilePayload,
        changes: &mut ChangeSet,
    ) -> Result<(), BuildError> {
        if payload.is_empty() {
            return Err(BuildError::EmptyPayload(key, frame));
        }
        let id = self.next_id;
        self.next_id += 1;
        let frames = self.drawables.entry(key).or_default();
        if let Some(old) = frames.insert(frame, id) {
            changes.push(ChangeRequest::RemoveDrawable { id: old });
        }
        trace!("drawable {} for tile {} frame {}", id, key, frame);
        changes.push(ChangeRequest::AddDrawable {
            id,
            tile: key,
            frame,
            size: payload.len(),
        });
        if let Some(display_frame) = self.display_frame {
            if display_frame != frame {
                changes.push(ChangeRequest::SetEnabled { id, enabled: false });
            }
        }
        Ok(())
    }

    fn remove_tile(&mut self, key: TileKey, changes: &mut ChangeSet) {
        if let Some(frames) = self.drawables.remove(&key) {
            changes.extend(
                frames
                    .into_values()
                    .map(|id| ChangeRequest::RemoveDrawable { id }),
            );
        }
    }

    fn set_display_frame(&mut self, frame: usize, changes: &mut ChangeSet) {
        if self.display_frame == Some(frame) {
            return;
        }
        self.display_frame = Some(frame);
        for frames in self.drawables.values() {
            for (drawable_frame, id) in frames {
                changes.push(ChangeRequest::SetEnabled {
                    id: *id,
                    enabled: *drawable_frame == frame,
                });
            }
        }
    }
}
