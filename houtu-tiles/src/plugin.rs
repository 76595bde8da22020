use std::time::Duration;

use bevy::prelude::*;

use crate::{change_set::ChangeSet, controller::QuadDisplayController};

/// The controller and the changes it produced since the renderer last took them.
#[derive(Resource)]
pub struct QuadTiles {
    pub controller: QuadDisplayController,
    changes: ChangeSet,
}

impl QuadTiles {
    pub fn new(controller: QuadDisplayController) -> Self {
        Self {
            controller,
            changes: ChangeSet::new(),
        }
    }
    pub fn take_changes(&mut self) -> ChangeSet {
        self.changes.take()
    }
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

#[derive(Resource, Debug, Clone, Copy)]
pub struct QuadTilesBudget {
    pub frame_interval: Duration,
    /// Share of the frame interval one pass may use.
    pub available_fraction: f64,
}

/// Runs one evaluation pass per frame on the [`QuadTiles`] resource, when present.
pub struct QuadTilesPlugin {
    pub frame_interval: Duration,
    pub available_fraction: f64,
}

impl Default for QuadTilesPlugin {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_secs_f64(1.0 / 60.0),
            available_fraction: 0.5,
        }
    }
}

impl Plugin for QuadTilesPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(QuadTilesBudget {
            frame_interval: self.frame_interval,
            available_fraction: self.available_fraction,
        })
        .add_systems(Update, eval_system);
    }
    fn name(&self) -> &str {
        "houtu_quad_tiles_plugin"
    }
}

fn eval_system(budget: Res<QuadTilesBudget>, tiles: Option<ResMut<QuadTiles>>) {
    let Some(mut tiles) = tiles else {
        return;
    };
    let tiles = &mut *tiles;
    let frame_start = tiles.controller.now();
    if tiles.controller.eval_step(
        frame_start,
        budget.frame_interval,
        budget.available_fraction,
        &mut tiles.changes,
    ) {
        trace!("{} changes waiting", tiles.changes.len());
    }
}
