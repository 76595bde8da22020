use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Camera heights, in meters, between which a layer is shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightRange {
    pub min_height: f64,
    pub max_height: f64,
}
impl HeightRange {
    pub fn new(min_height: f64, max_height: f64) -> Self {
        Self {
            min_height,
            max_height,
        }
    }
    pub fn contains(&self, height: f64) -> bool {
        self.min_height <= height && height <= self.max_height
    }
}

/// Settings for a [`QuadDisplayController`](crate::QuadDisplayController).
///
/// Every field has a default, so a JSON document only needs the keys it changes:
///
/// ```
/// let config = houtu_tiles::QuadDisplayConfig::from_json_str(r#"{"max_tiles": 64}"#).unwrap();
/// assert_eq!(config.max_tiles, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadDisplayConfig {
    pub enable: bool,
    /// Tiles ranked below this are not kept, in full quadtree mode.
    pub min_importance: f64,
    /// Capacity of the quadtree index.
    pub max_tiles: usize,
    /// Overrides the data structure's minimum zoom.
    pub min_zoom: Option<u32>,
    /// Overrides the data structure's maximum zoom.
    pub max_zoom: Option<u32>,
    /// Levels to display in single level mode. Empty means full quadtree mode.
    pub target_levels: BTreeSet<u32>,
    /// Number of animation frames per tile.
    pub num_frames: usize,
    /// Order animation frames are loaded in. Empty means `0..num_frames`.
    pub frame_loading_priority: Vec<usize>,
    /// Seconds between applied view updates in metered mode.
    pub view_update_period: f64,
    /// Meters the camera has to move before a view update is applied.
    pub min_update_dist: f64,
    /// Seconds to hold back a flush while local loads are outstanding.
    pub full_load_timeout: f64,
    /// Ignore the per frame time budget.
    pub greedy_mode: bool,
    pub metered_mode: bool,
    pub wait_for_local_loads: bool,
    pub visibility: Option<HeightRange>,
}

impl Default for QuadDisplayConfig {
    fn default() -> Self {
        Self {
            enable: true,
            min_importance: 1.0,
            max_tiles: 128,
            min_zoom: None,
            max_zoom: None,
            target_levels: BTreeSet::new(),
            num_frames: 1,
            frame_loading_priority: Vec::new(),
            view_update_period: 0.1,
            min_update_dist: 0.0,
            full_load_timeout: 4.0,
            greedy_mode: false,
            metered_mode: false,
            wait_for_local_loads: false,
            visibility: None,
        }
    }
}

impl QuadDisplayConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: QuadDisplayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tiles == 0 {
            return Err(ConfigError::Invalid("max_tiles must be positive".into()));
        }
        if self.min_importance.is_nan() {
            return Err(ConfigError::Invalid("min_importance is NaN".into()));
        }
        if self.num_frames == 0 {
            return Err(ConfigError::Invalid("num_frames must be positive".into()));
        }
        if let (Some(min_zoom), Some(max_zoom)) = (self.min_zoom, self.max_zoom) {
            if min_zoom > max_zoom {
                return Err(ConfigError::Invalid(format!(
                    "min_zoom {} is above max_zoom {}",
                    min_zoom, max_zoom
                )));
            }
        }
        if !self.frame_loading_priority.is_empty() {
            let frames: BTreeSet<usize> = self.frame_loading_priority.iter().copied().collect();
            let is_permutation = frames.len() == self.frame_loading_priority.len()
                && frames.len() == self.num_frames
                && frames.iter().all(|f| *f < self.num_frames);
            if !is_permutation {
                return Err(ConfigError::Invalid(format!(
                    "frame_loading_priority {:?} is not an ordering of 0..{}",
                    self.frame_loading_priority, self.num_frames
                )));
            }
        }
        for (name, seconds) in [
            ("view_update_period", self.view_update_period),
            ("min_update_dist", self.min_update_dist),
            ("full_load_timeout", self.full_load_timeout),
        ] {
            if !(seconds >= 0.0) || seconds.is_infinite() {
                return Err(ConfigError::Invalid(format!("{} must be >= 0", name)));
            }
        }
        if let Some(range) = self.visibility {
            if !(range.min_height <= range.max_height) {
                return Err(ConfigError::Invalid(format!(
                    "visibility range {} to {} is inverted",
                    range.min_height, range.max_height
                )));
            }
        }
        self.check_target_levels(
            self.min_zoom.unwrap_or(0),
            self.max_zoom.unwrap_or(u32::MAX),
        )
    }

    /// Target levels have to lie within the zoom range actually in use.
    pub fn check_target_levels(&self, min_zoom: u32, max_zoom: u32) -> Result<(), ConfigError> {
        match self
            .target_levels
            .iter()
            .find(|level| **level < min_zoom || **level > max_zoom)
        {
            Some(level) => Err(ConfigError::Invalid(format!(
                "target level {} is outside zoom range {}..={}",
                level, min_zoom, max_zoom
            ))),
            None => Ok(()),
        }
    }

    /// Animation frames in the order they should be loaded.
    pub fn frame_order(&self) -> Vec<usize> {
        if self.frame_loading_priority.is_empty() {
            (0..self.num_frames).collect()
        } else {
            self.frame_loading_priority.clone()
        }
    }

    pub fn view_update_period(&self) -> Duration {
        Duration::from_secs_f64(self.view_update_period)
    }

    pub fn full_load_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.full_load_timeout)
    }
}
