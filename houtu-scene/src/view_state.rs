use bevy::math::UVec2;

use crate::cartographic::{Cartographic, EARTH_RADIUS};

/// Camera state the tile scheduler ranks tiles against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Camera position; `height` is meters above the surface.
    pub eye: Cartographic,
    /// Vertical field of view in radians.
    pub field_of_view: f64,
    /// Frame buffer size in pixels.
    pub frame_size: UVec2,
}
impl Default for ViewState {
    fn default() -> Self {
        Self {
            eye: Cartographic::new(0.0, 0.0, 10_000_000.0),
            field_of_view: 60f64.to_radians(),
            frame_size: UVec2::new(1024, 768),
        }
    }
}
impl ViewState {
    pub fn new(eye: Cartographic, field_of_view: f64, frame_size: UVec2) -> Self {
        Self {
            eye,
            field_of_view,
            frame_size,
        }
    }
    pub fn height(&self) -> f64 {
        self.eye.height.max(0.0)
    }
    /// Ground distance from the point under the camera to the visible horizon.
    pub fn horizon_distance(&self) -> f64 {
        let h = self.height();
        (2.0 * EARTH_RADIUS * h + h * h).sqrt()
    }
    /// Ground distance between the points under two cameras.
    pub fn distance_to(&self, other: &ViewState) -> f64 {
        self.eye.surface_distance(&other.eye)
    }
}
