use bevy::math::UVec2;

use crate::{cartographic::Cartographic, rectangle::Rectangle};

/// Maps tile addresses onto geographic extents.
///
/// Every level doubles the tile count along both axes, so the children of `(x, y, level)`
/// are `(2x..=2x+1, 2y..=2y+1, level + 1)` for any implementation.
pub trait TilingScheme: Send + Sync {
    fn get_name(&self) -> &'static str;
    fn get_rectangle(&self) -> Rectangle;
    fn get_number_of_x_tiles_at_level(&self, level: u32) -> u32;
    fn get_number_of_y_tiles_at_level(&self, level: u32) -> u32;
    fn get_number_of_tiles_at_level(&self, level: u32) -> u32 {
        self.get_number_of_x_tiles_at_level(level) * self.get_number_of_y_tiles_at_level(level)
    }
    fn tile_x_y_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle;
    fn position_to_tile_x_y(&self, position: &Cartographic, level: u32) -> Option<UVec2>;
}
