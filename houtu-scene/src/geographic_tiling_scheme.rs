use bevy::math::UVec2;

use crate::{cartographic::Cartographic, rectangle::Rectangle, tiling_scheme::TilingScheme};

/// Equirectangular tiling: longitude and latitude map linearly onto tile columns and rows,
/// numbered from the north-west corner.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicTilingScheme {
    pub rectangle: Rectangle,
    pub number_of_level_zero_tiles_x: u32,
    pub number_of_level_zero_tiles_y: u32,
}
impl Default for GeographicTilingScheme {
    fn default() -> Self {
        Self {
            rectangle: Rectangle::MAX_VALUE,
            number_of_level_zero_tiles_x: 2,
            number_of_level_zero_tiles_y: 1,
        }
    }
}
impl GeographicTilingScheme {
    pub fn new(
        rectangle: Rectangle,
        number_of_level_zero_tiles_x: u32,
        number_of_level_zero_tiles_y: u32,
    ) -> Self {
        Self {
            rectangle,
            number_of_level_zero_tiles_x,
            number_of_level_zero_tiles_y,
        }
    }
    /// A scheme with one root tile covering the whole rectangle.
    pub fn single_root(rectangle: Rectangle) -> Self {
        Self::new(rectangle, 1, 1)
    }
}
impl TilingScheme for GeographicTilingScheme {
    fn get_name(&self) -> &'static str {
        "GeographicTilingScheme"
    }
    fn get_rectangle(&self) -> Rectangle {
        self.rectangle
    }
    fn get_number_of_x_tiles_at_level(&self, level: u32) -> u32 {
        self.number_of_level_zero_tiles_x << level
    }
    fn get_number_of_y_tiles_at_level(&self, level: u32) -> u32 {
        self.number_of_level_zero_tiles_y << level
    }
    fn tile_x_y_to_rectangle(&self, x: u32, y: u32, level: u32) -> Rectangle {
        let rectangle = self.rectangle;

        let x_tiles = self.get_number_of_x_tiles_at_level(level);
        let y_tiles = self.get_number_of_y_tiles_at_level(level);

        let x_tile_width = rectangle.compute_width() / f64::from(x_tiles);
        let west = f64::from(x) * x_tile_width + rectangle.west;
        let east = f64::from(x + 1) * x_tile_width + rectangle.west;

        let y_tile_height = rectangle.compute_height() / f64::from(y_tiles);
        let north = rectangle.north - f64::from(y) * y_tile_height;
        let south = rectangle.north - f64::from(y + 1) * y_tile_height;
        Rectangle::new(west, south, east, north)
    }
    fn position_to_tile_x_y(&self, coord: &Cartographic, level: u32) -> Option<UVec2> {
        let rectangle = self.rectangle;
        if !rectangle.contains(coord) {
            // outside the bounds of the tiling scheme
            return None;
        }
        let x_tiles = self.get_number_of_x_tiles_at_level(level);
        let y_tiles = self.get_number_of_y_tiles_at_level(level);

        let x_tile_width = rectangle.compute_width() / f64::from(x_tiles);
        let y_tile_height = rectangle.compute_height() / f64::from(y_tiles);

        let x_tile_coordinate =
            (((coord.longitude - rectangle.west) / x_tile_width).floor() as u32).min(x_tiles - 1);
        let y_tile_coordinate =
            (((rectangle.north - coord.latitude) / y_tile_height).floor() as u32).min(y_tiles - 1);

        Some(UVec2::new(x_tile_coordinate, y_tile_coordinate))
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use crate::{equals_epsilon, EPSILON10, EPSILON15};

    use super::*;

    #[test]
    fn return_full_rectangle_for_single_root_tile() {
        let tiling_scheme = GeographicTilingScheme::single_root(Rectangle::MAX_VALUE);
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(0, 0, 0);
        assert!(rectangle.equals_epsilon(&tiling_scheme.rectangle, EPSILON10));
    }

    #[test]
    fn tiles_are_numbered_from_the_northwest_corner() {
        let tiling_scheme = GeographicTilingScheme::new(Rectangle::MAX_VALUE, 2, 2);
        let northwest = tiling_scheme.tile_x_y_to_rectangle(0, 0, 1);
        let northeast = tiling_scheme.tile_x_y_to_rectangle(1, 0, 1);
        let southeast = tiling_scheme.tile_x_y_to_rectangle(1, 1, 1);
        let southwest = tiling_scheme.tile_x_y_to_rectangle(0, 1, 1);

        assert!(northeast.north == northwest.north);
        assert!(southeast.south == southwest.south);
        assert!(northwest.west == southwest.west);
        assert!(northeast.east == southeast.east);

        assert!(northeast.north > southeast.north);
        assert!(northwest.south > southwest.south);
        assert!(northeast.east > northwest.east);
        assert!(southeast.west > southwest.west);
    }

    #[test]
    fn adjacent_tiles_have_overlapping_coordinates() {
        let tiling_scheme = GeographicTilingScheme::new(Rectangle::MAX_VALUE, 2, 2);
        let northwest = tiling_scheme.tile_x_y_to_rectangle(0, 0, 1);
        let northeast = tiling_scheme.tile_x_y_to_rectangle(1, 0, 1);
        let southeast = tiling_scheme.tile_x_y_to_rectangle(1, 1, 1);
        let southwest = tiling_scheme.tile_x_y_to_rectangle(0, 1, 1);
        assert!(equals_epsilon(northeast.south, southeast.north, Some(EPSILON15), None));
        assert!(equals_epsilon(northwest.south, southwest.north, Some(EPSILON15), None));
        assert!(equals_epsilon(northeast.west, northwest.east, Some(EPSILON15), None));
        assert!(equals_epsilon(southeast.west, southwest.east, Some(EPSILON15), None));
    }

    #[test]
    fn tile_000() {
        let tiling_scheme = GeographicTilingScheme::default();
        let rectangle = tiling_scheme.tile_x_y_to_rectangle(0, 0, 0);
        assert!(equals_epsilon(rectangle.east, 0., Some(EPSILON15), None));
        assert!(equals_epsilon(rectangle.west, -PI, Some(EPSILON15), None));
        assert!(equals_epsilon(rectangle.north, FRAC_PI_2, Some(EPSILON15), None));
        assert!(equals_epsilon(rectangle.south, -FRAC_PI_2, Some(EPSILON15), None));
    }

    #[test]
    fn children_tile_their_parent() {
        let tiling_scheme = GeographicTilingScheme::default();
        let parent = tiling_scheme.tile_x_y_to_rectangle(1, 0, 1);
        let nw = tiling_scheme.tile_x_y_to_rectangle(2, 0, 2);
        let se = tiling_scheme.tile_x_y_to_rectangle(3, 1, 2);
        assert!(equals_epsilon(parent.west, nw.west, Some(EPSILON15), None));
        assert!(equals_epsilon(parent.north, nw.north, Some(EPSILON15), None));
        assert!(equals_epsilon(parent.east, se.east, Some(EPSILON15), None));
        assert!(equals_epsilon(parent.south, se.south, Some(EPSILON15), None));
    }

    #[test]
    fn position_to_tile() {
        let tiling_scheme = GeographicTilingScheme::default();
        let p = Cartographic::from_degrees(10.0, 10.0, 0.0);
        assert_eq!(tiling_scheme.position_to_tile_x_y(&p, 0), Some(UVec2::new(1, 0)));
        assert_eq!(tiling_scheme.position_to_tile_x_y(&p, 1), Some(UVec2::new(2, 0)));
        let corner = Cartographic::from_degrees(180.0, -90.0, 0.0);
        assert_eq!(tiling_scheme.position_to_tile_x_y(&corner, 1), Some(UVec2::new(3, 1)));
        let outside = Cartographic::new(0.0, 2.0, 0.0);
        assert_eq!(tiling_scheme.position_to_tile_x_y(&outside, 1), None);
    }
}
