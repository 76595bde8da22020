use houtu_scene::{Rectangle, TilingScheme, ViewState, EARTH_RADIUS};

use crate::{delegate::QuadDataStructure, node_info::TileAttrs, tile_key::TileKey};

/// Ranks tiles by roughly how many pixels they cover on screen.
///
/// The tile is treated as a square of its larger ground dimension, seen
/// face-on from the camera's distance to the nearest point of the tile.
/// Tiles past the horizon rank zero.
pub struct ScreenImportance<T: TilingScheme> {
    tiling_scheme: T,
    min_zoom: u32,
    max_zoom: u32,
    valid_extents: Option<Rectangle>,
}

impl<T: TilingScheme> ScreenImportance<T> {
    pub fn new(tiling_scheme: T, min_zoom: u32, max_zoom: u32) -> Self {
        Self {
            tiling_scheme,
            min_zoom,
            max_zoom,
            valid_extents: None,
        }
    }
    pub fn with_valid_extents(mut self, valid_extents: Rectangle) -> Self {
        self.valid_extents = Some(valid_extents);
        self
    }

    /// Approximate pixel area of `mbr` for `view_state`.
    pub fn screen_area(mbr: &Rectangle, view_state: &ViewState) -> f64 {
        let eye = &view_state.eye;
        let nearest = mbr.nearest(eye);
        let ground = eye.surface_distance(&nearest);
        if ground > view_state.horizon_distance() {
            return 0.0;
        }
        let height = view_state.height();
        let distance = (ground * ground + height * height).sqrt().max(1.0);

        let width = mbr.compute_width() * EARTH_RADIUS * nearest.latitude.cos().abs();
        let tall = mbr.compute_height() * EARTH_RADIUS;
        let size = width.max(tall);
        let angle = 2.0 * (size * 0.5 / distance).atan();
        let pixels = angle / view_state.field_of_view * f64::from(view_state.frame_size.y);
        pixels * pixels
    }
}

impl<T: TilingScheme> QuadDataStructure for ScreenImportance<T> {
    fn tiling_scheme(&self) -> &dyn TilingScheme {
        &self.tiling_scheme
    }
    fn valid_extents(&self) -> Rectangle {
        self.valid_extents
            .unwrap_or_else(|| self.tiling_scheme.get_rectangle())
    }
    fn min_zoom(&self) -> u32 {
        self.min_zoom
    }
    fn max_zoom(&self) -> u32 {
        self.max_zoom
    }
    fn importance_for_tile(
        &self,
        _key: TileKey,
        mbr: &Rectangle,
        view_state: &ViewState,
        _attrs: &mut TileAttrs,
    ) -> f64 {
        Self::screen_area(mbr, view_state)
    }
}

#[cfg(test)]
mod tests {
    use bevy::math::UVec2;
    use houtu_scene::{Cartographic, GeographicTilingScheme};

    use super::*;

    fn view(lon: f64, lat: f64, height: f64) -> ViewState {
        ViewState::new(
            Cartographic::from_degrees(lon, lat, height),
            60f64.to_radians(),
            UVec2::new(1024, 768),
        )
    }

    fn rank(structure: &impl QuadDataStructure, key: TileKey, view: &ViewState) -> f64 {
        let mbr = structure
            .tiling_scheme()
            .tile_x_y_to_rectangle(key.x, key.y, key.level);
        structure.importance_for_tile(key, &mbr, view, &mut TileAttrs::new())
    }

    #[test]
    fn closer_tiles_rank_higher() {
        let structure = ScreenImportance::new(GeographicTilingScheme::default(), 0, 18);
        // level 4 tile (16, 6) spans 0..11.25 east, 11.25..22.5 north
        let key = TileKey::new(16, 6, 4);
        let near = rank(&structure, key, &view(5.0, 15.0, 100_000.0));
        let far = rank(&structure, key, &view(5.0, 15.0, 2_000_000.0));
        assert!(near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn children_rank_below_parent() {
        let structure = ScreenImportance::new(GeographicTilingScheme::default(), 0, 18);
        let parent = TileKey::new(16, 6, 4);
        let eye = view(5.0, 15.0, 500_000.0);
        let parent_rank = rank(&structure, parent, &eye);
        for child in parent.children() {
            assert!(rank(&structure, child, &eye) < parent_rank);
        }
    }

    #[test]
    fn tiles_past_the_horizon_rank_zero() {
        let structure = ScreenImportance::new(GeographicTilingScheme::default(), 0, 18);
        // camera over the prime meridian, tile on the far side of the globe
        let key = TileKey::new(0, 6, 4);
        assert_eq!(rank(&structure, key, &view(5.0, 15.0, 10_000.0)), 0.0);
    }
}
