use crate::epsilon::negative_pi_to_pi;

/// Mean radius used for surface distances, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}
impl Cartographic {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Cartographic::from_radians(longitude, latitude, height)
    }
    pub fn from_radians(longitude: f64, latitude: f64, height: f64) -> Self {
        Cartographic {
            longitude,
            latitude,
            height,
        }
    }
    pub fn from_degrees(longitude: f64, latitude: f64, height: f64) -> Self {
        Cartographic {
            longitude: longitude.to_radians(),
            latitude: latitude.to_radians(),
            height,
        }
    }
    pub fn to_degrees(&self) -> Self {
        Cartographic {
            longitude: self.longitude.to_degrees(),
            latitude: self.latitude.to_degrees(),
            height: self.height,
        }
    }
    pub fn equals_epsilon(self, right: Cartographic, epsilon: f64) -> bool {
        (self.longitude - right.longitude).abs() <= epsilon
            && (self.latitude - right.latitude).abs() <= epsilon
            && (self.height - right.height).abs() <= epsilon
    }
    /// Great-circle distance between the ground points of `self` and `other`, in meters.
    /// Heights are ignored.
    pub fn surface_distance(&self, other: &Cartographic) -> f64 {
        let d_lat = other.latitude - self.latitude;
        let d_lon = negative_pi_to_pi(other.longitude - self.longitude);
        let a = (d_lat * 0.5).sin().powi(2)
            + self.latitude.cos() * other.latitude.cos() * (d_lon * 0.5).sin().powi(2);
        2.0 * EARTH_RADIUS * a.sqrt().min(1.0).asin()
    }
}

#[cfg(test)]
mod tests {
    use crate::{equals_epsilon, EPSILON10};

    use super::*;

    #[test]
    fn degrees_round_trip_through_radians() {
        let c = Cartographic::from_degrees(120.0, -45.0, 12.0);
        let d = c.to_degrees();
        assert!(equals_epsilon(d.longitude, 120.0, Some(EPSILON10), None));
        assert!(equals_epsilon(d.latitude, -45.0, Some(EPSILON10), None));
        assert_eq!(d.height, 12.0);
    }

    #[test]
    fn quarter_meridian_distance() {
        let equator = Cartographic::from_degrees(0.0, 0.0, 0.0);
        let pole = Cartographic::from_degrees(0.0, 90.0, 0.0);
        let expected = EARTH_RADIUS * std::f64::consts::FRAC_PI_2;
        assert!(equals_epsilon(
            equator.surface_distance(&pole),
            expected,
            Some(EPSILON10),
            None
        ));
    }

    #[test]
    fn distance_crosses_the_antimeridian_the_short_way() {
        let west = Cartographic::from_degrees(179.0, 0.0, 0.0);
        let east = Cartographic::from_degrees(-179.0, 0.0, 0.0);
        let two_degrees = EARTH_RADIUS * 2f64.to_radians();
        assert!(equals_epsilon(
            west.surface_distance(&east),
            two_degrees,
            Some(EPSILON10),
            None
        ));
    }
}
