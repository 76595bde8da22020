use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::{
    cartographic::Cartographic,
    epsilon::{equals_epsilon, negative_pi_to_pi, EPSILON14},
};

/// A geographic extent in radians. `east < west` means the rectangle crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}
impl Rectangle {
    pub const MAX_VALUE: Rectangle = Rectangle {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }
    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west: west.to_radians(),
            south: south.to_radians(),
            east: east.to_radians(),
            north: north.to_radians(),
        }
    }
    pub fn compute_width(&self) -> f64 {
        let mut east = self.east;
        if east < self.west {
            east += TAU;
        }
        east - self.west
    }
    pub fn compute_height(&self) -> f64 {
        self.north - self.south
    }
    pub fn equals_epsilon(&self, right: &Rectangle, absolute_epsilon: f64) -> bool {
        self == right
            || (self.west - right.west).abs() <= absolute_epsilon
                && (self.south - right.south).abs() <= absolute_epsilon
                && (self.east - right.east).abs() <= absolute_epsilon
                && (self.north - right.north).abs() <= absolute_epsilon
    }
    pub fn south_west(&self) -> Cartographic {
        Cartographic::new(self.west, self.south, 0.0)
    }
    pub fn north_east(&self) -> Cartographic {
        Cartographic::new(self.east, self.north, 0.0)
    }
    pub fn center(&self) -> Cartographic {
        let mut east = self.east;
        if east < self.west {
            east += TAU;
        }
        let longitude = negative_pi_to_pi((self.west + east) * 0.5);
        let latitude = (self.south + self.north) * 0.5;
        Cartographic::new(longitude, latitude, 0.0)
    }
    pub fn contains(&self, cartographic: &Cartographic) -> bool {
        let mut longitude = cartographic.longitude;
        let latitude = cartographic.latitude;
        let west = self.west;
        let mut east = self.east;
        if east < west {
            east += TAU;
            if longitude < 0.0 {
                longitude += TAU;
            }
        }
        (longitude > west || equals_epsilon(longitude, west, Some(EPSILON14), None))
            && (longitude < east || equals_epsilon(longitude, east, Some(EPSILON14), None))
            && latitude >= self.south
            && latitude <= self.north
    }
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let mut rectangle_east = self.east;
        let mut rectangle_west = self.west;
        let mut other_east = other.east;
        let mut other_west = other.west;

        if rectangle_east < rectangle_west && other_east > 0.0 {
            rectangle_east += TAU;
        } else if other_east < other_west && rectangle_east > 0.0 {
            other_east += TAU;
        }
        if rectangle_east < rectangle_west && other_west < 0.0 {
            other_west += TAU;
        } else if other_east < other_west && rectangle_west < 0.0 {
            rectangle_west += TAU;
        }

        let west = negative_pi_to_pi(rectangle_west.max(other_west));
        let east = negative_pi_to_pi(rectangle_east.min(other_east));
        if (self.west < self.east || other.west < other.east) && east <= west {
            return None;
        }
        let south = self.south.max(other.south);
        let north = self.north.min(other.north);
        if south >= north {
            return None;
        }
        Some(Rectangle::new(west, south, east, north))
    }
    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.intersection(other).is_some()
    }
    /// The point of the rectangle closest to `cartographic`, measured in longitude/latitude.
    pub fn nearest(&self, cartographic: &Cartographic) -> Cartographic {
        if self.contains(cartographic) {
            return Cartographic::new(cartographic.longitude, cartographic.latitude, 0.0);
        }
        let latitude = cartographic.latitude.clamp(self.south, self.north);
        let longitude = if self.contains(&Cartographic::new(cartographic.longitude, latitude, 0.0))
        {
            cartographic.longitude
        } else {
            let to_west = negative_pi_to_pi(self.west - cartographic.longitude).abs();
            let to_east = negative_pi_to_pi(self.east - cartographic.longitude).abs();
            if to_west <= to_east {
                self.west
            } else {
                self.east
            }
        };
        Cartographic::new(longitude, latitude, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::EPSILON15;

    use super::*;

    #[test]
    fn width_wraps_across_the_antimeridian() {
        let r = Rectangle::from_degrees(170.0, -10.0, -170.0, 10.0);
        assert!(equals_epsilon(
            r.compute_width(),
            20f64.to_radians(),
            Some(EPSILON14),
            None
        ));
        let c = r.center();
        assert!(equals_epsilon(c.longitude.abs(), PI, Some(EPSILON14), None));
    }

    #[test]
    fn contains_edges() {
        let r = Rectangle::from_degrees(-10.0, -10.0, 10.0, 10.0);
        assert!(r.contains(&Cartographic::from_degrees(10.0, 10.0, 0.0)));
        assert!(r.contains(&Cartographic::from_degrees(0.0, 0.0, 0.0)));
        assert!(!r.contains(&Cartographic::from_degrees(11.0, 0.0, 0.0)));
        assert!(!r.contains(&Cartographic::from_degrees(0.0, -11.0, 0.0)));
    }

    #[test]
    fn intersection_of_overlapping_and_disjoint() {
        let a = Rectangle::from_degrees(0.0, 0.0, 20.0, 20.0);
        let b = Rectangle::from_degrees(10.0, 10.0, 30.0, 30.0);
        let i = a.intersection(&b);
        assert!(i.is_some());
        assert!(i
            .unwrap_or_default()
            .equals_epsilon(&Rectangle::from_degrees(10.0, 10.0, 20.0, 20.0), EPSILON15));

        let c = Rectangle::from_degrees(40.0, 40.0, 50.0, 50.0);
        assert!(!a.intersects(&c));
        // edge contact is not an intersection
        let d = Rectangle::from_degrees(20.0, 0.0, 30.0, 20.0);
        assert!(!a.intersects(&d));
        assert!(Rectangle::MAX_VALUE.intersects(&a));
    }

    #[test]
    fn nearest_clamps_outside_points() {
        let r = Rectangle::from_degrees(0.0, 0.0, 10.0, 10.0);
        let inside = Cartographic::from_degrees(5.0, 5.0, 100.0);
        assert_eq!(r.nearest(&inside).height, 0.0);
        assert!(r.nearest(&inside).equals_epsilon(
            Cartographic::from_degrees(5.0, 5.0, 0.0),
            EPSILON15
        ));

        let north_east = Cartographic::from_degrees(20.0, 30.0, 0.0);
        assert!(r
            .nearest(&north_east)
            .equals_epsilon(Cartographic::from_degrees(10.0, 10.0, 0.0), EPSILON15));

        let due_west = Cartographic::from_degrees(-5.0, 5.0, 0.0);
        assert!(r
            .nearest(&due_west)
            .equals_epsilon(Cartographic::from_degrees(0.0, 5.0, 0.0), EPSILON15));
    }
}
