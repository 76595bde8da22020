use std::fmt;

use bevy::math::UVec3;

/// Address of a quadtree cell. Ordered by level, then x, then y.
#[derive(Default, Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TileKey {
    pub level: u32,
    pub x: u32,
    pub y: u32,
}
impl TileKey {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }

    pub fn get_id(&self) -> String {
        format!("{}_{}_{}", self.x, self.y, self.level)
    }
    pub fn northwest(&self) -> TileKey {
        TileKey::new(self.x * 2, self.y * 2, self.level + 1)
    }
    pub fn northeast(&self) -> TileKey {
        TileKey::new(self.x * 2 + 1, self.y * 2, self.level + 1)
    }
    pub fn southwest(&self) -> TileKey {
        TileKey::new(self.x * 2, self.y * 2 + 1, self.level + 1)
    }
    pub fn southeast(&self) -> TileKey {
        TileKey::new(self.x * 2 + 1, self.y * 2 + 1, self.level + 1)
    }
    /// The four children, row by row from the north-west corner.
    pub fn children(&self) -> [TileKey; 4] {
        [
            self.northwest(),
            self.northeast(),
            self.southwest(),
            self.southeast(),
        ]
    }
    pub fn parent(&self) -> Option<TileKey> {
        if self.level != 0 {
            Some(TileKey::new(self.x / 2, self.y / 2, self.level - 1))
        } else {
            None
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ({}, {})", self.level, self.x, self.y)
    }
}

impl From<TileKey> for UVec3 {
    fn from(pos: TileKey) -> Self {
        UVec3::new(pos.x, pos.y, pos.level)
    }
}

impl From<UVec3> for TileKey {
    fn from(v: UVec3) -> Self {
        TileKey::new(v.x, v.y, v.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_and_parent() {
        let key = TileKey::new(3, 1, 2);
        let children = key.children();
        assert_eq!(children[0], TileKey::new(6, 2, 3));
        assert_eq!(children[1], TileKey::new(7, 2, 3));
        assert_eq!(children[2], TileKey::new(6, 3, 3));
        assert_eq!(children[3], TileKey::new(7, 3, 3));
        for child in children {
            assert_eq!(child.parent(), Some(key));
        }
        assert_eq!(TileKey::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn orders_by_level_first() {
        assert!(TileKey::new(5, 5, 1) < TileKey::new(0, 0, 2));
        assert!(TileKey::new(0, 5, 2) < TileKey::new(1, 0, 2));
        assert!(TileKey::new(1, 0, 2) < TileKey::new(1, 1, 2));
    }
}
