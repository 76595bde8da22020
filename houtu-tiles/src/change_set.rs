use crate::tile_key::TileKey;

/// Identifies one renderer primitive.
pub type DrawableId = u64;

/// A single scene graph change for the renderer to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRequest {
    AddDrawable {
        id: DrawableId,
        tile: TileKey,
        frame: usize,
        /// Payload size in bytes.
        size: usize,
    },
    RemoveDrawable {
        id: DrawableId,
    },
    SetEnabled {
        id: DrawableId,
        enabled: bool,
    },
}

/// Changes accumulated during a pass. Handed to the renderer as a whole.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    requests: Vec<ChangeRequest>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, request: ChangeRequest) {
        self.requests.push(request);
    }
    /// Move every request from `other` onto the end of this set.
    pub fn append(&mut self, other: &mut ChangeSet) {
        self.requests.append(&mut other.requests);
    }
    /// Take the accumulated requests, leaving this set empty.
    pub fn take(&mut self) -> ChangeSet {
        std::mem::take(self)
    }
    pub fn len(&self) -> usize {
        self.requests.len()
    }
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRequest> {
        self.requests.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = ChangeRequest;
    type IntoIter = std::vec::IntoIter<ChangeRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

impl Extend<ChangeRequest> for ChangeSet {
    fn extend<T: IntoIterator<Item = ChangeRequest>>(&mut self, iter: T) {
        self.requests.extend(iter);
    }
}
