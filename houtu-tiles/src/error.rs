use crate::tile_key::TileKey;

/// Why a data source could not deliver a tile.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("{0}")]
    Network(String),
    #[error("tile {0} not found")]
    NotFound(TileKey),
    #[error("could not decode tile: {0}")]
    Decode(String),
    #[error("fetch was cancelled")]
    Cancelled,
}

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("tile {0} frame {1} has an empty payload")]
    EmptyPayload(TileKey, usize),
    #[error("{0}")]
    Geometry(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid quad display config: {0}")]
    Invalid(String),
}
