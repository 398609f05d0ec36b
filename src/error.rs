use thiserror::Error;

/// Malformed piece geometry, rejected before any search starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("piece '{piece_id}' has {count} distinct vertices, at least 3 are required")]
    TooFewVertices { piece_id: String, count: usize },

    #[error("piece '{piece_id}' has a non-finite coordinate")]
    NonFiniteCoordinate { piece_id: String },

    #[error("piece '{piece_id}' encloses no area (collinear or degenerate outline)")]
    ZeroArea { piece_id: String },

    #[error("piece '{piece_id}' is self-intersecting at edges {first_edge} and {second_edge}")]
    SelfIntersecting {
        piece_id: String,
        first_edge: usize,
        second_edge: usize,
    },

    #[error("piece '{piece_id}' has no allowed rotations")]
    NoRotations { piece_id: String },

    #[error("piece '{piece_id}' has a non-finite rotation angle")]
    InvalidRotation { piece_id: String },

    #[error("piece '{piece_id}' must have a quantity of at least 1")]
    ZeroQuantity { piece_id: String },

    #[error("piece id must not be empty")]
    EmptyId,

    #[error("rectangular piece '{piece_id}' must have positive dimensions, got {width}x{height}")]
    InvalidRectangle {
        piece_id: String,
        width: f64,
        height: f64,
    },
}

/// A packing request that cannot be searched at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRequestError {
    #[error("no pieces for design size")]
    EmptyPieceList,

    #[error("fabric sheet must have positive finite dimensions, got {width}x{height}")]
    InvalidSheet { width: f64, height: f64 },

    #[error("piece id '{0}' is used by more than one piece")]
    DuplicatePieceId(String),

    #[error("invalid packing configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PackError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequestError),
}

/// Failures while importing a pattern rule book.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rule book: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rule book: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule '{rule_id}' size {size}: {source}")]
    Piece {
        rule_id: String,
        size: String,
        #[source]
        source: GeometryError,
    },

    #[error("rule '{rule_id}' size {size} lists piece '{piece_id}' more than once")]
    DuplicatePiece {
        rule_id: String,
        size: String,
        piece_id: String,
    },
}

/// Failures at the request boundary, before or instead of a packing result.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("pattern not found for sleeves '{sleeves}', neckline '{neckline}', size {size}")]
    PatternNotFound {
        sleeves: String,
        neckline: String,
        size: String,
    },

    #[error(transparent)]
    Pack(#[from] PackError),
}

impl From<GeometryError> for RequestError {
    fn from(err: GeometryError) -> Self {
        RequestError::Pack(err.into())
    }
}

impl From<InvalidRequestError> for RequestError {
    fn from(err: InvalidRequestError) -> Self {
        RequestError::Pack(err.into())
    }
}
