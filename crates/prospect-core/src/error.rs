//! Error types for the prospect-core library.

use thiserror::Error;

/// Main error type for the prospect library.
#[derive(Error, Debug)]
pub enum ProspectError {
    /// Predictor configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Element stream contract violation.
    #[error("input error: {0}")]
    Input(#[from] InputError),
}

/// Errors raised while loading a predictor configuration.
///
/// All of these are fatal and raised before any evaluation starts;
/// a loaded [`crate::schema::PredictorConfig`] is guaranteed valid.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A model entry names a resolver that is not registered.
    #[error("unknown resolver: {0}")]
    UnknownResolver(String),

    /// A configured regex failed to compile.
    #[error("malformed regex {pattern:?}: {reason}")]
    MalformedRegex { pattern: String, reason: String },

    /// The `depends` graph contains a cycle.
    #[error("cyclic depends involving field {0:?}")]
    CyclicDepends(String),

    /// Two field specs share the same path.
    #[error("conflicting field path: {0}")]
    PathConflict(String),

    /// A field spec is structurally invalid.
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// The config document could not be deserialized.
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Errors raised while admitting a parsed document.
#[derive(Error, Debug)]
pub enum InputError {
    /// Element indexes must be contiguous from zero.
    #[error("element index {found} out of order (expected {expected})")]
    IndexOutOfOrder { expected: usize, found: usize },

    /// A table cell key does not have the `row_col` shape.
    #[error("malformed cell key {0:?}")]
    MalformedCellKey(String),

    /// A table grid does not form a rectangle after merged-cell expansion.
    #[error("table at element {element} has a ragged grid")]
    RaggedGrid { element: usize },

    /// An element score is outside [0, 1].
    #[error("element {element} score {score} outside [0, 1]")]
    ScoreOutOfRange { element: usize, score: f32 },

    /// The element stream could not be deserialized.
    #[error("failed to parse elements: {0}")]
    Parse(String),
}

/// Result type for the prospect library.
pub type Result<T> = std::result::Result<T, ProspectError>;
