// LTR Store - Rust Implementation
// Feature store and ranking evaluation core for learning-to-rank

#![warn(rust_2018_idioms)]

pub mod config;
pub mod element;
pub mod logging;
pub mod metrics;
pub mod ranker;
pub mod script;
pub mod storage;
pub mod store;
pub mod validation;

// Re-exports for convenience
pub use element::{ElementType, StorableElement, StoredFeature, StoredFeatureSet, StoredModel};
pub use ranker::{CompiledRanker, ModelLoader, RankerCache, RankerParserFactory};
pub use script::{
    score_segments, Evaluator, ExecutableUnit, LeafFactory, ScriptContext, ScriptEngine,
    ScriptService, SegmentContext,
};
pub use storage::{DocumentIndex, InMemoryIndex};
pub use store::{
    FeatureStoreAction, FeatureStoreRequest, FeatureStoreResponse, IndexFeatureStore,
    DEFAULT_STORE,
};
pub use validation::{FeatureValidation, ValidationEngine};

/// LTR store error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Not found: {0}")]
        NotFound(String),

        #[error("Already exists: {0}")]
        AlreadyExists(String),

        #[error(
            "Version conflict for [{id}]: expected version {expected}, current version {actual}"
        )]
        VersionConflict { id: String, expected: u64, actual: u64 },

        #[error("Validation rejected: {0}")]
        ValidationRejected(String),

        #[error("Parse error: {0}")]
        ParseError(String),

        #[error("Missing parameter [{0}]")]
        MissingParameter(String),

        #[error("Unsupported operation: {0}")]
        UnsupportedOperation(String),

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),

        #[error("Serialization error: {0}")]
        SerializationError(String),

        /// Failure reported by the backing document index, passed through as-is.
        #[error("Index error: {0}")]
        Index(String),

        #[error("Configuration error: {0}")]
        Config(String),
    }

    impl From<serde_json::Error> for Error {
        fn from(err: serde_json::Error) -> Self {
            Error::SerializationError(err.to_string())
        }
    }

    impl From<config::ConfigError> for Error {
        fn from(err: config::ConfigError) -> Self {
            Error::Config(err.to_string())
        }
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
