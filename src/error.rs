use thiserror::Error;

/// Failures at the resource-loading boundary.
///
/// Cloneable because one failed load is observed by every completion that
/// shares its handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("failed to load `{uri}`: {reason}")]
    LoadFailure { uri: String, reason: String },
    #[error("malformed map data: {0}")]
    MalformedMapData(String),
    #[error("texture `{uri}` has not finished loading")]
    MissingTextureDependency { uri: String },
    #[error("atlas `{name}` needs {width}x{height} px, above the {limit} px texture limit")]
    AtlasTooLarge { name: String, width: u32, height: u32, limit: u32 },
}

impl ResourceError {
    pub fn load_failure(uri: &str, reason: impl ToString) -> Self {
        Self::LoadFailure { uri: uri.to_string(), reason: reason.to_string() }
    }
}

/// Top-level error surfaced to the host loop.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("surface error: {0}")]
    Surface(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
