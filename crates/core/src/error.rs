/// Result alias that carries the custom [`BendulumError`] type.
pub type Result<T> = std::result::Result<T, BendulumError>;

/// Common error type for the core crate.
///
/// The beat engine itself never fails: implausible samples are dropped and
/// the previous estimate is kept. Errors only surface at the edges, when
/// configuration is loaded or when a bounded passage wait runs out.
#[derive(Debug, thiserror::Error)]
pub enum BendulumError {
    /// Free-form message, mostly used by the command line front end.
    #[error("{0}")]
    Message(String),
    /// A configuration value is out of range.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A run mode name could not be parsed.
    #[error("unknown run mode `{0}`")]
    UnknownMode(String),
    /// The detector gave up waiting for the magnet to pass the coil.
    #[error("no passage detected within {waited_ms} ms")]
    NoPassage { waited_ms: u64 },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration file could not be parsed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BendulumError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}
