//! Error types for the community bot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A record with the same natural key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outbound notification transport errors.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Request to {method} failed: {reason}")]
    Request { method: String, reason: String },

    #[error("{method} returned error: {error}")]
    Api { method: String, error: String },
}

/// A user input failed a rule. The `Display` text is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("The link must be a URL.")]
    InvalidUrl,

    #[error("Trigger words must start with {sigil}.")]
    MissingSigil { sigil: char },

    #[error("Trigger words need at least two characters after the sigil.")]
    TooShort,

    #[error("Trigger words cannot contain whitespace.")]
    ContainsWhitespace,

    #[error(
        "A similar trigger word already exists. Choose a word distinct from {}.",
        existing.join(",")
    )]
    SimilarTrigger { existing: Vec<String> },

    #[error("You have used up all of your passes.")]
    PassExhausted,

    #[error("Passes cannot be used twice in a row.")]
    ConsecutivePass,

    #[error("You are not registered yet.")]
    UserNotRegistered,

    #[error("This is not the channel you belong to.")]
    NotChannelMember,
}

/// Failure of a core operation: either the input was rejected or storage failed.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Repository failure: {0}")]
    Repository(#[from] DatabaseError),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;

/// Inbound request authentication failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Invalid request timestamp")]
    InvalidTimestamp,

    #[error("Request timestamp is {age_secs}s from now")]
    StaleTimestamp { age_secs: i64 },

    #[error("Malformed signature")]
    Malformed,

    #[error("Signature mismatch")]
    Mismatch,

    #[error("Signing key rejected: {0}")]
    InvalidKey(String),
}
