//! Error types, one enum per domain.

/// Top-level logwatch error.
#[derive(Debug, thiserror::Error)]
pub enum LogwatchError {
    /// Configuration error
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Event pipeline error
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file is not valid TOML or does not match the schema
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A field holds an invalid value
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A name refers to something that does not exist (exporter, alert, ...)
    #[error("unknown {kind} '{name}'")]
    UnknownReference { kind: String, name: String },
}

/// Errors raised while routing or handling events.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A handler failed while processing an event
    #[error("handler '{handler}' failed: {reason}")]
    HandlerFailed { handler: String, reason: String },

    /// The exporter failed to ingest an event
    #[error("export failed: {0}")]
    ExportFailed(String),

    /// Event bus send failed
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// Component initialization failed
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}

/// Parser errors.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No parser registered for the requested format
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Input exceeds the parser's size limit
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}
