//! Pipeline error types.
//!
//! [`LogPipelineError`] covers everything that can fail inside this crate.
//! `From<LogPipelineError> for LogwatchError` lets upper layers propagate it
//! with `?`.

use logwatch_core::error::{ConfigError, LogwatchError, PipelineError};

/// Pipeline domain error.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// A listener could not start watching a path
    #[error("listener error: {path}: {reason}")]
    Listener {
        /// Watched path
        path: String,
        reason: String,
    },

    /// Filesystem watcher error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Invalid component configuration
    #[error("config error: {field}: {reason}")]
    Config {
        field: String,
        reason: String,
    },

    /// Event bus is closed or full
    #[error("channel error: {0}")]
    Channel(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Parser pattern failed to compile
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for LogwatchError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Config { field, reason } => {
                LogwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Io(e) => LogwatchError::Io(e),
            LogPipelineError::Channel(reason) => {
                LogwatchError::Pipeline(PipelineError::ChannelSend(reason))
            }
            other => LogwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_error_display() {
        let err = LogPipelineError::Listener {
            path: "/var/log/access.log".to_owned(),
            reason: "permission denied".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("access.log"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn config_error_converts_to_config() {
        let err = LogPipelineError::Config {
            field: "server.exporter".to_owned(),
            reason: "unknown".to_owned(),
        };
        let top: LogwatchError = err.into();
        assert!(matches!(top, LogwatchError::Config(_)));
    }

    #[test]
    fn channel_error_converts_to_pipeline() {
        let err = LogPipelineError::Channel("receiver closed".to_owned());
        let top: LogwatchError = err.into();
        assert!(matches!(
            top,
            LogwatchError::Pipeline(PipelineError::ChannelSend(_))
        ));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LogPipelineError = io_err.into();
        assert!(matches!(err, LogPipelineError::Io(_)));
        let top: LogwatchError = err.into();
        assert!(matches!(top, LogwatchError::Io(_)));
    }
}
