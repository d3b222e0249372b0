//! Log parsing -- one parser per [`LogFormat`].
//!
//! [`ParserRouter`] selects a parser by its format tag. Every parser
//! implements core's [`LogParser`] trait and is a pure function from a line
//! to an optional [`HttpLog`].
//!
//! # Formats
//! - Common Log Format for HTTP access logs ([`ClfHttpParser`])
//!
//! ```ignore
//! let router = ParserRouter::with_defaults()?;
//! let log = router.parse(line, LogFormat::ClfHttp)?;
//! ```

pub mod clf;

pub use clf::ClfHttpParser;

use std::collections::HashMap;

use logwatch_core::error::ParseError;
use logwatch_core::pipeline::LogParser;
use logwatch_core::types::{HttpLog, LogFormat};

use crate::error::LogPipelineError;

/// Hard limit on line length, whatever the parser.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Parser registry keyed by format.
#[derive(Default)]
pub struct ParserRouter {
    parsers: HashMap<LogFormat, Box<dyn LogParser>>,
}

impl ParserRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with every shipped parser registered.
    pub fn with_defaults() -> Result<Self, LogPipelineError> {
        Ok(Self::new().register(Box::new(ClfHttpParser::new()?)))
    }

    /// Registers a parser, replacing any previous one for the same format.
    pub fn register(mut self, parser: Box<dyn LogParser>) -> Self {
        self.parsers.insert(parser.format(), parser);
        self
    }

    /// Parses `line` with the parser registered for `format`.
    ///
    /// `Ok(None)` means the line does not match the format.
    pub fn parse(&self, line: &str, format: LogFormat) -> Result<Option<HttpLog>, ParseError> {
        if line.len() > MAX_LINE_LENGTH {
            return Err(ParseError::TooLarge {
                size: line.len(),
                max: MAX_LINE_LENGTH,
            });
        }
        let parser = self
            .parsers
            .get(&format)
            .ok_or_else(|| ParseError::UnsupportedFormat(format.to_string()))?;
        Ok(parser.parse(line))
    }

    pub fn supports(&self, format: LogFormat) -> bool {
        self.parsers.contains_key(&format)
    }

    /// Registered formats, unordered.
    pub fn registered_formats(&self) -> Vec<LogFormat> {
        self.parsers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str =
        r#"127.0.0.1 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.0" 200 2326"#;

    #[test]
    fn empty_router_rejects_format() {
        let router = ParserRouter::new();
        let err = router.parse(LINE, LogFormat::ClfHttp).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFormat(_)));
    }

    #[test]
    fn with_defaults_has_clf() {
        let router = ParserRouter::with_defaults().unwrap();
        assert!(router.supports(LogFormat::ClfHttp));
        assert_eq!(router.registered_formats(), vec![LogFormat::ClfHttp]);
    }

    #[test]
    fn parse_dispatches_to_format() {
        let router = ParserRouter::with_defaults().unwrap();
        let log = router.parse(LINE, LogFormat::ClfHttp).unwrap().unwrap();
        assert_eq!(log.status, Some(200));
        assert!(router.parse("garbage", LogFormat::ClfHttp).unwrap().is_none());
    }

    #[test]
    fn oversized_line_is_rejected() {
        let router = ParserRouter::with_defaults().unwrap();
        let line = "x".repeat(MAX_LINE_LENGTH + 1);
        let err = router.parse(&line, LogFormat::ClfHttp).unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { .. }));
    }
}
