//! Common Log Format parser for HTTP access logs.
//!
//! ```text
//! host ident authuser [date] "method path protocol" status size ["referer" "user-agent"]
//! 127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326
//! ```
//!
//! The trailing referer/user-agent pair (combined log format) is optional, as
//! are the request-line tokens after the method. `-` maps to `None` for
//! optional text fields and status, and to 0 for the size.

use chrono::DateTime;
use logwatch_core::pipeline::LogParser;
use logwatch_core::types::{HttpLog, LogFormat};
use regex::{Captures, Regex};

use crate::error::LogPipelineError;

/// Date layout of the bracketed timestamp.
pub const CLF_DATE_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

const CLF_PATTERN: &str = r#"^(\S+) (\S+) (\S+) \[([\w:/]+\s[+\-]\d{4})\] "(\S+)\s?(\S+)?\s?(\S+)?" (\d{3}|-) (\d+|-)(?: "([^"]*)" "([^"]*)")?"#;

/// Default input size limit (64 KiB).
const DEFAULT_MAX_INPUT_SIZE: usize = 64 * 1024;

/// Common Log Format parser.
pub struct ClfHttpParser {
    pattern: Regex,
    max_input_size: usize,
}

impl ClfHttpParser {
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            pattern: Regex::new(CLF_PATTERN)?,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
        })
    }

    /// Sets the maximum accepted line length in bytes.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    pub fn max_input_size(&self) -> usize {
        self.max_input_size
    }

    fn build(caps: &Captures<'_>) -> Option<HttpLog> {
        let date = DateTime::parse_from_str(caps.get(4)?.as_str(), CLF_DATE_FORMAT).ok()?;

        let status = match caps.get(8)?.as_str() {
            "-" => None,
            s => Some(s.parse::<u16>().ok()?),
        };
        let size = match caps.get(9)?.as_str() {
            "-" => 0,
            s => s.parse::<u64>().ok()?,
        };

        Some(HttpLog {
            host: caps.get(1)?.as_str().to_owned(),
            ident: optional(caps, 2),
            auth_user: optional(caps, 3),
            date,
            method: caps.get(5)?.as_str().to_owned(),
            path: optional(caps, 6),
            protocol: optional(caps, 7),
            status,
            size,
            referer: optional(caps, 10),
            user_agent: optional(caps, 11),
        })
    }
}

/// Capture group `i` unless absent, empty or `-`.
fn optional(caps: &Captures<'_>, i: usize) -> Option<String> {
    caps.get(i)
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty() && *s != "-")
        .map(str::to_owned)
}

impl LogParser for ClfHttpParser {
    fn format(&self) -> LogFormat {
        LogFormat::ClfHttp
    }

    fn parse(&self, line: &str) -> Option<HttpLog> {
        if line.len() > self.max_input_size {
            return None;
        }
        let caps = self.pattern.captures(line)?;
        Self::build(&caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn parser() -> ClfHttpParser {
        ClfHttpParser::new().unwrap()
    }

    #[test]
    fn parses_common_log_format_line() {
        let line = r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326"#;
        let log = parser().parse(line).unwrap();

        assert_eq!(log.host, "127.0.0.1");
        assert_eq!(log.ident, None);
        assert_eq!(log.auth_user.as_deref(), Some("frank"));
        assert_eq!(log.method, "GET");
        assert_eq!(log.path.as_deref(), Some("/apache_pb.gif"));
        assert_eq!(log.protocol.as_deref(), Some("HTTP/1.0"));
        assert_eq!(log.status, Some(200));
        assert_eq!(log.size, 2326);
        assert_eq!(log.referer, None);
        assert_eq!(log.user_agent, None);

        assert_eq!(log.date.year(), 2000);
        assert_eq!(log.date.month(), 10);
        assert_eq!(log.date.day(), 10);
        assert_eq!(log.date.hour(), 13);
        assert_eq!(log.date.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn parses_combined_log_format_line() {
        let line = r#"10.0.0.5 - - [15/Jan/2024:08:00:01 +0000] "POST /api/login HTTP/1.1" 401 512 "https://example.com/" "Mozilla/5.0 (X11; Linux x86_64)""#;
        let log = parser().parse(line).unwrap();

        assert_eq!(log.auth_user, None);
        assert_eq!(log.status, Some(401));
        assert_eq!(log.status_class(), Some(4));
        assert_eq!(log.referer.as_deref(), Some("https://example.com/"));
        assert_eq!(
            log.user_agent.as_deref(),
            Some("Mozilla/5.0 (X11; Linux x86_64)")
        );
    }

    #[test]
    fn dash_status_and_size() {
        let line = r#"host - - [01/Feb/2023:00:00:00 +0100] "GET /" - -"#;
        let log = parser().parse(line).unwrap();

        assert_eq!(log.path.as_deref(), Some("/"));
        assert_eq!(log.protocol, None);
        assert_eq!(log.status, None);
        assert_eq!(log.size, 0);
    }

    #[test]
    fn dash_referer_is_none() {
        let line = r#"host - - [01/Feb/2023:00:00:00 +0100] "GET / HTTP/1.1" 200 10 "-" "curl/8.0""#;
        let log = parser().parse(line).unwrap();
        assert_eq!(log.referer, None);
        assert_eq!(log.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn non_matching_lines_return_none() {
        let p = parser();
        assert!(p.parse("").is_none());
        assert!(p.parse("hello world").is_none());
        assert!(p.parse(r#"{"level":"info","msg":"json log"}"#).is_none());
        // missing size
        assert!(p.parse(r#"h - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.0" 200"#).is_none());
    }

    #[test]
    fn invalid_date_returns_none() {
        let line = r#"h - - [99/Foo/2000:13:55:36 -0700] "GET / HTTP/1.0" 200 1"#;
        assert!(parser().parse(line).is_none());
    }

    #[test]
    fn oversized_input_returns_none() {
        let p = parser().with_max_input_size(64);
        let line = format!(
            r#"h - - [10/Oct/2000:13:55:36 -0700] "GET /{} HTTP/1.0" 200 1"#,
            "a".repeat(100)
        );
        assert!(p.parse(&line).is_none());
        assert_eq!(p.max_input_size(), 64);
    }

    #[test]
    fn format_tag() {
        assert_eq!(parser().format(), LogFormat::ClfHttp);
    }
}
