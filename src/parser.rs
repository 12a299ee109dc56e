// src/parser.rs

//! Post-processing of captured command output.
//!
//! [`PayloadParser`] recovers structured data that a benchmark program
//! embedded in its own output as `TAG:[<base64 json>]`.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use tracing::{debug, warn};

use crate::errors::{ProbebenchError, Result};
use crate::exec::{LaunchOutput, LineRecord};

/// Marker tag understood by default.
pub const DEFAULT_PAYLOAD_TAG: &str = "PasFmtDat";

/// The `:[<base64>]` half of a marker. The tag in front is checked
/// separately so one pattern serves every tag.
static MARKER_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":\[(?P<data>[A-Za-z0-9+/=]+)\]").expect("valid payload marker pattern")
});

/// A transform over captured command output.
pub trait OutputParser: Send + Sync {
    fn parse(&self, output: LaunchOutput) -> LaunchOutput;
}

/// Leaves output untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopParser;

impl OutputParser for NoopParser {
    fn parse(&self, output: LaunchOutput) -> LaunchOutput {
        output
    }
}

/// Extracts `TAG:[<base64 json>]` payloads from individual lines.
///
/// A line with exactly one marker gets the decoded JSON attached as its
/// `payload`. Lines with no marker, several markers, or an undecodable
/// marker are passed through unchanged.
#[derive(Debug, Clone)]
pub struct PayloadParser {
    tag: String,
}

impl PayloadParser {
    pub fn new(tag: &str) -> Result<Self> {
        if tag.is_empty() {
            return Err(ProbebenchError::ConfigError(
                "payload tag must not be empty".to_string(),
            ));
        }
        Ok(Self {
            tag: tag.to_string(),
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Decode the single payload embedded in `text`, if there is exactly one.
    pub fn extract(&self, text: &str) -> Option<serde_json::Value> {
        let mut matches = MARKER_BODY.captures_iter(text).filter(|caps| {
            caps.get(0)
                .is_some_and(|m| text[..m.start()].ends_with(self.tag.as_str()))
        });
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(tag = %self.tag, "several payload markers on one line; ignoring");
            return None;
        }
        let data = first.name("data")?.as_str();

        let bytes = match STANDARD.decode(data) {
            Ok(b) => b,
            Err(e) => {
                warn!(tag = %self.tag, error = %e, "payload marker is not valid base64; ignoring");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(tag = %self.tag, error = %e, "payload marker is not valid JSON; ignoring");
                None
            }
        }
    }

    fn parse_lines(&self, lines: Vec<LineRecord>) -> Vec<LineRecord> {
        lines
            .into_iter()
            .map(|line| match self.extract(&line.text) {
                Some(payload) => line.with_payload(payload),
                None => line,
            })
            .collect()
    }
}

impl Default for PayloadParser {
    fn default() -> Self {
        Self {
            tag: DEFAULT_PAYLOAD_TAG.to_string(),
        }
    }
}

impl OutputParser for PayloadParser {
    fn parse(&self, output: LaunchOutput) -> LaunchOutput {
        LaunchOutput {
            stdout: self.parse_lines(output.stdout),
            stderr: self.parse_lines(output.stderr),
            ..output
        }
    }
}

/// Encode `value` the way [`PayloadParser`] expects to find it.
pub fn encode_payload(tag: &str, value: &serde_json::Value) -> Result<String> {
    let json = serde_json::to_vec(value)?;
    Ok(format!("{tag}:[{}]", STANDARD.encode(json)))
}
