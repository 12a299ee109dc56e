// src/exec/record.rs

//! Captured output types: one [`LineRecord`] per line, one [`LaunchOutput`]
//! per launched command.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Which pipe of the child process a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

/// A single captured output line.
///
/// The timestamp is taken when the line is read, not when the child wrote it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRecord {
    pub text: String,
    #[serde(serialize_with = "serialize_unix_seconds")]
    pub timestamp: DateTime<Utc>,
    pub digit_ratio: f64,
    /// Structured data recovered by an [`crate::parser::OutputParser`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl LineRecord {
    /// Build a record stamped with the current time.
    pub fn now(text: impl Into<String>) -> Self {
        Self::at(text, Utc::now())
    }

    pub fn at(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let text = text.into();
        let digit_ratio = digit_ratio(&text);
        Self {
            text,
            timestamp,
            digit_ratio,
            payload: None,
        }
    }

    /// Copy of this record carrying `payload`.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Capture time as fractional Unix seconds.
    pub fn unix_seconds(&self) -> f64 {
        unix_seconds(&self.timestamp)
    }
}

/// Fraction of characters in `text` that are decimal digits.
///
/// Empty text has a ratio of `0.0`.
pub fn digit_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut digits = 0usize;
    for c in text.chars() {
        total += 1;
        if c.is_ascii_digit() {
            digits += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        digits as f64 / total as f64
    }
}

pub(crate) fn unix_seconds(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

fn serialize_unix_seconds<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(unix_seconds(ts))
}

/// How a launched process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
pub enum Termination {
    /// Exited on its own. `None` when killed by a signal.
    Exited(Option<i32>),
    /// The launch timeout elapsed and the process was terminated.
    TimedOut,
    /// The launcher's stop signal fired and the process was terminated.
    Stopped,
}

/// Everything captured from one launched command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchOutput {
    pub cmd: String,
    pub stdout: Vec<LineRecord>,
    pub stderr: Vec<LineRecord>,
    pub termination: Termination,
}

impl LaunchOutput {
    pub fn lines(&self, stream: Stream) -> &[LineRecord] {
        match stream {
            Stream::Stdout => &self.stdout,
            Stream::Stderr => &self.stderr,
        }
    }

    /// Texts of one stream, in arrival order.
    pub fn texts(&self, stream: Stream) -> Vec<&str> {
        self.lines(stream).iter().map(|l| l.text.as_str()).collect()
    }

    pub fn timed_out(&self) -> bool {
        self.termination == Termination::TimedOut
    }

    /// Payloads recovered from either stream, stdout first.
    pub fn payloads(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.stdout
            .iter()
            .chain(self.stderr.iter())
            .filter_map(|l| l.payload.as_ref())
    }
}
