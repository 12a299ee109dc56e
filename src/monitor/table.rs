// src/monitor/table.rs

//! Sampler for tools that print a repeating comma-separated table
//! (`pcm-*.x -csv` and friends).
//!
//! Lines are classified by their digit ratio: at least half digits is a data
//! row, anything else is a header row. Classification happens twice:
//!
//! - while sampling, to decide when a batch is complete ([`SampleBatcher`]);
//! - on drain, to fold the buffered lines into a [`Timeline`]
//!   ([`TableFold`]).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, trace, warn};

use crate::errors::{ProbebenchError, Result};
use crate::exec::{
    DEFAULT_TERMINATE_GRACE, LaunchSpec, Launcher, LineObserver, LineRecord, ShellLauncher,
    Termination,
};

use super::Monitor;
use super::buffer::SampleBuffer;
use super::csv_row::{cell_value, split_row};
use super::timeline::Timeline;

/// Digit ratio at or above which a line is a data row.
pub const DATA_ROW_RATIO: f64 = 0.5;

/// Leading columns every timeline gets.
pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const COUNTER_COLUMN: &str = "no.";

/// How sampler output is grouped before it reaches the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// Each snapshot is a header block followed by data rows; a snapshot is
    /// buffered once the next header shows up (or the stream ends).
    #[default]
    Batched,
    /// Every line is buffered as soon as it arrives. Consecutive header
    /// lines are joined column-wise into one header.
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Header,
    Data,
}

impl RowKind {
    pub fn of(line: &LineRecord) -> Self {
        if line.digit_ratio >= DATA_ROW_RATIO {
            RowKind::Data
        } else {
            RowKind::Header
        }
    }
}

/// Run-loop side: groups incoming lines and pushes them to the buffer.
pub struct SampleBatcher {
    sampler: String,
    mode: SamplingMode,
    buffer: Arc<SampleBuffer<LineRecord>>,
    pending: Vec<LineRecord>,
    pending_has_data: bool,
}

impl SampleBatcher {
    pub fn new(sampler: &str, mode: SamplingMode, buffer: Arc<SampleBuffer<LineRecord>>) -> Self {
        Self {
            sampler: sampler.to_string(),
            mode,
            buffer,
            pending: Vec::new(),
            pending_has_data: false,
        }
    }

    pub async fn accept(&mut self, line: &LineRecord) {
        if line.text.trim().is_empty() {
            return;
        }

        if self.mode == SamplingMode::Continuous {
            self.buffer.push(line.clone()).await;
            return;
        }

        let kind = RowKind::of(line);
        if kind == RowKind::Header && self.pending_has_data {
            self.flush().await;
        }
        if kind == RowKind::Data {
            self.pending_has_data = true;
        }
        self.pending.push(line.clone());
    }

    pub async fn flush(&mut self) {
        self.pending_has_data = false;
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        debug!(sampler = %self.sampler, lines = batch.len(), "sampled");
        self.buffer.push_batch(batch).await;
    }
}

impl LineObserver for SampleBatcher {
    fn observe<'a>(
        &'a mut self,
        line: &'a LineRecord,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.accept(line))
    }

    fn finish(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.flush())
    }
}

/// Drain side: header and counter state carried across drains.
#[derive(Debug)]
pub struct TableFold {
    mode: SamplingMode,
    header: Vec<String>,
    counter: u64,
    /// A data row has been folded since the last header row.
    seen_data: bool,
}

impl TableFold {
    pub fn new(mode: SamplingMode) -> Self {
        Self {
            mode,
            header: Vec::new(),
            counter: 0,
            seen_data: false,
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Fold `lines` (in arrival order) into a fresh timeline.
    ///
    /// Rows whose width does not match the current header are skipped.
    pub fn fold(&mut self, lines: &[LineRecord]) -> Timeline {
        let mut timeline = Timeline::new();

        for line in lines {
            let cells = split_row(&line.text);
            if cells.len() <= 1 {
                trace!(text = %line.text, "not a table row; skipping");
                continue;
            }
            match RowKind::of(line) {
                RowKind::Header => self.fold_header(cells),
                RowKind::Data => self.fold_data(line, &cells, &mut timeline),
            }
        }

        timeline
    }

    fn fold_header(&mut self, cells: Vec<String>) {
        match self.mode {
            SamplingMode::Batched => {
                if self.seen_data {
                    self.counter += 1;
                }
                self.header = cells;
            }
            SamplingMode::Continuous => {
                if self.seen_data || self.header.is_empty() {
                    if self.seen_data {
                        self.counter = 0;
                    }
                    self.header = cells;
                } else {
                    self.header = self
                        .header
                        .iter()
                        .zip(cells.iter())
                        .map(|(a, b)| format!("{a}/{b}"))
                        .collect();
                }
            }
        }
        self.seen_data = false;
    }

    fn fold_data(&mut self, line: &LineRecord, cells: &[String], timeline: &mut Timeline) {
        if !self.header.is_empty() && cells.len() != self.header.len() {
            debug!(
                expected = self.header.len(),
                got = cells.len(),
                "row width does not match header; skipping"
            );
            return;
        }

        let columns: Vec<String> = [TIMESTAMP_COLUMN.to_string(), COUNTER_COLUMN.to_string()]
            .into_iter()
            .chain(self.header.iter().cloned())
            .collect();

        if timeline.columns().is_empty() {
            *timeline = Timeline::with_columns(columns);
        } else if timeline.columns() != columns.as_slice() {
            debug!("header changed within one drain window; skipping row");
            return;
        }

        let mut row = Vec::with_capacity(2 + self.header.len());
        row.push(Value::from(line.unix_seconds()));
        row.push(Value::from(self.counter));
        if !self.header.is_empty() {
            row.extend(cells.iter().map(|c| cell_value(c)));
        }
        timeline.push_row(row);

        self.seen_data = true;
        if self.mode == SamplingMode::Continuous {
            self.counter += 1;
        }
    }
}

/// A background sampler running one table-printing command.
pub struct TableMonitor {
    name: String,
    cmd: String,
    mode: SamplingMode,
    terminate_grace: Duration,
    buffer: Arc<SampleBuffer<LineRecord>>,
    fold: Mutex<TableFold>,
}

impl TableMonitor {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>, mode: SamplingMode) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            mode,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            buffer: Arc::new(SampleBuffer::new()),
            fold: Mutex::new(TableFold::new(mode)),
        }
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn sample(&self, stop: oneshot::Receiver<()>) -> Result<()> {
        let name = self.name.clone();
        let batcher = SampleBatcher::new(&self.name, self.mode, Arc::clone(&self.buffer));
        let spec = LaunchSpec::new(self.cmd.clone())
            .stdout_observer(batcher)
            .stderr_observer(move |line: &LineRecord| {
                debug!(sampler = %name, "stderr: {}", line.text);
            })
            .retain_lines(false);

        let mut launcher = ShellLauncher::new(spec)
            .with_stop(stop)
            .with_terminate_grace(self.terminate_grace);

        info!(sampler = %self.name, cmd = %self.cmd, mode = ?self.mode, "sampler started");
        let output = launcher.get().await?;

        match output.termination {
            Termination::Stopped => {
                debug!(sampler = %self.name, "sampler terminated");
                Err(ProbebenchError::Stopped)
            }
            Termination::Exited(code) => {
                warn!(sampler = %self.name, exit_code = ?code, "sampler process exited on its own");
                Ok(())
            }
            Termination::TimedOut => Ok(()),
        }
    }

    async fn drain_into_timeline(&self) -> Timeline {
        let lines = self.buffer.drain().await;
        let mut fold = self.fold.lock().await;
        let timeline = fold.fold(&lines);
        debug!(
            sampler = %self.name,
            lines = lines.len(),
            rows = timeline.len(),
            "drained sampler buffer"
        );
        timeline
    }
}

impl Monitor for TableMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        stop: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.sample(stop))
    }

    /// Drain and fold, discarding the rows. Header rows still update the
    /// fold state, so a header printed only once is not lost.
    fn reset(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let discarded = self.drain_into_timeline().await;
            trace!(sampler = %self.name, rows = discarded.len(), "reset discarded rows");
            Ok(())
        })
    }

    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Timeline>> + Send + '_>> {
        Box::pin(async move { Ok(self.drain_into_timeline().await) })
    }
}

impl std::fmt::Debug for TableMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMonitor")
            .field("name", &self.name)
            .field("cmd", &self.cmd)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lines(texts: &[&str]) -> Vec<LineRecord> {
        texts.iter().map(|t| LineRecord::now(*t)).collect()
    }

    #[test]
    fn classification_uses_half_digits_threshold() {
        assert_eq!(RowKind::of(&LineRecord::now("1,2")), RowKind::Data);
        assert_eq!(RowKind::of(&LineRecord::now("12ab")), RowKind::Data);
        assert_eq!(RowKind::of(&LineRecord::now("1abc")), RowKind::Header);
        assert_eq!(RowKind::of(&LineRecord::now("Skt,IPC")), RowKind::Header);
    }

    #[test]
    fn batched_header_then_data() {
        let mut fold = TableFold::new(SamplingMode::Batched);
        let input = lines(&["a,b", "1,2"]);
        let t = fold.fold(&input);

        assert_eq!(t.columns(), ["timestamp", "no.", "a", "b"]);
        assert_eq!(t.column("no."), Some(&[json!(0)][..]));
        assert_eq!(t.column("a"), Some(&[json!(1)][..]));
        assert_eq!(t.column("b"), Some(&[json!(2)][..]));
        assert_eq!(
            t.column("timestamp"),
            Some(&[json!(input[1].unix_seconds())][..])
        );
    }

    #[test]
    fn batched_counter_advances_per_snapshot() {
        let mut fold = TableFold::new(SamplingMode::Batched);
        let t = fold.fold(&lines(&["a,b", "1,2", "3,4", "a,b", "5,6"]));
        assert_eq!(t.column("no."), Some(&[json!(0), json!(0), json!(1)][..]));
        assert_eq!(t.column("a"), Some(&[json!(1), json!(3), json!(5)][..]));

        // State carries over into the next drain.
        let t = fold.fold(&lines(&["a,b", "7,8"]));
        assert_eq!(t.column("no."), Some(&[json!(2)][..]));
    }

    #[test]
    fn continuous_joins_header_lines_and_numbers_rows() {
        let mut fold = TableFold::new(SamplingMode::Continuous);
        let t = fold.fold(&lines(&["Skt,Skt", "Read,Write", "10,20", "30,40"]));
        assert_eq!(t.columns(), ["timestamp", "no.", "Skt/Read", "Skt/Write"]);
        assert_eq!(t.column("no."), Some(&[json!(0), json!(1)][..]));
        assert_eq!(t.column("Skt/Write"), Some(&[json!(20), json!(40)][..]));
        assert_eq!(fold.header(), ["Skt/Read", "Skt/Write"]);
    }

    #[test]
    fn continuous_header_after_data_starts_over() {
        let mut fold = TableFold::new(SamplingMode::Continuous);
        fold.fold(&lines(&["x,y", "1,2"]));
        let t = fold.fold(&lines(&["p,q", "3,4"]));
        assert_eq!(t.columns(), ["timestamp", "no.", "p", "q"]);
        assert_eq!(t.column("no."), Some(&[json!(0)][..]));
    }

    #[test]
    fn mismatched_rows_are_skipped() {
        let mut fold = TableFold::new(SamplingMode::Batched);
        let t = fold.fold(&lines(&["a,b", "1,2,3", "4,5"]));
        assert_eq!(t.len(), 1);
        assert_eq!(t.column("a"), Some(&[json!(4)][..]));
    }

    #[test]
    fn data_without_header_keeps_only_prefix() {
        let mut fold = TableFold::new(SamplingMode::Batched);
        let t = fold.fold(&lines(&["1,2,3"]));
        assert_eq!(t.columns(), ["timestamp", "no."]);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn single_cell_lines_are_ignored() {
        let mut fold = TableFold::new(SamplingMode::Batched);
        let t = fold.fold(&lines(&["banner text", "a,b", "12345", "1,2"]));
        assert_eq!(t.len(), 1);
    }

    #[tokio::test]
    async fn batcher_flushes_snapshot_when_header_returns() {
        let buffer = Arc::new(SampleBuffer::new());
        let mut batcher = SampleBatcher::new("t", SamplingMode::Batched, Arc::clone(&buffer));

        for l in lines(&["a,b", "1,2", "", "3,4"]) {
            batcher.accept(&l).await;
        }
        assert!(buffer.is_empty().await, "snapshot not complete yet");

        batcher.accept(&LineRecord::now("a,b")).await;
        let flushed: Vec<String> = buffer.drain().await.into_iter().map(|l| l.text).collect();
        assert_eq!(flushed, vec!["a,b", "1,2", "3,4"]);

        batcher.flush().await;
        let rest: Vec<String> = buffer.drain().await.into_iter().map(|l| l.text).collect();
        assert_eq!(rest, vec!["a,b"]);
    }

    #[tokio::test]
    async fn batcher_continuous_pushes_each_line() {
        let buffer = Arc::new(SampleBuffer::new());
        let mut batcher = SampleBatcher::new("t", SamplingMode::Continuous, Arc::clone(&buffer));
        batcher.accept(&LineRecord::now("a,b")).await;
        assert_eq!(buffer.len().await, 1);
        batcher.accept(&LineRecord::now("   ")).await;
        assert_eq!(buffer.len().await, 1);
    }
}
