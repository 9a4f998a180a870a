use crate::forward::{ForwardError, VerdictSink};
use crate::state::CoverageState;
use crate::stop::StopToken;
use crate::trace::parse_trace_line;
use crate::trend::TrendResult;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Default back-off used when the trace channel has no complete line available.
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to open trace channel {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Trace channel read failed: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Forward(#[from] ForwardError),
    #[error("Failed to spawn ingestion thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines_read: u64,
    pub malformed_lines: u64,
    pub verdicts_forwarded: u64,
}

/// Opens the trace channel for reading.
///
/// For a FIFO this blocks until the instrumented target opens the write end.
pub fn open_trace_channel(path: &Path) -> Result<BufReader<File>, IngestError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| IngestError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads trace lines, classifies them against the shared baselines and forwards each verdict.
///
/// Lines are handled strictly in the order they are read. End of input is treated as "nothing
/// written yet": the loop backs off for `idle_poll` and tries again, so it only returns when a
/// stop is requested or the forwarding link fails.
pub struct IngestionLoop<R: BufRead, S: VerdictSink> {
    reader: R,
    sink: S,
    state: Arc<CoverageState>,
    stop: StopToken,
    idle_poll: Duration,
    pending: Vec<u8>,
    stats: IngestStats,
}

impl<R: BufRead, S: VerdictSink> IngestionLoop<R, S> {
    pub fn new(reader: R, sink: S, state: Arc<CoverageState>, stop: StopToken) -> Self {
        Self {
            reader,
            sink,
            state,
            stop,
            idle_poll: DEFAULT_IDLE_POLL,
            pending: Vec::new(),
            stats: IngestStats::default(),
        }
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Runs until a stop is requested (`Ok`) or a verdict cannot be delivered (`Err`).
    pub fn run(&mut self) -> Result<IngestStats, IngestError> {
        while !self.stop.is_stop_requested() {
            match self.reader.read_until(b'\n', &mut self.pending) {
                Ok(_) if self.pending.ends_with(b"\n") => {
                    let raw = std::mem::take(&mut self.pending);
                    self.handle_raw_line(&raw)?;
                }
                // Nothing, or only part of a line, is available yet.
                Ok(_) => thread::sleep(self.idle_poll),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(IngestError::Read(e)),
            }
        }
        tracing::debug!(stats = ?self.stats, "Ingestion loop stopped");
        Ok(self.stats)
    }

    fn handle_raw_line(&mut self, raw: &[u8]) -> Result<(), IngestError> {
        self.stats.lines_read += 1;
        match std::str::from_utf8(raw) {
            Ok(line) => self.process_line(line).map(|_| ()),
            Err(_) => {
                self.stats.malformed_lines += 1;
                tracing::warn!(bytes = raw.len(), "Discarding trace line that is not valid text");
                Ok(())
            }
        }
    }

    /// Parses one line, updates the baseline of its channel and forwards the verdict.
    ///
    /// A malformed line is logged and skipped (`Ok(None)`); it never touches any baseline.
    pub fn process_line(&mut self, line: &str) -> Result<Option<TrendResult>, IngestError> {
        let snapshot = match parse_trace_line(line) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.stats.malformed_lines += 1;
                tracing::warn!("{e}");
                return Ok(None);
            }
        };

        let fd = snapshot.fd();
        let syscall = snapshot.syscall().to_string();
        let verdict = self.state.update(fd, snapshot);
        tracing::info!(%syscall, fd, "{verdict}");

        if let Err(e) = self.sink.send(&verdict) {
            tracing::error!("{e}");
            return Err(e.into());
        }
        self.stats.verdicts_forwarded += 1;
        Ok(Some(verdict))
    }
}
