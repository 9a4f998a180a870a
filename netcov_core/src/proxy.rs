use crate::config::{ForwardSettings, TraceSettings};
use crate::forward::ForwardingLink;
use crate::ingest::{IngestError, IngestStats, IngestionLoop, open_trace_channel};
use crate::state::CoverageState;
use crate::stop::StopToken;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Wires a trace channel to a fuzzing client: connects the forwarding link, then runs the
/// ingestion loop on its own thread.
pub struct CoverageProxy {
    trace: TraceSettings,
    forward: ForwardSettings,
    state: Arc<CoverageState>,
}

impl CoverageProxy {
    pub fn new(trace: TraceSettings, forward: ForwardSettings) -> Self {
        Self {
            trace,
            forward,
            state: Arc::new(CoverageState::new()),
        }
    }

    pub fn state(&self) -> Arc<CoverageState> {
        Arc::clone(&self.state)
    }

    /// Connects to the fuzzing client and starts ingesting on a dedicated thread.
    ///
    /// A failed connection is returned before any trace is read. The trace channel is opened on
    /// the ingestion thread because opening a FIFO blocks until a writer shows up. Both handles
    /// are owned by that thread and dropped on every exit path.
    pub fn spawn(
        self,
        stop: StopToken,
    ) -> Result<JoinHandle<Result<IngestStats, IngestError>>, IngestError> {
        let link = ForwardingLink::connect(
            &self.forward.host,
            self.forward.port,
            self.forward.connect_timeout(),
        )?;
        tracing::info!(fuzzer = %self.forward.address(), "Forwarding verdicts");

        let CoverageProxy { trace, state, .. } = self;
        thread::Builder::new()
            .name("netcov-ingest".to_string())
            .spawn(move || {
                tracing::info!(pipe = ?trace.pipe, "Opening trace channel");
                let reader = open_trace_channel(&trace.pipe)?;
                IngestionLoop::new(reader, link, state, stop)
                    .with_idle_poll(trace.idle_poll())
                    .run()
            })
            .map_err(IngestError::Spawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forward::ForwardError;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    #[test]
    fn refuses_to_start_without_a_fuzzing_client() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let proxy = CoverageProxy::new(
            TraceSettings::default(),
            ForwardSettings {
                host: "127.0.0.1".to_string(),
                port,
                connect_timeout_ms: 1000,
            },
        );
        assert!(matches!(
            proxy.spawn(StopToken::new()),
            Err(IngestError::Forward(ForwardError::Connect { .. }))
        ));
    }

    #[test]
    fn forwards_traces_from_a_file_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut trace_file = tempfile::NamedTempFile::new().unwrap();
        write!(trace_file, "open:3=a+1->b+2:1;\nopen:3=a+1->b+2:3;\n").unwrap();
        trace_file.flush().unwrap();

        let proxy = CoverageProxy::new(
            TraceSettings {
                pipe: trace_file.path().to_path_buf(),
                idle_poll_ms: 1,
            },
            ForwardSettings {
                host: "127.0.0.1".to_string(),
                port,
                connect_timeout_ms: 1000,
            },
        );
        let state = proxy.state();
        let stop = StopToken::new();
        let handle = proxy.spawn(stop.clone()).unwrap();

        let (stream, _) = listener.accept().unwrap();
        let mut verdicts = BufReader::new(stream);
        let mut lines = Vec::new();
        for _ in 0..2 {
            let mut line = String::new();
            verdicts.read_line(&mut line).unwrap();
            lines.push(line);
        }
        assert_eq!(lines, vec!["INC:+1\n", "DEC:+2\n"]);

        stop.request_stop();
        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.verdicts_forwarded, 2);
        assert_eq!(state.current_trend().delta, 2);
    }
}
