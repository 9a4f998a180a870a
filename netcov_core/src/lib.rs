pub mod client;
pub mod config;
pub mod coverage;
pub mod executor;
pub mod feedback;
pub mod forward;
pub mod ingest;
pub mod mutator;
pub mod proxy;
pub mod state;
pub mod stop;
pub mod trace;
pub mod trend;
pub mod verdict;

pub use client::{FuzzClient, FuzzClientError, FuzzStats};
pub use config::NetcovConfig;
pub use coverage::{CoverageSnapshot, EdgeRecord};
pub use executor::{ExecutionStatus, Executor, TcpTargetExecutor};
pub use feedback::{CoverageProgressFeedback, Feedback};
pub use forward::{ForwardError, ForwardingLink, VerdictSink};
pub use ingest::{IngestError, IngestStats, IngestionLoop};
pub use mutator::{FlipSingleByteMutator, Mutator, XorSingleByteMutator};
pub use proxy::CoverageProxy;
pub use state::CoverageState;
pub use stop::StopToken;
pub use trace::{TraceError, parse_trace_line};
pub use trend::{CoverageTrend, TrendResult, compare};
pub use verdict::{VerdictError, encode_verdict, parse_verdict};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn documented_scenario_produces_expected_wire_lines() {
        let state = Arc::new(CoverageState::new());
        let mut wire = Vec::new();
        {
            let stop = StopToken::new();
            let mut ingest = IngestionLoop::new(
                std::io::empty(),
                ForwardingLink::new(&mut wire),
                Arc::clone(&state),
                stop,
            );
            let first = ingest.process_line("open:3=a+1->b+2:1;").unwrap();
            assert_eq!(first, Some(TrendResult::new(CoverageTrend::EdgeIncrease, 1)));
            let second = ingest.process_line("open:3=a+1->b+2:3;").unwrap();
            assert_eq!(second, Some(TrendResult::new(CoverageTrend::Stable, 2)));
        }

        assert_eq!(String::from_utf8(wire).unwrap(), "INC:+1\nDEC:+2\n");
        assert_eq!(
            state.baseline(3),
            Some(CoverageSnapshot::new("open", 3, vec![EdgeRecord::new("a+1", "b+2", 3)]))
        );
    }
}
