use crate::executor::{ExecutionStatus, Executor};
use crate::feedback::Feedback;
use crate::mutator::Mutator;
use crate::stop::StopToken;
use crate::verdict::{VerdictError, parse_verdict};
use rand::Rng;
use std::io::{self, BufRead, BufReader};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuzzClientError {
    #[error("Unable to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to accept the coverage proxy: {0}")]
    Accept(#[source] io::Error),
    #[error("Failed to read verdict: {0}")]
    VerdictRead(#[source] io::Error),
    #[error(transparent)]
    Verdict(#[from] VerdictError),
    #[error("Mutation failed: {0}")]
    Mutation(String),
}

/// Counters reported when the client stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuzzStats {
    pub executions: u64,
    pub discoveries: u64,
    pub target_errors: u64,
}

/// Waits for the coverage proxy to connect and returns a line reader over its verdicts.
pub fn accept_proxy(listen: &str) -> Result<BufReader<TcpStream>, FuzzClientError> {
    let listener = TcpListener::bind(listen).map_err(|source| FuzzClientError::Bind {
        addr: listen.to_string(),
        source,
    })?;
    tracing::info!(%listen, "Waiting for the coverage proxy");
    let (stream, peer) = listener.accept().map_err(FuzzClientError::Accept)?;
    tracing::info!(%peer, "Coverage proxy connected");
    Ok(BufReader::new(stream))
}

/// A minimal coverage-guided fuzzing loop driven by the proxy's verdicts.
///
/// Each iteration mutates the current best input, delivers it to the target and waits for the
/// matching verdict. Inputs whose verdict the feedback finds interesting become the new best
/// input.
pub struct FuzzClient<R: Rng> {
    mutator: Box<dyn Mutator<R>>,
    executor: Box<dyn Executor>,
    feedback: Box<dyn Feedback>,
    rng: R,
    best_input: Vec<u8>,
    retry_delay: Duration,
    max_iterations: Option<u64>,
}

impl<R: Rng> FuzzClient<R> {
    pub fn new(
        mutator: Box<dyn Mutator<R>>,
        executor: Box<dyn Executor>,
        feedback: Box<dyn Feedback>,
        rng: R,
        seed_input: Vec<u8>,
    ) -> Self {
        Self {
            mutator,
            executor,
            feedback,
            rng,
            best_input: seed_input,
            retry_delay: Duration::from_secs(3),
            max_iterations: None,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<u64>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn best_input(&self) -> &[u8] {
        &self.best_input
    }

    /// Runs until a stop is requested, the iteration budget is spent, or the proxy closes the
    /// verdict stream.
    pub fn run<V: BufRead>(
        &mut self,
        verdicts: &mut V,
        stop: &StopToken,
    ) -> Result<FuzzStats, FuzzClientError> {
        let mut stats = FuzzStats::default();
        let mut line = String::new();
        let mut iteration: u64 = 0;

        while !stop.is_stop_requested() {
            if self.max_iterations.is_some_and(|max| iteration >= max) {
                break;
            }
            iteration += 1;

            let candidate = self
                .mutator
                .mutate(Some(self.best_input.as_slice()), &mut self.rng)
                .map_err(|e| FuzzClientError::Mutation(e.to_string()))?;

            match self.executor.execute_sync(&candidate) {
                ExecutionStatus::Ok => stats.executions += 1,
                status => {
                    stats.target_errors += 1;
                    tracing::warn!(?status, "Socket error");
                    thread::sleep(self.retry_delay);
                    continue;
                }
            }

            line.clear();
            let read = verdicts
                .read_line(&mut line)
                .map_err(FuzzClientError::VerdictRead)?;
            if read == 0 {
                tracing::info!("Coverage proxy closed the verdict stream");
                break;
            }

            let verdict = parse_verdict(&line)?;
            if self.feedback.is_interesting(&verdict) {
                tracing::info!(
                    "New edge discovered with input: {}",
                    candidate.escape_ascii()
                );
                stats.discoveries += 1;
                self.best_input = candidate;
            } else {
                tracing::debug!(%verdict, "Input discarded");
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::CoverageProgressFeedback;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;
    use std::io::{Cursor, Write};
    use std::sync::{Arc, Mutex};

    /// Counts up the first byte so every candidate is distinguishable.
    struct CountingMutator;

    impl Mutator<ChaCha8Rng> for CountingMutator {
        fn mutate(
            &mut self,
            input_opt: Option<&[u8]>,
            _rng: &mut ChaCha8Rng,
        ) -> Result<Vec<u8>, anyhow::Error> {
            let mut bytes = input_opt.unwrap_or(&[0]).to_vec();
            bytes[0] = bytes[0].wrapping_add(1);
            Ok(bytes)
        }
    }

    struct RecordingExecutor {
        delivered: Arc<Mutex<Vec<Vec<u8>>>>,
        failures_left: usize,
    }

    impl Executor for RecordingExecutor {
        fn execute_sync(&mut self, input: &[u8]) -> ExecutionStatus {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return ExecutionStatus::Timeout;
            }
            self.delivered.lock().unwrap().push(input.to_vec());
            ExecutionStatus::Ok
        }
    }

    fn client(failures: usize) -> (FuzzClient<ChaCha8Rng>, Arc<Mutex<Vec<Vec<u8>>>>) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let executor = RecordingExecutor {
            delivered: Arc::clone(&delivered),
            failures_left: failures,
        };
        let client = FuzzClient::new(
            Box::new(CountingMutator),
            Box::new(executor),
            Box::new(CoverageProgressFeedback::new()),
            ChaCha8Rng::from_seed([0u8; 32]),
            vec![10],
        )
        .with_retry_delay(Duration::from_millis(1));
        (client, delivered)
    }

    #[test]
    fn keeps_inputs_that_make_progress() {
        let (mut client, delivered) = client(0);
        let mut verdicts = Cursor::new(b"INC:+1\nEQU:+1\nDEC:+2\nDEC:+0\n".to_vec());

        let stats = client.run(&mut verdicts, &StopToken::new()).unwrap();

        assert_eq!(
            stats,
            FuzzStats {
                executions: 5,
                discoveries: 2,
                target_errors: 0
            }
        );
        // 11 kept, 12 dropped, 12 kept, 13 dropped, 13 sent into the closed stream.
        assert_eq!(
            *delivered.lock().unwrap(),
            vec![vec![11], vec![12], vec![12], vec![13], vec![13]]
        );
        assert_eq!(client.best_input(), &[12]);
    }

    #[test]
    fn target_errors_back_off_without_consuming_verdicts() {
        let (mut client, delivered) = client(2);
        let mut verdicts = Cursor::new(b"INC:+1\n".to_vec());

        let stats = client.run(&mut verdicts, &StopToken::new()).unwrap();

        assert_eq!(stats.target_errors, 2);
        assert_eq!(stats.executions, 2, "The second delivery hits the closed stream");
        assert_eq!(delivered.lock().unwrap().len(), 2);
        assert_eq!(client.best_input(), &[11]);
    }

    #[test]
    fn iteration_budget_is_respected() {
        let (client, _) = client(0);
        let mut client = client.with_max_iterations(Some(1));
        let mut verdicts = Cursor::new(b"INC:+1\nINC:+1\n".to_vec());

        let stats = client.run(&mut verdicts, &StopToken::new()).unwrap();
        assert_eq!(stats.executions, 1);
    }

    #[test]
    fn malformed_verdict_is_an_error() {
        let (mut client, _) = client(0);
        let mut verdicts = Cursor::new(b"garbage\n".to_vec());
        assert!(matches!(
            client.run(&mut verdicts, &StopToken::new()),
            Err(FuzzClientError::Verdict(VerdictError::Malformed(_)))
        ));
    }

    #[test]
    fn stop_token_halts_before_the_first_iteration() {
        let (mut client, delivered) = client(0);
        let stop = StopToken::new();
        stop.request_stop();

        let stats = client.run(&mut Cursor::new(Vec::new()), &stop).unwrap();
        assert_eq!(stats, FuzzStats::default());
        assert!(delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn accepts_a_proxy_connection_over_tcp() {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        let listen = probe.local_addr().unwrap().to_string();
        drop(probe);

        let proxy_addr = listen.clone();
        let proxy = thread::spawn(move || {
            for _ in 0..100 {
                if let Ok(mut stream) = TcpStream::connect(&proxy_addr) {
                    stream.write_all(b"INC:+7\n").unwrap();
                    return;
                }
                thread::sleep(Duration::from_millis(10));
            }
            panic!("fuzzing client never started listening");
        });

        let mut verdicts = accept_proxy(&listen).unwrap();
        let mut line = String::new();
        verdicts.read_line(&mut line).unwrap();
        proxy.join().unwrap();
        assert_eq!(line, "INC:+7\n");
    }
}
