use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The input was delivered to the target.
    Ok,
    /// The target did not accept the connection in time.
    Timeout,
    /// Any other socket failure while delivering the input.
    Other(String),
}

/// Delivers one test case to the instrumented target.
pub trait Executor {
    fn execute_sync(&mut self, input: &[u8]) -> ExecutionStatus;
}

/// Sends each input over a fresh TCP connection to a network target.
///
/// The connection is closed right after the input is written; the target's coverage arrives
/// separately through the trace channel and the proxy.
#[derive(Debug, Clone)]
pub struct TcpTargetExecutor {
    target: String,
    timeout: Duration,
}

impl TcpTargetExecutor {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }

    fn deliver(&self, input: &[u8]) -> io::Result<()> {
        let mut last_error = io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{} did not resolve to any address", self.target),
        );
        for addr in self.target.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(mut stream) => {
                    stream.set_write_timeout(Some(self.timeout))?;
                    stream.write_all(input)?;
                    // The peer may already have closed its side.
                    let _ = stream.shutdown(Shutdown::Write);
                    return Ok(());
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

impl Executor for TcpTargetExecutor {
    fn execute_sync(&mut self, input: &[u8]) -> ExecutionStatus {
        match self.deliver(input) {
            Ok(()) => ExecutionStatus::Ok,
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                ExecutionStatus::Timeout
            }
            Err(e) => ExecutionStatus::Other(format!("{}: {}", self.target, e)),
        }
    }
}
