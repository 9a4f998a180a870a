use crate::trend::TrendResult;
use crate::verdict::encode_verdict;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

/// Errors on the link to the fuzzing client.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// The target address could not be resolved to any socket address.
    #[error("Unable to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Every resolved address refused the connection or timed out.
    #[error("Unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Writing a verdict failed. The link is considered dead after this.
    #[error("Socket write failed: {0}")]
    Send(#[source] io::Error),
}

/// Destination for verdicts produced by the ingestion loop.
pub trait VerdictSink {
    fn send(&mut self, verdict: &TrendResult) -> Result<(), ForwardError>;
}

impl<T: VerdictSink + ?Sized> VerdictSink for &mut T {
    fn send(&mut self, verdict: &TrendResult) -> Result<(), ForwardError> {
        (**self).send(verdict)
    }
}

/// Writes verdict lines to the fuzzing client.
#[derive(Debug)]
pub struct ForwardingLink<W: Write> {
    writer: W,
}

impl ForwardingLink<TcpStream> {
    /// Opens the outbound connection. Only the connect attempt is bounded by `timeout`; writes on
    /// the established stream block without a deadline.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ForwardError> {
        let addr = format!("{host}:{port}");
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|source| ForwardError::Resolve {
                addr: addr.clone(),
                source,
            })?;

        let mut last_error =
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses to connect to");
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true).map_err(|source| ForwardError::Connect {
                        addr: addr.clone(),
                        source,
                    })?;
                    tracing::debug!(%candidate, "Connected to fuzzing client");
                    return Ok(Self::new(stream));
                }
                Err(e) => last_error = e,
            }
        }
        Err(ForwardError::Connect {
            addr,
            source: last_error,
        })
    }
}

impl<W: Write> ForwardingLink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> VerdictSink for ForwardingLink<W> {
    fn send(&mut self, verdict: &TrendResult) -> Result<(), ForwardError> {
        let line = encode_verdict(verdict);
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(ForwardError::Send)
    }
}
