use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Cooperative cancellation flag shared between the thread that owns the process lifecycle and
/// the long-running loops.
///
/// Requesting a stop never interrupts a blocking read; loops observe the flag between records.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    requested: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Spawns a watcher thread that requests a stop on `token` when the process receives Ctrl-C.
///
/// The signal handler is installed through a single-threaded tokio runtime owned by the watcher.
pub fn stop_on_ctrl_c(token: StopToken) -> io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;

    thread::Builder::new()
        .name("netcov-signal".to_string())
        .spawn(move || match runtime.block_on(tokio::signal::ctrl_c()) {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping after the current record");
                token.request_stop();
            }
            Err(e) => tracing::warn!("Unable to listen for Ctrl-C: {e}"),
        })
}
