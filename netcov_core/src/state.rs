use crate::coverage::CoverageSnapshot;
use crate::trend::{self, TrendResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Baselines {
    per_channel: HashMap<u32, CoverageSnapshot>,
    current: TrendResult,
}

/// Per-channel coverage baselines shared between the ingestion thread and its observers.
///
/// Every read and write goes through a single mutex. The critical section only compares two
/// snapshots and possibly swaps one in; no I/O happens while the lock is held.
#[derive(Debug, Default)]
pub struct CoverageState {
    inner: Mutex<Baselines>,
}

impl CoverageState {
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded data is only ever replaced wholesale, so a poisoned lock still holds a
    // consistent table.
    fn lock(&self) -> MutexGuard<'_, Baselines> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compares `candidate` with the baseline of channel `fd` and records the result as the
    /// current trend.
    ///
    /// Unseen channels start from an empty baseline. The candidate becomes the new baseline only
    /// when the result is a forward signal (see [`TrendResult::is_progress`]); stable, negative or
    /// shrinking results leave the stored baseline untouched.
    pub fn update(&self, fd: u32, candidate: CoverageSnapshot) -> TrendResult {
        let mut guard = self.lock();
        let baselines = &mut *guard;

        let result = match baselines.per_channel.get(&fd) {
            Some(baseline) => trend::compare(baseline, &candidate),
            None => trend::compare(&CoverageSnapshot::empty(fd), &candidate),
        };

        if result.is_progress() {
            baselines.per_channel.insert(fd, candidate);
        }
        baselines.current = result;
        result
    }

    /// The result of the most recent `update`, or `(Stable, 0)` before the first one.
    pub fn current_trend(&self) -> TrendResult {
        self.lock().current
    }

    /// A copy of the stored baseline for `fd`, if the channel ever moved forward.
    pub fn baseline(&self, fd: u32) -> Option<CoverageSnapshot> {
        self.lock().per_channel.get(&fd).cloned()
    }

    /// Number of channels holding a non-default baseline.
    pub fn channel_count(&self) -> usize {
        self.lock().per_channel.len()
    }
}
