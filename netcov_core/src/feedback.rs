use crate::trend::TrendResult;

/// Decides whether the verdict received for an input makes that input worth keeping.
pub trait Feedback: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_interesting(&mut self, verdict: &TrendResult) -> bool;
}

/// Keeps an input whenever its verdict would also have advanced the proxy's baseline: new
/// distinct edges, or the same edges taken more often.
#[derive(Debug, Default)]
pub struct CoverageProgressFeedback {
    pub accepted: u64,
    pub rejected: u64,
}

impl CoverageProgressFeedback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Feedback for CoverageProgressFeedback {
    fn name(&self) -> &'static str {
        "CoverageProgressFeedback"
    }

    fn is_interesting(&mut self, verdict: &TrendResult) -> bool {
        let keep = verdict.is_progress();
        if keep {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
        keep
    }
}
