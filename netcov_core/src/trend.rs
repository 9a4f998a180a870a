use crate::coverage::{CoverageSnapshot, EdgeRecord};
use std::fmt;

/// Direction of a coverage change between a baseline and a candidate snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoverageTrend {
    EdgeIncrease,
    EdgeDecrease,
    #[default]
    Stable,
}

/// Classification plus magnitude of a comparison.
///
/// The meaning of `delta` depends on the classification:
/// * `EdgeIncrease`: number of new distinct edges (or the positive net change when the sets are
///   incomparable).
/// * `EdgeDecrease`: number of lost edges when the candidate is a strict subset, or the negative
///   net change when the sets are incomparable.
/// * `Stable`: zero for identical sets, otherwise the difference in summed hit counts between the
///   two one-sided differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TrendResult {
    pub trend: CoverageTrend,
    pub delta: i64,
}

impl TrendResult {
    pub fn new(trend: CoverageTrend, delta: i64) -> Self {
        Self { trend, delta }
    }

    /// Whether this result is a forward signal, i.e. one that moves a baseline.
    ///
    /// A positive delta counts as progress unless the edge set shrank.
    pub fn is_progress(&self) -> bool {
        self.delta > 0 && self.trend != CoverageTrend::EdgeDecrease
    }
}

impl fmt::Display for TrendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.trend {
            CoverageTrend::EdgeIncrease => write!(f, "Edge count increased by {}", self.delta),
            CoverageTrend::Stable => {
                write!(f, "Edge count stable. Hit count changed by {}", self.delta)
            }
            CoverageTrend::EdgeDecrease => write!(f, "Edge count decreased by {}", self.delta),
        }
    }
}

fn count_as_delta(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn hit_sum(edges: &[&EdgeRecord]) -> i128 {
    edges.iter().map(|edge| i128::from(edge.hits)).sum()
}

/// Compares a candidate snapshot against the current baseline.
///
/// Rules, in order:
/// 1. identical sets are `Stable` with a delta of 0;
/// 2. a candidate that lost edges and gained none is `EdgeDecrease` by the number lost;
/// 3. a candidate that gained edges and lost none is `EdgeIncrease` by the number gained;
/// 4. otherwise the net change in distinct edges decides, and a tie falls back to the difference
///    in summed hit counts, reported as `Stable`.
pub fn compare(baseline: &CoverageSnapshot, candidate: &CoverageSnapshot) -> TrendResult {
    let lost: Vec<&EdgeRecord> = baseline.difference(candidate).collect();
    let gained: Vec<&EdgeRecord> = candidate.difference(baseline).collect();

    match (gained.is_empty(), lost.is_empty()) {
        (true, true) => TrendResult::new(CoverageTrend::Stable, 0),
        (true, false) => TrendResult::new(CoverageTrend::EdgeDecrease, count_as_delta(lost.len())),
        (false, true) => {
            TrendResult::new(CoverageTrend::EdgeIncrease, count_as_delta(gained.len()))
        }
        (false, false) => {
            let net = count_as_delta(gained.len()) - count_as_delta(lost.len());
            if net > 0 {
                TrendResult::new(CoverageTrend::EdgeIncrease, net)
            } else if net < 0 {
                TrendResult::new(CoverageTrend::EdgeDecrease, net)
            } else {
                let hits = hit_sum(&gained) - hit_sum(&lost);
                let hits = hits.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
                TrendResult::new(CoverageTrend::Stable, hits)
            }
        }
    }
}
