use crate::trend::{CoverageTrend, TrendResult};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerdictError {
    #[error("Unknown verdict status {0:?}")]
    UnknownStatus(String),
    #[error("Malformed verdict line: {0:?}")]
    Malformed(String),
}

/// Three-letter status code sent on the wire for a classification.
///
/// The letters are not mnemonic for the classification names; fuzzing clients already in the
/// field rely on this exact mapping.
pub fn status_code(trend: CoverageTrend) -> &'static str {
    match trend {
        CoverageTrend::EdgeIncrease => "INC",
        CoverageTrend::Stable => "DEC",
        CoverageTrend::EdgeDecrease => "EQU",
    }
}

fn trend_from_status(status: &str) -> Result<CoverageTrend, VerdictError> {
    match status {
        "INC" => Ok(CoverageTrend::EdgeIncrease),
        "DEC" => Ok(CoverageTrend::Stable),
        "EQU" => Ok(CoverageTrend::EdgeDecrease),
        other => Err(VerdictError::UnknownStatus(other.to_string())),
    }
}

/// Renders a verdict as one wire line, e.g. `INC:+5\n`. The delta always carries its sign.
pub fn encode_verdict(result: &TrendResult) -> String {
    format!("{}:{:+}\n", status_code(result.trend), result.delta)
}

/// Decodes a wire line produced by [`encode_verdict`]. A trailing line terminator is accepted.
pub fn parse_verdict(line: &str) -> Result<TrendResult, VerdictError> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    let (status, delta) = trimmed
        .split_once(':')
        .ok_or_else(|| VerdictError::Malformed(trimmed.to_string()))?;
    let trend = trend_from_status(status)?;
    let delta: i64 = delta
        .parse()
        .map_err(|_| VerdictError::Malformed(trimmed.to_string()))?;
    Ok(TrendResult::new(trend, delta))
}
