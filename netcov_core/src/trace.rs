use crate::coverage::{CoverageSnapshot, EdgeRecord};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// `<syscall>:<fd>=<edges>`, anchored at the start of the line.
static TRACE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+):([0-9]+)=(.*)").expect("trace header pattern is valid"));

/// One `<label>-><label>:<count>;` entry of the edge list.
static EDGE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\w\-.]+\+\d+)->([\w\-.]+\+\d+):([0-9]+);").expect("edge entry pattern is valid")
});

/// Errors raised while parsing a trace line produced by the instrumentation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// The line does not follow the trace grammar. Carries the offending line and what was wrong.
    #[error("Invalid coverage trace ({reason}): {line:?}")]
    Malformed { line: String, reason: &'static str },
}

impl TraceError {
    fn malformed(line: &str, reason: &'static str) -> Self {
        TraceError::Malformed {
            line: line.to_string(),
            reason,
        }
    }
}

/// Parses one trace line into a snapshot tagged with its syscall name and channel.
///
/// The header (`syscall:fd=`) must match or the whole line is rejected. Edge entries are then
/// collected from the remainder by repeated matching; anything between entries is ignored and a
/// line with no entries yields a valid, empty snapshot.
///
/// # Errors
/// `TraceError::Malformed` if the header does not match, or if the channel or a hit count does
/// not fit its integer type.
pub fn parse_trace_line(line: &str) -> Result<CoverageSnapshot, TraceError> {
    let line = line.trim_end_matches(['\n', '\r']);

    let header = TRACE_HEADER
        .captures(line)
        .ok_or_else(|| TraceError::malformed(line, "missing syscall:fd= header"))?;

    let syscall = &header[1];
    let fd: u32 = header[2]
        .parse()
        .map_err(|_| TraceError::malformed(line, "channel does not fit in u32"))?;

    let mut edges = Vec::new();
    for entry in EDGE_ENTRY.captures_iter(&header[3]) {
        let hits: u64 = entry[3]
            .parse()
            .map_err(|_| TraceError::malformed(line, "hit count does not fit in u64"))?;
        edges.push(EdgeRecord::new(&entry[1], &entry[2], hits));
    }

    Ok(CoverageSnapshot::new(syscall, fd, edges))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_syscall_fd_and_edges() {
        let snapshot = parse_trace_line("read:3=mod+10->mod+20:1;mod+20->mod+30:4;\n").unwrap();
        assert_eq!(snapshot.syscall(), "read");
        assert_eq!(snapshot.fd(), 3);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&EdgeRecord::new("mod+10", "mod+20", 1)));
        assert!(snapshot.contains(&EdgeRecord::new("mod+20", "mod+30", 4)));
    }

    #[test]
    fn accepts_dotted_and_dashed_labels() {
        let snapshot = parse_trace_line("recv:12=libc-2.31.so+4412->app_main+16:7;\r\n").unwrap();
        assert_eq!(snapshot.fd(), 12);
        assert!(snapshot.contains(&EdgeRecord::new("libc-2.31.so+4412", "app_main+16", 7)));
    }

    #[test]
    fn header_without_edges_is_an_empty_snapshot() {
        let snapshot = parse_trace_line("open:3=").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.syscall(), "open");

        let noise = parse_trace_line("open:3=this is not an edge list").unwrap();
        assert!(
            noise.is_empty(),
            "Unmatched edge text should produce an empty snapshot, not an error"
        );
    }

    #[test]
    fn skips_text_between_edge_entries() {
        let snapshot = parse_trace_line("read:4=garbage a+1->b+2:3; junk c+5->d+6:1;").unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&EdgeRecord::new("c+5", "d+6", 1)));
    }

    #[test]
    fn rejects_line_without_separator() {
        match parse_trace_line("read:3 a+1->b+2:1;") {
            Err(TraceError::Malformed { reason, .. }) => {
                assert_eq!(reason, "missing syscall:fd= header")
            }
            other => panic!("Expected a malformed trace error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_numeric_and_negative_channels() {
        assert!(parse_trace_line("read:abc=a+1->b+2:1;").is_err());
        assert!(parse_trace_line("read:-3=a+1->b+2:1;").is_err());
        assert!(parse_trace_line(":3=a+1->b+2:1;").is_err());
        assert!(parse_trace_line("").is_err());
    }

    #[test]
    fn rejects_channel_overflow() {
        let err = parse_trace_line("read:99999999999=a+1->b+2:1;").unwrap_err();
        assert!(matches!(
            err,
            TraceError::Malformed {
                reason: "channel does not fit in u32",
                ..
            }
        ));
    }

    #[test]
    fn rejects_hit_count_overflow() {
        let err = parse_trace_line("read:3=a+1->b+2:99999999999999999999999;").unwrap_err();
        assert!(matches!(
            err,
            TraceError::Malformed {
                reason: "hit count does not fit in u64",
                ..
            }
        ));
    }

    #[test]
    fn round_trips_through_the_edge_grammar() {
        let line = "write:8=x+1->y+2:5;y+2->z+3:1;x+1->y+2:6;";
        let parsed = parse_trace_line(line).unwrap();
        let reparsed = parse_trace_line(&parsed.to_trace_line()).unwrap();
        assert_eq!(parsed, reparsed);
        assert_eq!(reparsed.syscall(), "write");
        assert_eq!(reparsed.fd(), 8);
    }
}
