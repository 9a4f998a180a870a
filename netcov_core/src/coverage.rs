use std::collections::HashSet;
use std::fmt;

/// A single directed edge observed in the target, together with how often it was taken.
///
/// Labels are opaque `<module-or-symbol>+<offset>` strings (e.g. `libc-2.31+4a12`) and are never
/// interpreted. The hit count is part of the record's identity: the same two endpoints taken a
/// different number of times form a different record, which is what lets a deeper loop iteration
/// register as a change in coverage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeRecord {
    pub from: String,
    pub to: String,
    pub hits: u64,
}

impl EdgeRecord {
    pub fn new(from: impl Into<String>, to: impl Into<String>, hits: u64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            hits,
        }
    }
}

/// Renders the record as one entry of the trace edge grammar, `from->to:hits;`.
impl fmt::Display for EdgeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{};", self.from, self.to, self.hits)
    }
}

/// The set of edges covered by one execution, as reported on one channel.
///
/// A snapshot is immutable once built. It is tagged with the channel (`fd`) and the
/// syscall/event name that produced it; those tags record provenance only, so equality and the
/// set operations below look at the edge set alone.
#[derive(Debug, Clone, Default)]
pub struct CoverageSnapshot {
    syscall: String,
    fd: u32,
    edges: HashSet<EdgeRecord>,
}

impl CoverageSnapshot {
    pub fn new(
        syscall: impl Into<String>,
        fd: u32,
        edges: impl IntoIterator<Item = EdgeRecord>,
    ) -> Self {
        Self {
            syscall: syscall.into(),
            fd,
            edges: edges.into_iter().collect(),
        }
    }

    /// The baseline an unseen channel starts from.
    pub fn empty(fd: u32) -> Self {
        Self {
            syscall: String::new(),
            fd,
            edges: HashSet::new(),
        }
    }

    pub fn syscall(&self) -> &str {
        &self.syscall
    }

    pub fn fd(&self) -> u32 {
        self.fd
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, edge: &EdgeRecord) -> bool {
        self.edges.contains(edge)
    }

    pub fn edges(&self) -> impl Iterator<Item = &EdgeRecord> {
        self.edges.iter()
    }

    pub fn is_subset(&self, other: &CoverageSnapshot) -> bool {
        self.edges.is_subset(&other.edges)
    }

    pub fn is_superset(&self, other: &CoverageSnapshot) -> bool {
        self.edges.is_superset(&other.edges)
    }

    /// Edges present in `self` but absent from `other`.
    pub fn difference<'a>(
        &'a self,
        other: &'a CoverageSnapshot,
    ) -> impl Iterator<Item = &'a EdgeRecord> {
        self.edges.difference(&other.edges)
    }

    /// Serializes the snapshot back into a trace line (without a line terminator).
    ///
    /// Edges are emitted in sorted order so that the output is deterministic.
    pub fn to_trace_line(&self) -> String {
        let mut edges: Vec<&EdgeRecord> = self.edges.iter().collect();
        edges.sort();
        let mut line = format!("{}:{}=", self.syscall, self.fd);
        for edge in edges {
            line.push_str(&edge.to_string());
        }
        line
    }
}

impl PartialEq for CoverageSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.edges == other.edges
    }
}

impl Eq for CoverageSnapshot {}
