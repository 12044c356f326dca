//! Read tracing.
//!
//! A [`Trace`] records every physical read issued on behalf of a lookup,
//! query or scan. Reads are grouped into spans, one per logical step: a
//! binary search over a vector, the data read of a direct lookup, one batched
//! data read of a query, or a scan. Tracing never changes results.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// The logical step a span belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Binary search of one key part in a vector.
    BinarySearch,
    /// Data read of a direct key lookup.
    KeyRead,
    /// One batched data read of a query run.
    QueryRead,
    /// Sequential scan of data, a vector or an index.
    Scan,
}

/// One physical read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    /// Container file, relative to the root wordmap (`data`, `i-year.wmap/vec0`)
    pub file: String,
    /// First cell read
    pub start: u64,
    /// Number of cells read
    pub count: u64,
    /// Byte offset of the read
    pub offset: u64,
    /// Byte length of the read
    pub len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub op: Op,
    pub label: String,
    pub reads: Vec<Read>,
}

#[derive(Debug, Default)]
pub struct Trace {
    spans: Mutex<Vec<Span>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new span and returns a recorder for its reads.
    pub fn span(&self, op: Op, label: impl Into<String>) -> Recorder<'_> {
        let mut spans = self.lock();
        spans.push(Span {
            op,
            label: label.into(),
            reads: Vec::new(),
        });
        Recorder {
            trace: self,
            span: spans.len() - 1,
        }
    }

    pub fn spans(&self) -> Vec<Span> {
        self.lock().clone()
    }

    /// Number of reads per span, in span order.
    pub fn breakdown(&self) -> Vec<(Op, usize)> {
        self.lock()
            .iter()
            .map(|span| (span.op, span.reads.len()))
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.lock().iter().map(|span| span.reads.len()).sum()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Span>> {
        // Spans are append-only, a poisoned guard still holds consistent data.
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle appending reads to one span of a [`Trace`].
#[derive(Debug, Clone, Copy)]
pub struct Recorder<'a> {
    trace: &'a Trace,
    span: usize,
}

impl Recorder<'_> {
    pub(crate) fn record(&self, read: Read) {
        if let Some(span) = self.trace.lock().get_mut(self.span) {
            span.reads.push(read);
        }
    }
}
