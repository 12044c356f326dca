//! Sorted key vectors, one per dimension.

use crate::container::{strip_padding, Cells, Container};
use crate::error::Result;
use crate::trace::{Op, Recorder, Trace};

use std::cmp::Ordering;
use std::path::Path;

/// A container of one dimension's distinct keys in ascending byte order. The
/// position of a key is its coordinate along the dimension.
#[derive(Debug)]
pub struct Vector {
    container: Container,
}

impl Vector {
    pub fn open(path: &Path, name: impl Into<String>, batch_bytes: usize) -> Result<Self> {
        Ok(Self {
            container: Container::open(path, name, batch_bytes)?,
        })
    }

    pub fn len(&self) -> u64 {
        self.container.cell_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &str {
        self.container.name()
    }

    /// Binary search for `key`, one single-cell read per probe.
    ///
    /// Probes follow a fixed schedule so the read count of a search only
    /// depends on the key's position: `mid = low + (high - low) / 2` over the
    /// inclusive range `[0, n - 1]`, and the last cell is only probed once the
    /// range has collapsed onto it.
    pub fn locate(&self, key: &[u8], trace: Option<&Trace>) -> Result<Option<u64>> {
        let recorder = trace.map(|t| t.span(Op::BinarySearch, String::from_utf8_lossy(key)));

        let n = self.len();
        if n == 0 {
            return Ok(None);
        }

        let last = n - 1;
        let (mut low, mut high) = (0, last);
        while low < high {
            let mid = low + (high - low) / 2;
            match self.compare(key, mid, recorder)? {
                Ordering::Equal => return Ok(Some(mid)),
                Ordering::Less => high = mid,
                Ordering::Greater => low = mid + 1,
            }
        }

        if low == last && self.compare(key, low, recorder)? == Ordering::Equal {
            return Ok(Some(low));
        }
        Ok(None)
    }

    /// Lazily iterates every key in order.
    pub fn keys<'a>(&'a self, recorder: Option<Recorder<'a>>) -> Cells<'a> {
        self.container.cells(0, None, recorder)
    }

    fn compare(&self, key: &[u8], index: u64, recorder: Option<Recorder<'_>>) -> Result<Ordering> {
        let cells = self.container.read_cells(index, 1, recorder)?;
        let cell = cells.first().map(|c| strip_padding(c)).unwrap_or_default();
        Ok(key.cmp(cell))
    }
}
