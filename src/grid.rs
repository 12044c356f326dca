//! The data grid: one cell per combination of dimension keys.
//!
//! Cells are laid out in row-major order, the first dimension varying
//! slowest. For dimensions of sizes `s0, s1, ..., sn` the page size of
//! dimension `i` is `s(i+1) * ... * sn`, and the key at coordinate `d` in
//! dimension `i` selects the page `[base + d * page, base + (d + 1) * page)`
//! of the range selected so far.
//!
//! ```text
//!            vec1:  171..  307..  385..  400..  604..  627..
//! vec0: 9780     [  0      1      2      3      4      5   ]
//!       9781     [  6      7      8      9      10     11  ]
//!       9785     [  12     13     14     15     16     17  ]
//! ```
//!
//! Resolving `9780` gives the range `[0, 6)`, resolving `9780:385689229`
//! gives `[2, 3)`.

use crate::config::{self, DATA_FILE};
use crate::container::{Cells, Container};
use crate::error::Result;
use crate::key::Key;
use crate::trace::{Recorder, Trace};
use crate::vector::Vector;
use crate::Error;

use std::path::Path;

/// A contiguous run of data cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: u64,
    pub len: u64,
}

impl CellRange {
    pub fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// Exclusive end.
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end().saturating_sub(1))
    }
}

#[derive(Debug)]
pub struct Grid {
    data: Container,
    vectors: Vec<Vector>,
}

impl Grid {
    /// Opens `data` and `vec0`, `vec1`, ... of a wordmap directory. `prefix`
    /// is prepended to file names in traces.
    pub fn open(dir: &Path, prefix: &str, batch_bytes: usize) -> Result<Self> {
        let data = Container::open(
            &dir.join(DATA_FILE),
            format!("{}{}", prefix, DATA_FILE),
            batch_bytes,
        )?;

        let mut vectors = Vec::new();
        loop {
            let name = config::vector_file(vectors.len());
            let path = dir.join(&name);
            if !path.is_file() {
                break;
            }
            vectors.push(Vector::open(&path, format!("{}{}", prefix, name), batch_bytes)?);
        }
        if vectors.is_empty() {
            return Err(Error::InvalidData(format!(
                "{}: missing {}",
                dir.display(),
                config::vector_file(0)
            )));
        }

        let cells = vectors
            .iter()
            .try_fold(1u64, |cells, vector| cells.checked_mul(vector.len()))
            .ok_or_else(|| Error::InvalidData("vector sizes overflow".to_string()))?;
        if cells != data.cell_count() {
            return Err(Error::InvalidData(format!(
                "{}: vectors span {} cells, data holds {}",
                dir.display(),
                cells,
                data.cell_count()
            )));
        }

        Ok(Self { data, vectors })
    }

    pub fn cell_count(&self) -> u64 {
        self.data.cell_count()
    }

    pub fn dimensions(&self) -> usize {
        self.vectors.len()
    }

    pub fn vector(&self, dimension: usize) -> Option<&Vector> {
        self.vectors.get(dimension)
    }

    pub fn data(&self) -> &Container {
        &self.data
    }

    /// Resolves a full or partial key to the cells it addresses. Returns
    /// `None` as soon as one part is missing from its vector, or when the key
    /// has more parts than the grid has dimensions.
    pub fn resolve(&self, key: &Key, trace: Option<&Trace>) -> Result<Option<CellRange>> {
        let mut range = CellRange::new(0, self.cell_count());

        for (dimension, part) in key.parts().iter().enumerate() {
            let Some(vector) = self.vectors.get(dimension) else {
                return Ok(None);
            };
            if vector.is_empty() {
                return Ok(None);
            }
            let Some(index) = vector.locate(part.as_bytes(), trace)? else {
                return Ok(None);
            };

            let page = range.len / vector.len();
            range = CellRange::new(range.start + page * index, page);
        }

        Ok(Some(range))
    }

    /// Lazily iterates the non-empty values of a cell range.
    pub fn cells<'a>(&'a self, range: CellRange, recorder: Option<Recorder<'a>>) -> Cells<'a> {
        self.data.cells(range.start, Some(range.len), recorder)
    }
}
