use crate::builder::Builder;
use crate::config::{Config, INDEX_DIR_PREFIX, INDEX_DIR_SUFFIX};
use crate::container::Cells;
use crate::error::Result;
use crate::grid::{CellRange, Grid};
use crate::key::Key;
use crate::query::{self, Query, QueryIter};
use crate::trace::{Op, Trace};
use crate::Error;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What a scan walks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanTarget {
    /// Every non-empty data cell in grid order
    #[default]
    All,
    /// The sorted keys of one dimension
    Dimension(usize),
    /// The sorted keys of an index
    Index(String),
}

impl ScanTarget {
    pub fn index(name: impl Into<String>) -> Self {
        ScanTarget::Index(name.into())
    }
}

/// An open, read-only wordmap.
///
/// Opening parses headers only; every lookup, query and scan reads through
/// positioned reads on the shared file handles, so one instance serves any
/// number of threads.
#[derive(Debug)]
pub struct Wordmap {
    config: Config,
    grid: Grid,
    indexes: BTreeMap<String, Wordmap>,
}

impl Wordmap {
    /// Builds a wordmap without indexes at `path`. See [`Builder`].
    pub fn create<I, K, V>(path: impl AsRef<Path>, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<String>,
    {
        Builder::new(entries).create(path)
    }

    /// Open a wordmap with default configuration
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(Config::new(dir))
    }

    /// Open a wordmap with custom configuration
    pub fn open_with_config(config: Config) -> Result<Self> {
        Self::open_nested(config, "")
    }

    fn open_nested(config: Config, prefix: &str) -> Result<Self> {
        let grid = Grid::open(&config.dir, prefix, config.batch_bytes)?;

        let mut indexes = BTreeMap::new();
        for entry in fs::read_dir(&config.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(dir_name) = file_name.to_str() else {
                continue;
            };
            let Some(name) = dir_name
                .strip_prefix(INDEX_DIR_PREFIX)
                .and_then(|rest| rest.strip_suffix(INDEX_DIR_SUFFIX))
            else {
                continue;
            };
            if name.is_empty() || !entry.file_type()?.is_dir() {
                continue;
            }

            let index_config = Config::new(entry.path()).batch_bytes(config.batch_bytes);
            let index = Self::open_nested(index_config, &format!("{}{}/", prefix, dir_name))?;
            indexes.insert(name.to_string(), index);
        }

        tracing::debug!(
            dir = %config.dir.display(),
            cells = grid.cell_count(),
            dimensions = grid.dimensions(),
            indexes = indexes.len(),
            "Opened wordmap"
        );

        Ok(Self {
            config,
            grid,
            indexes,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of data cells, empty ones included.
    pub fn size(&self) -> u64 {
        self.grid.cell_count()
    }

    pub fn dimensions(&self) -> usize {
        self.grid.dimensions()
    }

    /// Index names in ascending order.
    pub fn index_names(&self) -> Vec<&str> {
        self.indexes.keys().map(String::as_str).collect()
    }

    /// The nested wordmap backing an index: index keys to encoded positions.
    pub fn index(&self, name: &str) -> Option<&Wordmap> {
        self.indexes.get(name)
    }

    pub(crate) fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Values addressed by a full or partial key. Unknown keys give an empty
    /// result.
    pub fn lookup(&self, key: impl Into<Key>) -> Result<Vec<String>> {
        self.lookup_iter_with(&key.into(), None)?.collect()
    }

    pub fn lookup_traced(&self, key: impl Into<Key>, trace: &Trace) -> Result<Vec<String>> {
        self.lookup_iter_with(&key.into(), Some(trace))?.collect()
    }

    /// Resolves `key` now and streams its values in batches.
    pub fn lookup_iter(&self, key: impl Into<Key>) -> Result<Cells<'_>> {
        self.lookup_iter_with(&key.into(), None)
    }

    pub fn lookup_iter_traced<'a>(
        &'a self,
        key: impl Into<Key>,
        trace: &'a Trace,
    ) -> Result<Cells<'a>> {
        self.lookup_iter_with(&key.into(), Some(trace))
    }

    pub(crate) fn lookup_iter_with<'a>(
        &'a self,
        key: &Key,
        trace: Option<&'a Trace>,
    ) -> Result<Cells<'a>> {
        match self.grid.resolve(key, trace)? {
            Some(range) => {
                let recorder = trace.map(|t| t.span(Op::KeyRead, range.to_string()));
                Ok(self.grid.cells(range, recorder))
            }
            None => Ok(self.grid.cells(CellRange::new(0, 0), None)),
        }
    }

    /// Evaluates `query` lazily. Fails up front on unknown index names.
    pub fn query(&self, query: &Query) -> Result<QueryIter<'_>> {
        query::evaluate(self, query, None)
    }

    pub fn query_traced<'a>(&'a self, query: &Query, trace: &'a Trace) -> Result<QueryIter<'a>> {
        query::evaluate(self, query, Some(trace))
    }

    /// Streams data values, dimension keys or index keys in order.
    pub fn scan(&self, target: &ScanTarget) -> Result<Cells<'_>> {
        self.scan_with(target, None)
    }

    pub fn scan_traced<'a>(&'a self, target: &ScanTarget, trace: &'a Trace) -> Result<Cells<'a>> {
        self.scan_with(target, Some(trace))
    }

    fn scan_with<'a>(&'a self, target: &ScanTarget, trace: Option<&'a Trace>) -> Result<Cells<'a>> {
        match target {
            ScanTarget::All => {
                let data = self.grid.data();
                let recorder = trace.map(|t| t.span(Op::Scan, data.name()));
                Ok(data.cells(0, None, recorder))
            }
            ScanTarget::Dimension(dimension) => {
                let vector = self.grid.vector(*dimension).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "dimension {} out of range, wordmap has {}",
                        dimension,
                        self.dimensions()
                    ))
                })?;
                let recorder = trace.map(|t| t.span(Op::Scan, vector.name()));
                Ok(vector.keys(recorder))
            }
            ScanTarget::Index(name) => self
                .index(name)
                .ok_or_else(|| Error::UnknownIndex(name.clone()))?
                .scan_with(&ScanTarget::Dimension(0), trace),
        }
    }
}
