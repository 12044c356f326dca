//! Query evaluation.
//!
//! A [`Query`] is a conjunction of clauses, each clause a disjunction of keys:
//! either primary keys (full or partial) or keys of a named index. Every
//! clause resolves to an ascending stream of data cell positions; the streams
//! are intersected, grouped into runs of consecutive cells and each run is
//! fetched with one batched read.
//!
//! Key clauses resolve lazily, one key per pull. Index clauses look their
//! keys up when the query is evaluated and decode the stored position
//! sequences lazily.

use crate::container::Cells;
use crate::error::Result;
use crate::grid::{CellRange, Grid};
use crate::key::Key;
use crate::positions::{self, runs, Intersect, Positions, UniqUnion};
use crate::store::Wordmap;
use crate::trace::{Op, Trace};
use crate::Error;

use itertools::Itertools as _;
use std::collections::HashSet;
use std::ops::{Range, RangeInclusive};

/// One disjunction of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Cells addressed by any of the keys.
    Keys(Vec<Key>),
    /// Cells carrying any of the keys in the named index.
    Index { name: String, keys: Vec<Key> },
}

impl Clause {
    pub fn keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Clause::Keys(keys.into_iter().map(Into::into).collect())
    }

    pub fn index<I, K>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        Clause::Index {
            name: name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Index name, `None` for primary keys. Clauses of equal shape can be
    /// merged.
    pub fn index_name(&self) -> Option<&str> {
        match self {
            Clause::Keys(_) => None,
            Clause::Index { name, .. } => Some(name.as_str()),
        }
    }

    pub fn key_list(&self) -> &[Key] {
        match self {
            Clause::Keys(keys) | Clause::Index { keys, .. } => keys,
        }
    }

    fn key_list_mut(&mut self) -> &mut Vec<Key> {
        match self {
            Clause::Keys(keys) | Clause::Index { keys, .. } => keys,
        }
    }
}

/// A conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a clause matching any of the primary keys.
    pub fn keys<I, K>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.clause(Clause::keys(keys))
    }

    /// Adds a clause matching any of the keys of index `name`.
    pub fn index<I, K>(self, name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Key>,
    {
        self.clause(Clause::index(name, keys))
    }

    pub fn clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Merges clauses of the same shape by intersecting their key lists, so
    /// keys that cannot match are never resolved. A merged clause takes the
    /// place and key order of the first clause of its shape. A single clause
    /// is returned as is.
    pub fn normalized(&self) -> Vec<Clause> {
        if self.clauses.len() <= 1 {
            return self.clauses.clone();
        }

        let mut merged: Vec<Clause> = Vec::new();
        for clause in &self.clauses {
            match merged
                .iter_mut()
                .find(|m| m.index_name() == clause.index_name())
            {
                Some(existing) => {
                    let keep: HashSet<&Key> = clause.key_list().iter().collect();
                    existing.key_list_mut().retain(|key| keep.contains(key));
                }
                None => {
                    let mut clause = clause.clone();
                    let unique = clause.key_list().iter().unique().cloned().collect();
                    *clause.key_list_mut() = unique;
                    merged.push(clause);
                }
            }
        }
        merged
    }
}

impl From<Clause> for Query {
    fn from(clause: Clause) -> Self {
        Self {
            clauses: vec![clause],
        }
    }
}

impl FromIterator<Clause> for Query {
    fn from_iter<I: IntoIterator<Item = Clause>>(iter: I) -> Self {
        Self {
            clauses: iter.into_iter().collect(),
        }
    }
}

/// Resolves `query` against `store`. Index clauses are looked up here; key
/// clauses and data reads happen while the returned iterator is pulled.
pub(crate) fn evaluate<'a>(
    store: &'a Wordmap,
    query: &Query,
    trace: Option<&'a Trace>,
) -> Result<QueryIter<'a>> {
    let mut sources: Vec<Positions<'a>> = Vec::new();

    for clause in query.normalized() {
        match clause {
            Clause::Keys(keys) => {
                sources.push(Box::new(KeyPositions::new(store.grid(), keys, trace)));
            }
            Clause::Index { name, keys } => {
                let index = store
                    .index(&name)
                    .ok_or_else(|| Error::UnknownIndex(name.clone()))?;

                let mut sequences: Vec<Positions<'a>> = Vec::new();
                for key in &keys {
                    for encoded in index.lookup_iter_with(key, trace)? {
                        sequences.push(Box::new(positions::decode(encoded?)));
                    }
                }
                sources.push(Box::new(UniqUnion::new(sequences)));
            }
        }
    }

    tracing::trace!(clauses = sources.len(), "Evaluating query");
    Ok(QueryIter {
        grid: store.grid(),
        trace,
        runs: Box::new(runs(Intersect::new(sources))),
        current: None,
        done: false,
    })
}

/// Positions addressed by a list of primary keys, resolved one key at a time
/// in key order. Positions covered by an earlier key are skipped.
struct KeyPositions<'a> {
    grid: &'a Grid,
    trace: Option<&'a Trace>,
    keys: std::vec::IntoIter<Key>,
    current: Range<u64>,
    floor: u64,
    failed: bool,
}

impl<'a> KeyPositions<'a> {
    fn new(grid: &'a Grid, mut keys: Vec<Key>, trace: Option<&'a Trace>) -> Self {
        keys.sort();
        keys.dedup();
        Self {
            grid,
            trace,
            keys: keys.into_iter(),
            current: 0..0,
            floor: 0,
            failed: false,
        }
    }
}

impl Iterator for KeyPositions<'_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if let Some(position) = self.current.next() {
                self.floor = position + 1;
                return Some(Ok(position));
            }

            let key = self.keys.next()?;
            match self.grid.resolve(&key, self.trace) {
                Ok(Some(range)) => self.current = range.start.max(self.floor)..range.end(),
                Ok(None) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Lazy query results: non-empty values in ascending cell order.
pub struct QueryIter<'a> {
    grid: &'a Grid,
    trace: Option<&'a Trace>,
    runs: Box<dyn Iterator<Item = Result<RangeInclusive<u64>>> + Send + 'a>,
    current: Option<Cells<'a>>,
    done: bool,
}

impl Iterator for QueryIter<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cells) = self.current.as_mut() {
                match cells.next() {
                    Some(Ok(value)) => return Some(Ok(value)),
                    Some(Err(e)) => {
                        self.current = None;
                        self.done = true;
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }
            if self.done {
                return None;
            }

            match self.runs.next() {
                Some(Ok(run)) => {
                    let range = CellRange::new(*run.start(), run.end() - run.start() + 1);
                    let recorder = self.trace.map(|t| t.span(Op::QueryRead, range.to_string()));
                    self.current = Some(self.grid.cells(range, recorder));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerWriter;
    use tempfile::{tempdir, TempDir};

    /// 3 x 6 grid, every cell holding its position.
    fn grid() -> (TempDir, Grid) {
        let dir = tempdir().expect("Failed to create temp dir");
        ContainerWriter::write_all(&dir.path().join("vec0"), &["9780", "9781", "9785"])
            .expect("Failed to write vec0");
        ContainerWriter::write_all(
            &dir.path().join("vec1"),
            &["171144258", "307946911", "385689229", "400033553", "604041598", "627790369"],
        )
        .expect("Failed to write vec1");
        let cells: Vec<String> = (0..18).map(|i| i.to_string()).collect();
        ContainerWriter::write_all(&dir.path().join("data"), &cells).expect("Failed to write data");

        let grid = Grid::open(dir.path(), "", 10_000).expect("Failed to open grid");
        (dir, grid)
    }

    fn key_positions(grid: &Grid, keys: Vec<Key>) -> Result<Vec<u64>> {
        KeyPositions::new(grid, keys, None).collect()
    }

    #[test]
    fn test_normalize_merges_clauses_of_same_shape() {
        let query = Query::new()
            .index("year", ["2016", "2002"])
            .keys(["a", "b", "c", "a"])
            .index("year", ["2002", "1914"])
            .keys(["c", "a"]);

        assert_eq!(
            query.normalized(),
            vec![Clause::index("year", ["2002"]), Clause::keys(["a", "c"])]
        );
    }

    #[test]
    fn test_normalize_keeps_distinct_indexes_apart() {
        let query = Query::new()
            .index("year", ["2014", "2016"])
            .index("author", ["Hampton Sides"]);
        assert_eq!(query.normalized(), query.clauses().to_vec());
    }

    #[test]
    fn test_single_clause_is_not_normalized() {
        let query = Query::from(Clause::keys(["b", "a", "b"]));
        assert_eq!(query.normalized(), vec![Clause::keys(["b", "a", "b"])]);
        assert!(Query::new().normalized().is_empty());
    }

    #[test]
    fn test_disjoint_clauses_normalize_to_empty_keys() {
        let query: Query = vec![Clause::keys(["a"]), Clause::keys(["b"])]
            .into_iter()
            .collect();
        assert_eq!(query.normalized(), vec![Clause::Keys(Vec::new())]);
    }

    #[test]
    fn test_key_positions_are_sorted_and_unique() -> Result<()> {
        let (_dir, grid) = grid();
        let keys = vec![
            Key::from(["9785", "604041598"]),
            Key::from("9780"),
            Key::from(["9780", "385689229"]),
            Key::from(["9781", "000000000"]),
            Key::from(["9781", "171144258"]),
        ];
        assert_eq!(key_positions(&grid, keys)?, vec![0, 1, 2, 3, 4, 5, 6, 16]);
        Ok(())
    }

    #[test]
    fn test_key_positions_resolve_lazily() -> Result<()> {
        let (_dir, grid) = grid();
        let trace = Trace::new();
        let keys = vec![Key::from(["9780", "385689229"]), Key::from(["9785", "171144258"])];
        let mut positions = KeyPositions::new(&grid, keys, Some(&trace));

        assert_eq!(positions.next().transpose()?, Some(2));
        assert_eq!(trace.breakdown(), vec![(Op::BinarySearch, 2), (Op::BinarySearch, 1)]);

        assert_eq!(positions.next().transpose()?, Some(12));
        assert_eq!(trace.spans().len(), 4);
        assert!(positions.next().is_none());
        Ok(())
    }

    #[test]
    fn test_query_iter_reads_one_batch_per_run() -> Result<()> {
        let (_dir, grid) = grid();
        let trace = Trace::new();
        let sources: Vec<Positions<'_>> = vec![positions::materialized(vec![1, 2, 3, 7, 17])];
        let iter = QueryIter {
            grid: &grid,
            trace: Some(&trace),
            runs: Box::new(runs(Intersect::new(sources))),
            current: None,
            done: false,
        };

        let values = iter.collect::<Result<Vec<_>>>()?;
        assert_eq!(values, vec!["1", "2", "3", "7", "17"]);
        assert_eq!(
            trace.breakdown(),
            vec![(Op::QueryRead, 1), (Op::QueryRead, 1), (Op::QueryRead, 1)]
        );
        let labels: Vec<String> = trace.spans().into_iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!["1-3", "7-7", "17-17"]);
        Ok(())
    }
}
