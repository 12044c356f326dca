//! Building a wordmap from an in-memory mapping.
//!
//! ```text
//! { [9780, 385689229] => "Born a Crime", ... }
//!
//!   vec0, vec1       sorted distinct key parts, one vector per dimension
//!   data             one cell per combination of parts, empty when unmapped
//!   i-<name>.wmap/   per index: index key => packed data cell positions
//! ```
//!
//! Everything is written into a staging directory next to the target and
//! moved into place with one rename, so a wordmap is either complete or
//! absent.

use crate::config::{self, DATA_FILE};
use crate::container::ContainerWriter;
use crate::error::Result;
use crate::key::Key;
use crate::positions;
use crate::Error;

use itertools::Itertools as _;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const STAGING_PREFIX: &str = ".wordmap-";

type Extractor<'a> = Box<dyn FnMut(&str, &Key, &str) -> Vec<String> + 'a>;

/// Collects a mapping, index names and an index key extractor, then writes a
/// wordmap with [`Builder::create`].
pub struct Builder<'a> {
    entries: BTreeMap<Key, String>,
    indexes: Vec<String>,
    extractor: Option<Extractor<'a>>,
}

impl<'a> Builder<'a> {
    /// Later duplicates of a key replace earlier ones.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            indexes: Vec::new(),
            extractor: None,
        }
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.indexes.push(name.into());
        self
    }

    pub fn indexes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the function giving the index keys of a cell: called once per
    /// index for every non-empty cell with the index name, the cell's key and
    /// its value. Without an extractor every index is empty and omitted.
    pub fn extractor<F, R>(mut self, mut extract: F) -> Self
    where
        F: FnMut(&str, &Key, &str) -> R + 'a,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        self.extractor = Some(Box::new(move |index, key, value| {
            extract(index, key, value)
                .into_iter()
                .map(Into::into)
                .collect()
        }));
        self
    }

    /// Writes the wordmap to `path`, which must not exist yet.
    pub fn create(mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        let arity = self.validate()?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)?;

        let cells = self.write(staging.path(), arity)?;
        // rename replaces an empty directory, so check again after the build.
        if fs::symlink_metadata(path).is_ok() {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        fs::rename(staging.path(), path)?;
        // The staging path no longer exists; dropping the guard removes nothing.
        drop(staging);

        tracing::info!(
            path = %path.display(),
            entries = self.entries.len(),
            dimensions = arity,
            cells,
            indexes = self.indexes.len(),
            "Created wordmap"
        );
        Ok(())
    }

    /// Checks the mapping and index names, returning the key arity.
    fn validate(&self) -> Result<usize> {
        let mut keys = self.entries.keys();
        let arity = keys
            .next()
            .map(Key::len)
            .ok_or_else(|| Error::InvalidArgument("cannot create an empty wordmap".to_string()))?;
        if arity == 0 {
            return Err(Error::InvalidArgument("keys must have at least one part".to_string()));
        }
        if let Some(key) = keys.find(|key| key.len() != arity) {
            return Err(Error::InvalidArgument(format!(
                "key {} has {} parts, expected {}",
                key,
                key.len(),
                arity
            )));
        }

        for name in &self.indexes {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(Error::InvalidArgument(format!("invalid index name {:?}", name)));
            }
        }
        if let Some(name) = self.indexes.iter().duplicates().next() {
            return Err(Error::InvalidArgument(format!("duplicate index name {:?}", name)));
        }
        Ok(arity)
    }

    /// Writes vectors, data and indexes into `dir`. Returns the data cell
    /// count.
    fn write(&mut self, dir: &Path, arity: usize) -> Result<u64> {
        let vectors: Vec<Vec<&str>> = (0..arity)
            .map(|dimension| {
                self.entries
                    .keys()
                    .map(|key| key.parts()[dimension].as_str())
                    .sorted()
                    .dedup()
                    .collect()
            })
            .collect();
        for (dimension, vector) in vectors.iter().enumerate() {
            ContainerWriter::write_all(&dir.join(config::vector_file(dimension)), vector)?;
        }

        let cell_count = vectors
            .iter()
            .try_fold(1u64, |cells, vector| cells.checked_mul(vector.len() as u64))
            .ok_or_else(|| Error::InvalidArgument("too many cells".to_string()))?;
        let cell_size = self.entries.values().map(String::len).max().unwrap_or(0);
        let mut data = ContainerWriter::create(&dir.join(DATA_FILE), cell_size, cell_count)?;

        // index name => index key => ascending cell positions
        let mut postings: BTreeMap<&str, BTreeMap<String, Vec<u64>>> = BTreeMap::new();

        let combinations = vectors
            .iter()
            .map(|vector| vector.iter().copied())
            .multi_cartesian_product();
        for (position, parts) in (0u64..).zip(combinations) {
            let key = Key::new(parts);
            let value = self.entries.get(&key).map(String::as_str).unwrap_or_default();
            data.push(value.as_bytes())?;
            if value.is_empty() {
                continue;
            }

            let Some(extract) = self.extractor.as_mut() else {
                continue;
            };
            for index in &self.indexes {
                for index_key in extract(index, &key, value) {
                    if index_key.is_empty() {
                        continue;
                    }
                    let cells = postings
                        .entry(index.as_str())
                        .or_default()
                        .entry(index_key)
                        .or_default();
                    if cells.last() != Some(&position) {
                        cells.push(position);
                    }
                }
            }
        }
        data.finish()?;

        for name in &self.indexes {
            let Some(keys) = postings.remove(name.as_str()) else {
                tracing::debug!(index = %name, "Index has no keys, skipping");
                continue;
            };

            let index_dir = dir.join(config::index_dir(name));
            fs::create_dir(&index_dir)?;
            let (index_keys, sequences): (Vec<String>, Vec<String>) = keys
                .into_iter()
                .map(|(key, cells)| (key, positions::pack(cells)))
                .unzip();
            ContainerWriter::write_all(&index_dir.join(config::vector_file(0)), &index_keys)?;
            ContainerWriter::write_all(&index_dir.join(DATA_FILE), &sequences)?;
        }

        Ok(cell_count)
    }
}
