use std::path::PathBuf;

/// Byte used to left-pad values to the cell width. Stored values must not
/// start with it: leading padding is stripped on read.
pub const PADDING: u8 = 0x00;

/// Upper bound on the bytes fetched by one sequential read. Trades the number
/// of read calls against the memory held per read.
pub const DEFAULT_BATCH_BYTES: usize = 10_000;

/// File holding the data grid.
pub const DATA_FILE: &str = "data";

/// Vector files are named `vec0`, `vec1`, ... in dimension order.
pub const VECTOR_FILE_PREFIX: &str = "vec";

/// Index stores live in `i-<name>.wmap` subdirectories.
pub const INDEX_DIR_PREFIX: &str = "i-";
pub const INDEX_DIR_SUFFIX: &str = ".wmap";

pub fn vector_file(dimension: usize) -> String {
    format!("{}{}", VECTOR_FILE_PREFIX, dimension)
}

pub fn index_dir(name: &str) -> String {
    format!("{}{}{}", INDEX_DIR_PREFIX, name, INDEX_DIR_SUFFIX)
}

/// Configuration for opening a wordmap
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of the wordmap
    pub dir: PathBuf,

    /// Bytes per batched sequential read (default: 10 000)
    pub batch_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./wordmap.wmap"),
            batch_bytes: DEFAULT_BATCH_BYTES,
        }
    }
}

impl Config {
    /// Create a new config for the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the byte budget of one sequential read
    pub fn batch_bytes(mut self, bytes: usize) -> Self {
        self.batch_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.dir, PathBuf::from("./wordmap.wmap"));
        assert_eq!(config.batch_bytes, 10_000);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new("/tmp/books.wmap").batch_bytes(128);
        assert_eq!(config.dir, PathBuf::from("/tmp/books.wmap"));
        assert_eq!(config.batch_bytes, 128);
    }

    #[test]
    fn test_file_names() {
        assert_eq!(vector_file(0), "vec0");
        assert_eq!(vector_file(12), "vec12");
        assert_eq!(index_dir("year"), "i-year.wmap");
    }
}
