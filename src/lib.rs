//! Immutable, disk-resident multidimensional map.
//!
//! A wordmap is built once from an in-memory mapping of key tuples to text
//! values and is then only read, by any number of threads at once. Values are
//! addressed through per-dimension sorted key vectors and a dense data grid,
//! so a full-key lookup costs one binary search per dimension plus one data
//! read. Secondary indexes map derived keys to sets of data cells and are
//! themselves wordmaps.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── data              one cell per combination of dimension keys
//! ├── vec0, vec1, ...   sorted distinct keys of each dimension
//! └── i-<name>.wmap/    one nested wordmap per index
//!     ├── data          packed data cell positions per index key
//!     └── vec0          sorted index keys
//! ```
//!
//! # Example
//!
//! ```no_run
//! use wordmap::{Builder, Query, Wordmap};
//!
//! # fn main() -> wordmap::Result<()> {
//! Builder::new([(["9780", "385689229"], "Born a Crime")])
//!     .index("year")
//!     .extractor(|_, _, _| Some("2016"))
//!     .create("books.wmap")?;
//!
//! let books = Wordmap::open("books.wmap")?;
//! assert_eq!(books.lookup(["9780", "385689229"])?, vec!["Born a Crime"]);
//!
//! let query = Query::new().index("year", ["2016"]).keys(["9780"]);
//! for title in books.query(&query)? {
//!     println!("{}", title?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod container;
pub mod error;
pub mod grid;
pub mod key;
pub mod positions;
pub mod query;
pub mod store;
pub mod trace;
pub mod vector;

pub use builder::Builder;
pub use config::Config;
pub use container::Cells;
pub use error::{Error, Result};
pub use key::Key;
pub use query::{Clause, Query, QueryIter};
pub use store::{ScanTarget, Wordmap};
pub use trace::{Op, Span, Trace};
