//! Fixed-width record files.
//!
//! Every file of a wordmap (the data grid, each vector, each index's files)
//! is a container: a short text header followed by equally sized cells.
//!
//! ## File Format
//!
//! ```text
//! +------------------------------+
//! | "<cell_size>,<cell_count>\0" |  ← ASCII decimal, one 0x00 terminator
//! +------------------------------+
//! | Cell 0                       |  ← cell_size bytes, value right-justified,
//! +------------------------------+    left-padded with 0x00
//! | Cell 1                       |
//! +------------------------------+
//! | ...                          |
//! +------------------------------+
//! | Cell cell_count - 1          |
//! +------------------------------+
//! ```
//!
//! Cell `i` starts at byte `header_len + i * cell_size`, so any run of cells is
//! one positioned read. Reads never share a file cursor, which lets any number
//! of threads read one container at once.
//!
//! A cell whose value is empty (all padding) is absent: iteration skips it.

mod header;
mod reader;
mod writer;

pub use header::{Header, MAX_HEADER_LEN};
pub use reader::{decode_cell, strip_padding, Cells, Container};
pub use writer::ContainerWriter;
