use super::header::{Header, MAX_HEADER_LEN};
use crate::config::PADDING;
use crate::error::Result;
use crate::trace::{Read as TraceRead, Recorder};
use crate::Error;

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// An open container file.
pub struct Container {
    file: File,
    /// Name used in traces and errors, relative to the root wordmap.
    name: String,
    header: Header,
    batch_size: u64,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("header", &self.header)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Container {
    /// Opens a container and parses its header.
    pub fn open(path: &Path, name: impl Into<String>, batch_bytes: usize) -> Result<Self> {
        let name = name.into();
        let file = File::open(path)?;

        let mut buf = Vec::with_capacity(MAX_HEADER_LEN);
        (&file).take(MAX_HEADER_LEN as u64).read_to_end(&mut buf)?;
        let header = Header::decode(&buf)
            .map_err(|e| Error::InvalidHeader(format!("{}: {}", name, e)))?;

        let file_len = file.metadata()?.len();
        if file_len < header.file_len() {
            tracing::warn!(
                file = %name,
                file_len,
                expected_len = header.file_len(),
                "Container is shorter than its header declares"
            );
        }

        Ok(Self {
            file,
            name,
            batch_size: header.batch_size(batch_bytes),
            header,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn cell_count(&self) -> u64 {
        self.header.cell_count
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Reads up to `count` raw cells starting at `start` in one positioned
    /// read. The read stops at the last cell; nothing is read past it.
    pub fn read_cells(
        &self,
        start: u64,
        count: u64,
        recorder: Option<Recorder<'_>>,
    ) -> Result<Vec<Vec<u8>>> {
        let cell_count = self.header.cell_count;
        if start >= cell_count || count == 0 {
            return Ok(Vec::new());
        }
        let count = count.min(cell_count - start);

        let cell_size = self.header.cell_size;
        let offset = self.header.cell_offset(start);
        let len = count * cell_size as u64;

        tracing::trace!(file = %self.name, start, count, offset, len, "read_cells");
        if let Some(recorder) = recorder {
            recorder.record(TraceRead {
                file: self.name.clone(),
                start,
                count,
                offset,
                len,
            });
        }

        if cell_size == 0 {
            return Ok(vec![Vec::new(); count as usize]);
        }

        let bytes = read_bytes_at(&self.file, offset, len as usize)
            .map_err(|e| Error::ReadError(self.name.clone(), e))?;
        Ok(bytes.chunks_exact(cell_size).map(<[u8]>::to_vec).collect())
    }

    /// Reads and decodes the single cell at `index`.
    pub fn read_value(&self, index: u64, recorder: Option<Recorder<'_>>) -> Result<Option<String>> {
        match self.read_cells(index, 1, recorder)?.first() {
            Some(cell) => decode_cell(cell).map(Some),
            None => Ok(None),
        }
    }

    /// Lazily iterates the non-empty values of `count` cells from `start`, or
    /// of every remaining cell when `count` is `None`.
    pub fn cells<'a>(
        &'a self,
        start: u64,
        count: Option<u64>,
        recorder: Option<Recorder<'a>>,
    ) -> Cells<'a> {
        Cells {
            container: self,
            next: start,
            remaining: count,
            batch: VecDeque::new(),
            exhausted: false,
            recorder,
        }
    }
}

/// Strips the leading padding of a raw cell.
pub fn strip_padding(cell: &[u8]) -> &[u8] {
    let start = cell.iter().position(|b| *b != PADDING).unwrap_or(cell.len());
    &cell[start..]
}

/// Decodes a raw cell into its value. Empty cells decode to `""`.
pub fn decode_cell(cell: &[u8]) -> Result<String> {
    String::from_utf8(strip_padding(cell).to_vec())
        .map_err(|e| Error::InvalidData(format!("cell is not UTF-8: {}", e)))
}

/// Batched, lazy iterator over container values. Issues one read per batch
/// and only when the previous batch is used up.
#[derive(Debug, Clone)]
pub struct Cells<'a> {
    container: &'a Container,
    next: u64,
    remaining: Option<u64>,
    batch: VecDeque<Vec<u8>>,
    exhausted: bool,
    recorder: Option<Recorder<'a>>,
}

impl Cells<'_> {
    fn next_batch(&mut self) -> Result<()> {
        let batch_size = self.container.batch_size;
        let want = match self.remaining {
            Some(remaining) => remaining.min(batch_size),
            None => batch_size,
        };
        if want == 0 || self.next >= self.container.cell_count() {
            self.exhausted = true;
            return Ok(());
        }

        let cells = self.container.read_cells(self.next, want, self.recorder)?;
        let got = cells.len() as u64;

        self.next += got;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= got;
            if *remaining == 0 {
                self.exhausted = true;
            }
        }
        // A short batch means the end of the file.
        if got < want {
            self.exhausted = true;
        }

        self.batch.extend(cells);
        Ok(())
    }
}

impl Iterator for Cells<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cell) = self.batch.pop_front() {
                match decode_cell(&cell) {
                    Ok(value) if value.is_empty() => continue,
                    other => return Some(other),
                }
            }

            if self.exhausted {
                return None;
            }
            if let Err(e) = self.next_batch() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

/// Reads `len` bytes at `offset` without touching a shared file cursor.
#[cfg(unix)]
fn read_bytes_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    use std::os::unix::fs::FileExt;
    let mut buf = vec![0u8; len];
    file.read_exact_at(&mut buf, offset)?;
    Ok(buf)
}

#[cfg(windows)]
fn read_bytes_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    use std::os::windows::fs::FileExt;
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match file.seek_read(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(buf)
}

/// Without positioned reads, seek and read run under one process-wide lock.
#[cfg(not(any(unix, windows)))]
fn read_bytes_at(file: &File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    use std::io::{Seek, SeekFrom};
    use std::sync::{Mutex, PoisonError};

    static SEEK_LOCK: Mutex<()> = Mutex::new(());
    let _guard = SEEK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);

    let mut reader = file;
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerWriter;
    use crate::trace::{Op, Trace};
    use tempfile::tempdir;

    fn write(path: &Path, values: &[&str]) {
        ContainerWriter::write_all(path, values).expect("Failed to write container");
    }

    #[test]
    fn test_read_cells_and_decode() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vec0");
        write(&path, &["9780", "9781", "9785"]);

        let container = Container::open(&path, "vec0", 10_000)?;
        assert_eq!(container.cell_count(), 3);
        assert_eq!(container.batch_size(), 3);

        let cells = container.read_cells(1, 5, None)?;
        assert_eq!(cells, vec![b"9781".to_vec(), b"9785".to_vec()]);
        assert!(container.read_cells(3, 1, None)?.is_empty());
        assert_eq!(container.read_value(0, None)?, Some("9780".to_string()));
        assert_eq!(container.read_value(7, None)?, None);
        Ok(())
    }

    #[test]
    fn test_padding_is_stripped() {
        assert_eq!(strip_padding(b"\0\0\x0012"), b"12");
        assert_eq!(strip_padding(b"\0\0"), b"");
        assert_eq!(decode_cell(b"\0\0").unwrap(), "");
        assert!(matches!(decode_cell(b"\0\xff\xfe"), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_cells_skip_empty_values() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data");
        write(&path, &["", "In the Kingdom of Ice", "Born a Crime", "", ""]);

        let container = Container::open(&path, "data", 10_000)?;
        let values = container.cells(0, None, None).collect::<Result<Vec<_>>>()?;
        assert_eq!(values, vec!["In the Kingdom of Ice", "Born a Crime"]);

        let values = container.cells(2, Some(1), None).collect::<Result<Vec<_>>>()?;
        assert_eq!(values, vec!["Born a Crime"]);
        Ok(())
    }

    #[test]
    fn test_cells_read_in_batches() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data");
        let values: Vec<String> = (0..10).map(|i| format!("value_{:02}", i)).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        write(&path, &refs);

        // 8-byte cells, 3 per batch.
        let container = Container::open(&path, "data", 24)?;
        assert_eq!(container.batch_size(), 3);

        let trace = Trace::new();
        let mut cells = container.cells(0, None, Some(trace.span(Op::Scan, "data")));
        assert_eq!(cells.next().transpose()?, Some("value_00".to_string()));
        assert_eq!(trace.read_count(), 1);

        let rest = cells.collect::<Result<Vec<_>>>()?;
        assert_eq!(rest.len(), 9);
        // Batches of 3, 3, 3 and a final short batch of 1.
        assert_eq!(trace.breakdown(), vec![(Op::Scan, 4)]);

        let reads = &trace.spans()[0].reads;
        assert_eq!(reads[1].start, 3);
        assert_eq!(reads[1].offset, 5 + 3 * 8);
        assert_eq!(reads[3].count, 1);
        Ok(())
    }

    #[test]
    fn test_cells_are_restartable() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vec0");
        write(&path, &["a", "b", "c"]);

        let container = Container::open(&path, "vec0", 10_000)?;
        let cells = container.cells(0, None, None);
        let first = cells.clone().collect::<Result<Vec<_>>>()?;
        let second = cells.collect::<Result<Vec<_>>>()?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_truncated_file_fails_on_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("data");
        std::fs::write(&path, b"4,3\0abcdefgh")?;

        let container = Container::open(&path, "data", 10_000)?;
        assert_eq!(container.read_cells(0, 2, None)?.len(), 2);
        assert!(matches!(
            container.read_cells(0, 3, None),
            Err(Error::ReadError(ref file, _)) if file == "data"
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_header_names_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vec1");
        std::fs::write(&path, b"garbage")?;

        match Container::open(&path, "vec1", 10_000) {
            Err(Error::InvalidHeader(msg)) => assert!(msg.contains("vec1")),
            other => panic!("expected invalid header, got {:?}", other),
        }
        Ok(())
    }
}
