use super::header::Header;
use crate::config::PADDING;
use crate::error::Result;
use crate::Error;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A container being written. Cells are appended in order; `finish` checks
/// that exactly the declared number of cells was written.
pub struct ContainerWriter {
    file: BufWriter<File>,
    header: Header,
    written: u64,
}

impl ContainerWriter {
    /// Creates the file and writes its header.
    pub fn create(path: &Path, cell_size: usize, cell_count: u64) -> Result<Self> {
        let header = Header::new(cell_size, cell_count);
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&header.encode())?;
        Ok(Self {
            file,
            header,
            written: 0,
        })
    }

    /// Writes a whole container: the cell width is the longest value.
    pub fn write_all<V: AsRef<[u8]>>(path: &Path, values: &[V]) -> Result<()> {
        let cell_size = values
            .iter()
            .map(|v| v.as_ref().len())
            .max()
            .unwrap_or(0);
        let mut writer = Self::create(path, cell_size, values.len() as u64)?;
        for value in values {
            writer.push(value.as_ref())?;
        }
        writer.finish()
    }

    /// Appends one cell, left-padded to the cell width.
    pub fn push(&mut self, value: &[u8]) -> Result<()> {
        if self.written == self.header.cell_count {
            return Err(Error::InvalidArgument(format!(
                "container declared {} cells",
                self.header.cell_count
            )));
        }
        let padding = self
            .header
            .cell_size
            .checked_sub(value.len())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "value of {} bytes exceeds cell size {}",
                    value.len(),
                    self.header.cell_size
                ))
            })?;

        self.file.write_all(&vec![PADDING; padding])?;
        self.file.write_all(value)?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        if self.written != self.header.cell_count {
            return Err(Error::InvalidArgument(format!(
                "wrote {} of {} cells",
                self.written, self.header.cell_count
            )));
        }
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }
}
