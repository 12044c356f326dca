use crate::config::PADDING;
use crate::error::Result;
use crate::Error;

/// Bytes read from the start of a file to find the header. Two 20-digit
/// decimals, a comma and the terminator fit.
pub const MAX_HEADER_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub cell_size: usize,
    pub cell_count: u64,
    /// Byte offset of the first cell.
    pub offset: u64,
}

impl Header {
    pub fn new(cell_size: usize, cell_count: u64) -> Self {
        let text_len = format!("{},{}", cell_size, cell_count).len();
        Self {
            cell_size,
            cell_count,
            offset: text_len as u64 + 1,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = format!("{},{}", self.cell_size, self.cell_count).into_bytes();
        buf.push(PADDING);
        buf
    }

    /// Parses the header from the leading bytes of a container.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let end = buf
            .iter()
            .position(|b| *b == PADDING)
            .ok_or_else(|| Error::InvalidHeader("missing terminator".to_string()))?;
        let text = std::str::from_utf8(&buf[..end])
            .map_err(|_| Error::InvalidHeader("header is not ASCII".to_string()))?;
        let (cell_size, cell_count) = text
            .split_once(',')
            .ok_or_else(|| Error::InvalidHeader(format!("missing comma in {:?}", text)))?;

        let cell_size = cell_size
            .parse::<usize>()
            .map_err(|e| Error::InvalidHeader(format!("cell size {:?}: {}", cell_size, e)))?;
        let cell_count = cell_count
            .parse::<u64>()
            .map_err(|e| Error::InvalidHeader(format!("cell count {:?}: {}", cell_count, e)))?;

        let offset = end as u64 + 1;
        // Offsets of every cell up to the end of the file must fit in a u64.
        (cell_size as u64)
            .checked_mul(cell_count)
            .and_then(|cells_len| cells_len.checked_add(offset))
            .ok_or_else(|| {
                Error::InvalidHeader(format!("{} cells of {} bytes overflow", cell_count, cell_size))
            })?;

        Ok(Self {
            cell_size,
            cell_count,
            offset,
        })
    }

    /// Cells fetched per sequential read: as many as fit in `batch_bytes`, at
    /// least one, never more than the container holds.
    pub fn batch_size(&self, batch_bytes: usize) -> u64 {
        let per_read = (batch_bytes / self.cell_size.max(1)).max(1) as u64;
        per_read.min(self.cell_count)
    }

    /// Byte offset of cell `index`.
    pub fn cell_offset(&self, index: u64) -> u64 {
        self.offset + index * self.cell_size as u64
    }

    /// Byte length of the whole file.
    pub fn file_len(&self) -> u64 {
        self.cell_offset(self.cell_count)
    }
}
