//! Position sequences: ascending sets of data cell positions.
//!
//! Index stores keep, for every index key, the set of primary cells carrying
//! that key. Sets are stored as text with a delta + run-length encoding:
//!
//! ```text
//! [1, 9]          → "1,8"       (1, then 9 = 1 + 8)
//! [11, 45]        → "11,34"
//! [4, 5, 6, 9]    → "4+2,3"     (4 and 2 more consecutive, then 6 + 3)
//! ```
//!
//! A token `d` is the value `last + d`; a token `d+r` is the run
//! `[last + d, last + d + r]`. `last` is the final value of the previous
//! token, 0 before the first one.
//!
//! Sequences are consumed lazily as `Iterator<Item = Result<u64>>` streams
//! (see [`merge`]), so combining many sets never materializes them.

pub mod merge;

use crate::error::Result;
use crate::Error;

use itertools::Itertools as _;

pub use merge::{runs, Intersect, Positions, Union, UniqUnion};

/// Encodes an ascending, duplicate-free sequence.
pub fn pack<I>(positions: I) -> String
where
    I: IntoIterator<Item = u64>,
{
    let mut last = 0;
    positions
        .into_iter()
        .map(|p| (p, p))
        .coalesce(|(start, end), (next_start, next_end)| {
            if next_start == end + 1 {
                Ok((start, next_end))
            } else {
                Err(((start, end), (next_start, next_end)))
            }
        })
        .map(|(start, end)| {
            debug_assert!(start >= last, "positions must ascend");
            let delta = start - last;
            last = end;
            if start == end {
                delta.to_string()
            } else {
                format!("{}+{}", delta, end - start)
            }
        })
        .join(",")
}

/// Lazily decodes an encoded sequence.
pub fn decode(encoded: impl Into<String>) -> Decoder {
    Decoder::new(encoded.into())
}

/// Lazily decodes a materialized sequence.
pub fn materialized(positions: Vec<u64>) -> Positions<'static> {
    Box::new(positions.into_iter().map(Ok))
}

/// Iterator over an encoded sequence. Restartable by cloning.
#[derive(Debug, Clone)]
pub struct Decoder {
    encoded: String,
    cursor: usize,
    last: u64,
    // Remaining values of the current `d+r` token.
    run: Option<(u64, u64)>,
    failed: bool,
}

impl Decoder {
    pub fn new(encoded: String) -> Self {
        Self {
            encoded,
            cursor: 0,
            last: 0,
            run: None,
            failed: false,
        }
    }

    /// Next token of digits and `+`, skipping separators.
    fn next_token(&mut self) -> Option<(usize, usize)> {
        let bytes = self.encoded.as_bytes();
        let is_token = |b: &u8| b.is_ascii_digit() || *b == b'+';

        let start = self.cursor + bytes[self.cursor..].iter().position(is_token)?;
        let end = start
            + bytes[start..]
                .iter()
                .position(|b| !is_token(b))
                .unwrap_or(bytes.len() - start);
        self.cursor = end;
        Some((start, end))
    }

    fn parse(&self, token: &str) -> Result<(u64, u64)> {
        let invalid = || Error::InvalidData(format!("invalid position token {:?}", token));
        let number = |s: &str| s.parse::<u64>().map_err(|_| invalid());

        let (delta, extra) = match token.split_once('+') {
            Some((delta, extra)) => (number(delta)?, number(extra)?),
            None => (number(token)?, 0),
        };
        let first = self.last.checked_add(delta).ok_or_else(invalid)?;
        let last = first.checked_add(extra).ok_or_else(invalid)?;
        Ok((first, last))
    }
}

impl Iterator for Decoder {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if let Some((next, last)) = self.run {
            self.run = (next < last).then(|| (next + 1, last));
            return Some(Ok(next));
        }

        let (start, end) = self.next_token()?;
        match self.parse(&self.encoded[start..end]) {
            Ok((first, last)) => {
                self.last = last;
                self.run = (first < last).then(|| (first + 1, last));
                Some(Ok(first))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
