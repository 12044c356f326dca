//! Lazy set algebra over ascending position streams.
//!
//! Streams may do I/O while being pulled (a key clause binary-searches its
//! next key only when asked for it), so every combinator pulls each source
//! at most one value ahead and never more often than needed to decide its
//! own next value. A source error is yielded once and ends the combinator.

use crate::error::Result;

use itertools::Itertools as _;
use std::ops::RangeInclusive;

/// A lazy ascending stream of positions.
pub type Positions<'a> = Box<dyn Iterator<Item = Result<u64>> + Send + 'a>;

struct Source<'a> {
    iter: Positions<'a>,
    head: Option<u64>,
    done: bool,
}

/// One value out of a [`Union`], and whether a source was found exhausted
/// while choosing it.
struct Pulled {
    value: u64,
    exhausted: bool,
}

/// K-way merge. Always advances the source with the smallest head, so values
/// come out non-decreasing; values present in several sources are repeated.
pub struct Union<'a> {
    sources: Vec<Source<'a>>,
    failed: bool,
}

impl<'a> Union<'a> {
    pub fn new(sources: impl IntoIterator<Item = Positions<'a>>) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|iter| Source {
                    iter,
                    head: None,
                    done: false,
                })
                .collect(),
            failed: false,
        }
    }

    pub fn arity(&self) -> usize {
        self.sources.len()
    }

    fn pull(&mut self) -> Option<Result<Pulled>> {
        if self.failed {
            return None;
        }

        let mut exhausted = false;
        let mut min: Option<(usize, u64)> = None;
        for (i, source) in self.sources.iter_mut().enumerate() {
            if source.done {
                continue;
            }
            if source.head.is_none() {
                match source.iter.next() {
                    Some(Ok(value)) => source.head = Some(value),
                    Some(Err(e)) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                    None => {
                        source.done = true;
                        exhausted = true;
                        continue;
                    }
                }
            }
            if let Some(head) = source.head {
                if min.map_or(true, |(_, value)| head < value) {
                    min = Some((i, head));
                }
            }
        }

        let (i, value) = min?;
        self.sources[i].head = None;
        Some(Ok(Pulled { value, exhausted }))
    }
}

impl Iterator for Union<'_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pull().map(|pulled| pulled.map(|p| p.value))
    }
}

/// [`Union`] without consecutive duplicates: strictly ascending when every
/// source is.
pub struct UniqUnion<'a> {
    union: Union<'a>,
    last: Option<u64>,
}

impl<'a> UniqUnion<'a> {
    pub fn new(sources: impl IntoIterator<Item = Positions<'a>>) -> Self {
        Self {
            union: Union::new(sources),
            last: None,
        }
    }
}

impl Iterator for UniqUnion<'_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.union.next()? {
                Ok(value) if self.last == Some(value) => continue,
                Ok(value) => {
                    self.last = Some(value);
                    return Some(Ok(value));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Values present in every source. Sources must be strictly ascending.
///
/// Merges all sources and counts how many contributed the current value.
/// Once any source runs dry no new value can reach the full count, so only
/// the group of the last value seen is finished before stopping; the
/// remaining sources are not pulled further.
pub struct Intersect<'a> {
    union: Union<'a>,
    last: Option<u64>,
    given: usize,
    wrapping_up: bool,
    done: bool,
}

impl<'a> Intersect<'a> {
    pub fn new(sources: impl IntoIterator<Item = Positions<'a>>) -> Self {
        Self {
            union: Union::new(sources),
            last: None,
            given: 0,
            wrapping_up: false,
            done: false,
        }
    }
}

impl Iterator for Intersect<'_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let pulled = match self.union.pull() {
                Some(Ok(pulled)) => pulled,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            self.wrapping_up |= pulled.exhausted;
            if self.wrapping_up && self.last != Some(pulled.value) {
                self.done = true;
                return None;
            }

            if self.last == Some(pulled.value) {
                self.given += 1;
            } else {
                self.given = 1;
                self.last = Some(pulled.value);
            }
            if self.given == self.union.arity() {
                return Some(Ok(pulled.value));
            }
        }
    }
}

/// Groups an ascending stream into maximal runs of consecutive positions. A
/// run is yielded once the first position past it (or the end) is seen.
pub fn runs<'a>(
    positions: impl Iterator<Item = Result<u64>> + Send + 'a,
) -> impl Iterator<Item = Result<RangeInclusive<u64>>> + Send + 'a {
    positions
        .map_ok(|p| (p, p))
        .coalesce(|prev, next| match (prev, next) {
            (Ok((start, end)), Ok((next_start, next_end))) if next_start <= end + 1 => {
                Ok(Ok((start, end.max(next_end))))
            }
            (prev, next) => Err((prev, next)),
        })
        .map_ok(|(start, end)| start..=end)
}
