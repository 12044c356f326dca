//! Key tuples addressing the data grid.

use itertools::Itertools as _;

/// A key tuple with one part per dimension. A key with fewer parts than the
/// store has dimensions is a prefix and addresses every cell below it.
///
/// Keys order lexicographically by part, each part compared byte-wise, which
/// is also the order of the cells they resolve to.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(Vec<String>);

impl Key {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join(":"))
    }
}

impl From<&str> for Key {
    fn from(part: &str) -> Self {
        Self(vec![part.to_string()])
    }
}

impl From<String> for Key {
    fn from(part: String) -> Self {
        Self(vec![part])
    }
}

impl From<&String> for Key {
    fn from(part: &String) -> Self {
        Self(vec![part.clone()])
    }
}

impl From<Vec<String>> for Key {
    fn from(parts: Vec<String>) -> Self {
        Self(parts)
    }
}

impl From<Vec<&str>> for Key {
    fn from(parts: Vec<&str>) -> Self {
        Self::new(parts)
    }
}

impl From<&[&str]> for Key {
    fn from(parts: &[&str]) -> Self {
        Self::new(parts.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Key {
    fn from(parts: [&str; N]) -> Self {
        Self::new(parts)
    }
}

impl<const N: usize> From<[String; N]> for Key {
    fn from(parts: [String; N]) -> Self {
        Self::new(parts)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}
