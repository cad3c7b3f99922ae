//! Ordered instruction listings, addressed by line position.

use std::{
    fmt::{self, Display, Formatter},
    slice::{Iter, IterMut},
};

/// A position in a listing, indicated by a line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(pub usize);

impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    lines: Vec<T>,
}

impl<T> Listing<T> {
    pub fn new() -> Self {
        Self { lines: vec![] }
    }

    pub fn push(&mut self, line: T) {
        self.lines.push(line);
    }

    /// Insert a line before the given position, shifting every later line down.
    pub fn insert(&mut self, position: Position, line: T) {
        self.lines.insert(position.0, line);
    }

    pub fn first(&self) -> Option<&T> {
        self.lines.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.lines.last()
    }

    pub fn iter_lines(&self) -> impl Iterator<Item = (Position, &T)> {
        self.lines.iter().enumerate().map(|(l, v)| (Position(l), v))
    }

    pub fn iter_instructions(&self) -> Iter<T> {
        self.lines.iter()
    }

    pub fn iter_instructions_mut(&mut self) -> IterMut<T> {
        self.lines.iter_mut()
    }

    pub fn into_instructions(self) -> std::vec::IntoIter<T> {
        self.lines.into_iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for Listing<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}
