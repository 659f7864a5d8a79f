//! Source spans for procedure text handed over by the external grammar

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A byte offset span in a source file
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset
    pub start: u32,
    /// Exclusive end offset
    pub end: u32,
}

impl Span {
    /// Span from `start` to `end`
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Span covering `len` bytes from `start`
    #[must_use]
    pub fn at(start: u32, len: usize) -> Self {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        Self::new(start, start.saturating_add(len))
    }

    /// Byte range for slicing
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Length in bytes
    #[must_use]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Move the span `by` bytes to the right
    #[must_use]
    pub fn shifted(self, by: u32) -> Self {
        Self::new(self.start.saturating_add(by), self.end.saturating_add(by))
    }

    /// Slice `source` by this span, `None` when it is out of bounds or splits a char
    #[must_use]
    pub fn slice<'src>(&self, source: &'src str) -> Option<&'src str> {
        source.get(self.range())
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start as usize, span.len() as usize).into()
    }
}
