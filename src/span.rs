//! Byte spans and the relations that own their backing buffers.
//!
//! A [`ByteSpan`] is only meaningful next to the buffer it was cut from, so
//! spans are stored inside a [`Relation`] together with that buffer. Tuples
//! are laid out flat: tuple `i` occupies `spans[i * arity..(i + 1) * arity]`.
//!
//! ```text
//!  buffer: b"k1,x\nk2,y\n"
//!  spans:  [(0,2) (3,1)] [(5,2) (8,1)]
//!           tuple 0       tuple 1        arity = 2
//! ```

use crate::error::{Error, Result};

/// A `(start, size)` reference into a backing buffer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct ByteSpan {
    pub start: u32,
    pub size: u32,
}

impl ByteSpan {
    #[inline(always)]
    pub fn new(start: u32, size: u32) -> Self {
        Self { start, size }
    }

    #[inline(always)]
    pub fn end(self) -> usize {
        self.start as usize + self.size as usize
    }

    #[inline(always)]
    pub fn range(self) -> std::ops::Range<usize> {
        self.start as usize..self.end()
    }
}

/// Rejects buffers whose offsets would not fit a [`ByteSpan`].
pub(crate) fn check_span_limit(len: usize) -> Result<()> {
    if len > u32::MAX as usize {
        return Err(Error::BufferTooLarge { len });
    }
    Ok(())
}

/// An owned buffer plus a flat array of fixed-arity tuples of spans into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    buffer: Vec<u8>,
    spans: Vec<ByteSpan>,
    arity: usize,
}

impl Relation {
    /// Builds a relation, checking that every span lies inside `buffer`.
    pub fn new(buffer: Vec<u8>, spans: Vec<ByteSpan>, arity: usize) -> Self {
        assert!(arity > 0, "relation arity must be positive");
        assert_eq!(spans.len() % arity, 0, "span count is not a multiple of the arity");
        debug_assert!(spans.iter().all(|s| s.end() <= buffer.len()));
        Self {
            buffer,
            spans,
            arity,
        }
    }

    /// Convenience constructor for tests and benches: one field per string.
    pub fn from_rows<R, F>(rows: R, arity: usize) -> Self
    where
        R: IntoIterator<Item = F>,
        F: IntoIterator,
        F::Item: AsRef<[u8]>,
    {
        let mut buffer = Vec::new();
        let mut spans = Vec::new();
        for row in rows {
            let before = spans.len();
            for field in row {
                let field = field.as_ref();
                spans.push(ByteSpan::new(buffer.len() as u32, field.len() as u32));
                buffer.extend_from_slice(field);
            }
            assert_eq!(spans.len() - before, arity, "row has the wrong number of fields");
        }
        Self::new(buffer, spans, arity)
    }

    #[inline(always)]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.spans.len() / self.arity
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn spans(&self) -> &[ByteSpan] {
        &self.spans
    }

    #[inline(always)]
    pub fn tuple(&self, row: usize) -> &[ByteSpan] {
        &self.spans[row * self.arity..(row + 1) * self.arity]
    }

    /// Bytes of column `col` of tuple `row`.
    #[inline(always)]
    pub fn field(&self, row: usize, col: usize) -> &[u8] {
        &self.buffer[self.spans[row * self.arity + col].range()]
    }

    /// Iterates tuples as rows of byte slices.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.spans.chunks_exact(self.arity).map(move |spans| Row {
            buffer: &self.buffer,
            spans,
        })
    }

    /// Rebuilds the span array so that output column `i` is input column
    /// `columns[i]`. The buffer is untouched; columns may repeat or be dropped.
    pub fn project(self, columns: &[usize]) -> Result<Self> {
        assert!(!columns.is_empty(), "projection must keep at least one column");
        debug_assert!(columns.iter().all(|&c| c < self.arity));
        let mut spans = Vec::new();
        spans
            .try_reserve_exact(self.len() * columns.len())
            .map_err(Error::alloc("projected tuples"))?;
        for tuple in self.spans.chunks_exact(self.arity) {
            spans.extend(columns.iter().map(|&c| tuple[c]));
        }
        Ok(Self {
            buffer: self.buffer,
            spans,
            arity: columns.len(),
        })
    }

    pub(crate) fn into_parts(self) -> (Vec<u8>, Vec<ByteSpan>, usize) {
        (self.buffer, self.spans, self.arity)
    }
}

/// A borrowed view of one tuple.
#[derive(Copy, Clone, Debug)]
pub struct Row<'a> {
    buffer: &'a [u8],
    spans: &'a [ByteSpan],
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, col: usize) -> &'a [u8] {
        &self.buffer[self.spans[col].range()]
    }

    pub fn fields(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let buffer = self.buffer;
        self.spans.iter().map(move |s| &buffer[s.range()])
    }

    /// Owned copy of the fields, handy for comparisons in tests.
    pub fn to_vec(&self) -> Vec<Vec<u8>> {
        self.fields().map(<[u8]>::to_vec).collect()
    }
}
