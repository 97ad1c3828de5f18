//! Copying two partitioned relations into one shared buffer.
//!
//! The two sides of a join usually come from different buffers (two input
//! files, or a file and the previous stage's output). Comparing keys across
//! them needs a single base, so every span of both sides is copied into a
//! fresh buffer in bucket order and rebased onto it. The same buffer then
//! backs the tuples the join emits.

use tracing::trace;

use crate::error::{Error, Result};
use crate::partition::Partitioned;
use crate::span::{ByteSpan, check_span_limit};

/// Spans of one join side, rebased onto the pair's shared buffer.
#[derive(Debug)]
pub struct Side {
    pub(crate) spans: Vec<ByteSpan>,
    pub(crate) arity: usize,
    pub(crate) bounds: Vec<usize>,
}

impl Side {
    pub fn len(&self) -> usize {
        self.spans.len() / self.arity
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    #[inline(always)]
    pub fn tuple(&self, row: usize) -> &[ByteSpan] {
        &self.spans[row * self.arity..(row + 1) * self.arity]
    }

    #[inline(always)]
    pub fn bucket_range(&self, i: usize) -> std::ops::Range<usize> {
        let lo = if i == 0 { 0 } else { self.bounds[i - 1] };
        lo..self.bounds[i]
    }
}

/// Two join sides addressable through one buffer.
///
/// Key comparison is only offered here, which keeps spans from different
/// source buffers from ever being compared directly.
#[derive(Debug)]
pub struct MaterializedPair {
    pub(crate) buffer: Vec<u8>,
    pub(crate) left: Side,
    pub(crate) right: Side,
}

impl MaterializedPair {
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn left(&self) -> &Side {
        &self.left
    }

    pub fn right(&self) -> &Side {
        &self.right
    }

    pub fn bucket_count(&self) -> usize {
        self.left.bounds.len()
    }

    #[inline(always)]
    pub fn bytes(&self, span: ByteSpan) -> &[u8] {
        &self.buffer[span.range()]
    }

    /// Whether left row `l` and right row `r` carry the same key (column 0).
    /// Length first, then bytes.
    #[inline(always)]
    pub fn key_eq(&self, l: usize, r: usize) -> bool {
        let a = self.left.tuple(l)[0];
        let b = self.right.tuple(r)[0];
        a.size == b.size && self.bytes(a) == self.bytes(b)
    }
}

/// Copies every span of `left` then `right` into one new buffer.
pub fn materialize(left: Partitioned, right: Partitioned) -> Result<MaterializedPair> {
    assert_eq!(
        left.bucket_count(),
        right.bucket_count(),
        "join sides must share a bucket count"
    );

    let (left, left_bounds) = left.into_parts();
    let (right, right_bounds) = right.into_parts();

    let total: usize = left
        .spans()
        .iter()
        .chain(right.spans())
        .map(|s| s.size as usize)
        .sum();
    check_span_limit(total)?;

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(total)
        .map_err(Error::alloc("materialized buffer"))?;

    let mut rebase = |source: &[u8], spans: &[ByteSpan]| -> Vec<ByteSpan> {
        spans
            .iter()
            .map(|&s| {
                let start = buffer.len() as u32;
                buffer.extend_from_slice(&source[s.range()]);
                ByteSpan::new(start, s.size)
            })
            .collect()
    };
    let left_spans = rebase(left.buffer(), left.spans());
    let right_spans = rebase(right.buffer(), right.spans());
    debug_assert_eq!(buffer.len(), total);

    trace!(bytes = total, "materialized join inputs");
    Ok(MaterializedPair {
        buffer,
        left: Side {
            spans: left_spans,
            arity: left.arity(),
            bounds: left_bounds,
        },
        right: Side {
            spans: right_spans,
            arity: right.arity(),
            bounds: right_bounds,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;
    use crate::span::Relation;

    fn render(pair: &MaterializedPair, side: &Side) -> Vec<Vec<Vec<u8>>> {
        (0..side.len())
            .map(|r| side.tuple(r).iter().map(|&s| pair.bytes(s).to_vec()).collect())
            .collect()
    }

    fn render_relation(relation: &Relation) -> Vec<Vec<Vec<u8>>> {
        relation.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn materialize_preserves_rendered_bytes() {
        let left = partition(Relation::from_rows([["k1", "x"], ["k2", "y"]], 2), 2).unwrap();
        let right = partition(
            Relation::from_rows([["k1", "p", "pp"], ["k3", "q", "qq"]], 3),
            2,
        )
        .unwrap();
        let expected_left = render_relation(left.relation());
        let expected_right = render_relation(right.relation());

        let pair = materialize(left, right).unwrap();
        assert_eq!(render(&pair, pair.left()), expected_left);
        assert_eq!(render(&pair, pair.right()), expected_right);
    }

    #[test]
    fn materialize_packs_left_then_right() {
        let left = partition(Relation::from_rows([["ab", "c"]], 2), 1).unwrap();
        let right = partition(Relation::from_rows([["de", "f"]], 2), 1).unwrap();
        let pair = materialize(left, right).unwrap();
        assert_eq!(pair.buffer(), b"abcdef");
        assert_eq!(pair.left().tuple(0), &[ByteSpan::new(0, 2), ByteSpan::new(2, 1)]);
        assert_eq!(pair.right().tuple(0), &[ByteSpan::new(3, 2), ByteSpan::new(5, 1)]);
    }

    #[test]
    fn materialize_drops_unreferenced_bytes() {
        // Delimiters and unreferenced bytes in the source never reach the new buffer.
        let source = Relation::new(
            b"k1,x\n".to_vec(),
            vec![ByteSpan::new(0, 2), ByteSpan::new(3, 1)],
            2,
        );
        let left = partition(source, 1).unwrap();
        let right = partition(Relation::from_rows(Vec::<[&str; 2]>::new(), 2), 1).unwrap();
        let pair = materialize(left, right).unwrap();
        assert_eq!(pair.buffer(), b"k1x");
        assert!(pair.right().is_empty());
    }

    #[test]
    fn key_eq_compares_length_then_bytes() {
        let left = partition(Relation::from_rows([["k1", "x"], ["k", "y"]], 2), 1).unwrap();
        let right = partition(Relation::from_rows([["k1", "z"]], 2), 1).unwrap();
        let pair = materialize(left, right).unwrap();
        assert!(pair.key_eq(0, 0));
        assert!(!pair.key_eq(1, 0));
    }

    #[test]
    fn bucket_ranges_survive() {
        let left = partition(Relation::from_rows([["a", "1"], ["b", "2"], ["c", "3"]], 2), 4).unwrap();
        let bounds = left.bounds().to_vec();
        let right = partition(Relation::from_rows([["a", "9"]], 2), 4).unwrap();
        let pair = materialize(left, right).unwrap();
        assert_eq!(pair.bucket_count(), 4);
        assert_eq!(pair.left().bounds, bounds);
        assert_eq!(pair.left().bucket_range(0).start, 0);
    }
}
