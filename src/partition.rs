//! Hash partitioning of a relation into bucket-contiguous runs.
//!
//! ```text
//!  input tuples          bounds (exclusive upper offsets)
//! ┌──────────┐          ┌───┬───┬───┬───┐
//! │ k=b  h=2 │          │ 1 │ 1 │ 3 │ 4 │
//! │ k=a  h=0 │          └───┴───┴───┴───┘
//! │ k=c  h=3 │   ──►    bucket 0: [0,1)  a
//! │ k=d  h=2 │          bucket 1: [1,1)
//! └──────────┘          bucket 2: [1,3)  b d
//!                       bucket 3: [3,4)  c
//! ```
//!
//! Two passes over the keys: count per bucket, then an exclusive prefix sum
//! turns counts into write cursors and the cursors scatter the tuples. The
//! scatter is stable, so tuples sharing a bucket keep their input order.

use tracing::trace;

use crate::error::{Error, Result};
use crate::hash::KeyHash;
use crate::span::{ByteSpan, Relation};

/// A relation whose tuples are grouped by the bucket of their leading span.
#[derive(Clone, Debug)]
pub struct Partitioned {
    relation: Relation,
    bounds: Vec<usize>,
}

impl Partitioned {
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn bucket_count(&self) -> usize {
        self.bounds.len()
    }

    /// Exclusive upper bound of every bucket; non-decreasing, last == len.
    pub fn bounds(&self) -> &[usize] {
        &self.bounds
    }

    /// Tuple index range of bucket `i`.
    #[inline(always)]
    pub fn bucket_range(&self, i: usize) -> std::ops::Range<usize> {
        let lo = if i == 0 { 0 } else { self.bounds[i - 1] };
        lo..self.bounds[i]
    }

    pub(crate) fn into_parts(self) -> (Relation, Vec<usize>) {
        (self.relation, self.bounds)
    }
}

/// Reorders `relation` by `KeyHash` of column 0 into `bucket_count` buckets.
pub fn partition(relation: Relation, bucket_count: usize) -> Result<Partitioned> {
    assert!(bucket_count.is_power_of_two(), "bucket count must be a power of two");

    let len = relation.len();
    let arity = relation.arity();

    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(len)
        .map_err(Error::alloc("bucket assignments"))?;
    buckets.extend((0..len).map(|row| KeyHash::of(relation.field(row, 0)).bucket(bucket_count)));

    // Phase 1: count per bucket
    let mut cursors = vec![0usize; bucket_count];
    for &b in &buckets {
        cursors[b] += 1;
    }

    // Phase 2: exclusive prefix sum
    let mut bounds = vec![0usize; bucket_count];
    let mut sum = 0;
    for (cursor, bound) in cursors.iter_mut().zip(bounds.iter_mut()) {
        let count = *cursor;
        *cursor = sum;
        sum += count;
        *bound = sum;
    }
    debug_assert_eq!(sum, len);

    // Phase 3: scatter
    let (buffer, spans, _) = relation.into_parts();
    let mut sorted = Vec::new();
    sorted
        .try_reserve_exact(spans.len())
        .map_err(Error::alloc("partitioned tuples"))?;
    sorted.resize(spans.len(), ByteSpan::default());
    for (tuple, &b) in spans.chunks_exact(arity).zip(&buckets) {
        let at = cursors[b] * arity;
        sorted[at..at + arity].copy_from_slice(tuple);
        cursors[b] += 1;
    }

    trace!(tuples = len, bucket_count, "partitioned relation");
    Ok(Partitioned {
        relation: Relation::new(buffer, sorted, arity),
        bounds,
    })
}
