//! Bucket-wise equi-join on the leading span of each tuple.

use tracing::debug;

use crate::error::{Error, Result};
use crate::hash::bucket_count_for;
use crate::materialize::{MaterializedPair, materialize};
use crate::partition::partition;
use crate::span::{ByteSpan, Relation};

/// Joins a materialized pair.
///
/// Walks buckets in ascending order and, inside a bucket, every left tuple
/// against every right tuple. Keys landing in the same bucket are compared
/// byte for byte, so hash collisions only cost comparisons. Each match emits
/// the whole left tuple followed by the right tuple minus its key. The output
/// is backed by the pair's buffer.
pub fn join_materialized(pair: MaterializedPair) -> Result<Relation> {
    let buckets = pair.bucket_count();
    let left = pair.left();
    let right = pair.right();
    let arity = left.arity() + right.arity() - 1;

    let mut out: Vec<ByteSpan> = Vec::new();
    out.try_reserve(buckets * arity)
        .map_err(Error::alloc("join output"))?;

    for i in 0..buckets {
        let right_range = right.bucket_range(i);
        if right_range.is_empty() {
            continue;
        }
        for j in left.bucket_range(i) {
            let a = left.tuple(j);
            for k in right_range.clone() {
                if pair.key_eq(j, k) {
                    let b = right.tuple(k);
                    if out.len() + arity > out.capacity() {
                        out.try_reserve(buckets * arity)
                            .map_err(Error::alloc("join output"))?;
                    }
                    out.extend_from_slice(a);
                    out.extend_from_slice(&b[1..]);
                }
            }
        }
    }

    let MaterializedPair { buffer, .. } = pair;
    Ok(Relation::new(buffer, out, arity))
}

/// Partitions, materializes and joins two relations on column 0.
///
/// `bucket_shift` trades bucket count against in-bucket comparisons: the
/// bucket count is the next power of two of the larger side, shifted right.
pub fn hash_join(left: Relation, right: Relation, bucket_shift: u32) -> Result<Relation> {
    let buckets = bucket_count_for(left.len(), right.len(), bucket_shift);
    let (left_rows, right_rows) = (left.len(), right.len());

    let left = partition(left, buckets)?;
    let right = partition(right, buckets)?;
    let pair = materialize(left, right)?;
    let joined = join_materialized(pair)?;

    debug!(
        left_rows,
        right_rows,
        buckets,
        output_rows = joined.len(),
        "hash join finished"
    );
    Ok(joined)
}
