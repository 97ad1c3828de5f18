//! Key hashing for bucket selection.

/// 32-bit FNV-1a over the key bytes. Seedless and order-sensitive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyHash(pub u32);

impl KeyHash {
    const OFFSET_BASIS: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;

    #[inline(always)]
    pub fn of(key: &[u8]) -> Self {
        let mut h = Self::OFFSET_BASIS;
        for &b in key {
            h ^= b as u32;
            h = h.wrapping_mul(Self::PRIME);
        }
        Self(h)
    }

    /// Bucket index for a power-of-two `bucket_count`.
    #[inline(always)]
    pub fn bucket(self, bucket_count: usize) -> usize {
        debug_assert!(bucket_count.is_power_of_two());
        self.0 as usize & (bucket_count - 1)
    }
}

/// Bucket count shared by both sides of a join: the next power of two of the
/// larger input, shifted down by `shift`. At least one bucket, for any shift.
pub fn bucket_count_for(left_len: usize, right_len: usize, shift: u32) -> usize {
    let n = left_len.max(right_len).max(1).next_power_of_two();
    n.checked_shr(shift).unwrap_or(0).max(1)
}
