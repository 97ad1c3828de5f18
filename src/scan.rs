//! Delimiter scanning over 64-byte blocks.
//!
//! Each scanner turns one block into a 64-bit mask with bit `i` set when byte
//! `i` is `,` or `\n`. [`delimiter_positions`] walks a buffer block by block
//! and compacts the set bits into absolute positions. The tail shorter than a
//! block is copied into a zeroed block so every scanner only ever sees full
//! blocks.

use crate::error::{Error, Result};
use crate::span::check_span_limit;

pub const BLOCK: usize = 64;

pub const FIELD_DELIMITER: u8 = b',';
pub const ROW_DELIMITER: u8 = b'\n';

pub trait BlockScanner {
    /// Bitmask of delimiter bytes in `block`.
    fn block_mask(&self, block: &[u8; BLOCK]) -> u64;
}

// ===========================================================================
// Scalar
// ===========================================================================

#[derive(Copy, Clone, Debug, Default)]
pub struct ScalarScanner;

impl BlockScanner for ScalarScanner {
    #[inline(always)]
    fn block_mask(&self, block: &[u8; BLOCK]) -> u64 {
        let mut mask = 0u64;
        for (i, &b) in block.iter().enumerate() {
            let hit = (b == FIELD_DELIMITER) | (b == ROW_DELIMITER);
            mask |= (hit as u64) << i;
        }
        mask
    }
}

// ===========================================================================
// x86_64
// ===========================================================================

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::{BLOCK, BlockScanner, FIELD_DELIMITER, ROW_DELIMITER};
    use std::arch::x86_64::*;

    /// SSE2 is part of the x86_64 baseline, so this scanner is always valid.
    #[derive(Copy, Clone, Debug, Default)]
    pub struct Sse2Scanner;

    impl BlockScanner for Sse2Scanner {
        #[inline(always)]
        fn block_mask(&self, block: &[u8; BLOCK]) -> u64 {
            let mut mask = 0u64;
            // SAFETY: sse2 is always enabled on x86_64; loads are unaligned
            // and stay inside the 64-byte block.
            unsafe {
                let comma = _mm_set1_epi8(FIELD_DELIMITER as i8);
                let newline = _mm_set1_epi8(ROW_DELIMITER as i8);
                for lane in 0..4 {
                    let v = _mm_loadu_si128(block.as_ptr().add(lane * 16) as *const __m128i);
                    let hits = _mm_or_si128(_mm_cmpeq_epi8(v, comma), _mm_cmpeq_epi8(v, newline));
                    let bits = _mm_movemask_epi8(hits) as u32 as u64;
                    mask |= bits << (lane * 16);
                }
            }
            mask
        }
    }

    /// Only construct through [`Avx2Scanner::new`], which checks the CPU.
    #[derive(Copy, Clone, Debug)]
    pub struct Avx2Scanner {
        _private: (),
    }

    impl Avx2Scanner {
        pub fn new() -> Option<Self> {
            if std::is_x86_feature_detected!("avx2") {
                Some(Self { _private: () })
            } else {
                None
            }
        }
    }

    #[target_feature(enable = "avx2")]
    unsafe fn mask_avx2(block: &[u8; BLOCK]) -> u64 {
        unsafe {
            let comma = _mm256_set1_epi8(FIELD_DELIMITER as i8);
            let newline = _mm256_set1_epi8(ROW_DELIMITER as i8);
            let lo = _mm256_loadu_si256(block.as_ptr() as *const __m256i);
            let hi = _mm256_loadu_si256(block.as_ptr().add(32) as *const __m256i);
            let lo = _mm256_or_si256(_mm256_cmpeq_epi8(lo, comma), _mm256_cmpeq_epi8(lo, newline));
            let hi = _mm256_or_si256(_mm256_cmpeq_epi8(hi, comma), _mm256_cmpeq_epi8(hi, newline));
            let lo = _mm256_movemask_epi8(lo) as u32 as u64;
            let hi = _mm256_movemask_epi8(hi) as u32 as u64;
            lo | (hi << 32)
        }
    }

    impl BlockScanner for Avx2Scanner {
        #[inline(always)]
        fn block_mask(&self, block: &[u8; BLOCK]) -> u64 {
            // SAFETY: an Avx2Scanner only exists after a successful CPU check.
            unsafe { mask_avx2(block) }
        }
    }

    /// One 64-byte compare per delimiter. Needs AVX-512BW for byte masks.
    #[derive(Copy, Clone, Debug)]
    pub struct Avx512Scanner {
        _private: (),
    }

    impl Avx512Scanner {
        pub fn new() -> Option<Self> {
            if std::is_x86_feature_detected!("avx512f") && std::is_x86_feature_detected!("avx512bw")
            {
                Some(Self { _private: () })
            } else {
                None
            }
        }
    }

    #[target_feature(enable = "avx512f,avx512bw")]
    unsafe fn mask_avx512(block: &[u8; BLOCK]) -> u64 {
        unsafe {
            let v = _mm512_loadu_epi8(block.as_ptr() as *const i8);
            _mm512_cmpeq_epi8_mask(v, _mm512_set1_epi8(FIELD_DELIMITER as i8))
                | _mm512_cmpeq_epi8_mask(v, _mm512_set1_epi8(ROW_DELIMITER as i8))
        }
    }

    impl BlockScanner for Avx512Scanner {
        #[inline(always)]
        fn block_mask(&self, block: &[u8; BLOCK]) -> u64 {
            // SAFETY: an Avx512Scanner only exists after a successful CPU check.
            unsafe { mask_avx512(block) }
        }
    }
}

#[cfg(target_arch = "x86_64")]
pub use x86::{Avx2Scanner, Avx512Scanner, Sse2Scanner};

// ===========================================================================
// std::simd (nightly)
// ===========================================================================

#[cfg(feature = "nightly")]
#[derive(Copy, Clone, Debug, Default)]
pub struct PortableScanner;

#[cfg(feature = "nightly")]
impl BlockScanner for PortableScanner {
    #[inline(always)]
    fn block_mask(&self, block: &[u8; BLOCK]) -> u64 {
        use std::simd::{Simd, cmp::SimdPartialEq};

        const COMMA: Simd<u8, BLOCK> = Simd::from_array([FIELD_DELIMITER; BLOCK]);
        const NEWLINE: Simd<u8, BLOCK> = Simd::from_array([ROW_DELIMITER; BLOCK]);

        let v = Simd::<u8, BLOCK>::from_array(*block);
        (v.simd_eq(COMMA) | v.simd_eq(NEWLINE)).to_bitmask()
    }
}

// ===========================================================================
// Runtime selection
// ===========================================================================

/// The scanner chosen for a run.
#[derive(Copy, Clone, Debug)]
pub enum Scanner {
    Scalar(ScalarScanner),
    #[cfg(target_arch = "x86_64")]
    Sse2(Sse2Scanner),
    #[cfg(target_arch = "x86_64")]
    Avx2(Avx2Scanner),
    #[cfg(target_arch = "x86_64")]
    Avx512(Avx512Scanner),
    #[cfg(feature = "nightly")]
    Portable(PortableScanner),
}

impl Scanner {
    /// Widest implementation the running CPU supports.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        let scanner = if let Some(avx512) = Avx512Scanner::new() {
            Scanner::Avx512(avx512)
        } else if let Some(avx2) = Avx2Scanner::new() {
            Scanner::Avx2(avx2)
        } else {
            Scanner::Sse2(Sse2Scanner)
        };
        #[cfg(all(not(target_arch = "x86_64"), feature = "nightly"))]
        let scanner = Scanner::Portable(PortableScanner);
        #[cfg(all(not(target_arch = "x86_64"), not(feature = "nightly")))]
        let scanner = Scanner::Scalar(ScalarScanner);
        scanner
    }

    pub fn scalar() -> Self {
        Scanner::Scalar(ScalarScanner)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scanner::Scalar(_) => "scalar",
            #[cfg(target_arch = "x86_64")]
            Scanner::Sse2(_) => "sse2",
            #[cfg(target_arch = "x86_64")]
            Scanner::Avx2(_) => "avx2",
            #[cfg(target_arch = "x86_64")]
            Scanner::Avx512(_) => "avx512",
            #[cfg(feature = "nightly")]
            Scanner::Portable(_) => "portable-simd",
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::detect()
    }
}

impl BlockScanner for Scanner {
    #[inline(always)]
    fn block_mask(&self, block: &[u8; BLOCK]) -> u64 {
        match self {
            Scanner::Scalar(s) => s.block_mask(block),
            #[cfg(target_arch = "x86_64")]
            Scanner::Sse2(s) => s.block_mask(block),
            #[cfg(target_arch = "x86_64")]
            Scanner::Avx2(s) => s.block_mask(block),
            #[cfg(target_arch = "x86_64")]
            Scanner::Avx512(s) => s.block_mask(block),
            #[cfg(feature = "nightly")]
            Scanner::Portable(s) => s.block_mask(block),
        }
    }
}

// ===========================================================================
// Driver
// ===========================================================================

#[inline(always)]
fn push_mask(positions: &mut Vec<u32>, base: usize, mut mask: u64) -> Result<()> {
    positions
        .try_reserve(mask.count_ones() as usize)
        .map_err(Error::alloc("delimiter positions"))?;
    while mask != 0 {
        let i = mask.trailing_zeros() as usize;
        positions.push((base + i) as u32);
        mask &= mask - 1;
    }
    Ok(())
}

/// Absolute positions of every `,` and `\n` in `data`, ascending.
pub fn delimiter_positions<S: BlockScanner>(scanner: &S, data: &[u8]) -> Result<Vec<u32>> {
    check_span_limit(data.len())?;

    let mut positions = Vec::new();
    let mut blocks = data.chunks_exact(BLOCK);
    let mut base = 0;
    for block in &mut blocks {
        let block: &[u8; BLOCK] = block.try_into().expect("chunks_exact yields full blocks");
        push_mask(&mut positions, base, scanner.block_mask(block))?;
        base += BLOCK;
    }

    let rest = blocks.remainder();
    if !rest.is_empty() {
        let mut tail = [0u8; BLOCK];
        tail[..rest.len()].copy_from_slice(rest);
        push_mask(&mut positions, base, scanner.block_mask(&tail))?;
    }

    Ok(positions)
}
