//! FNV-1a hashing and seed mixing.
//!
//! Small, dependency-free helpers used to derive reproducible RNG seeds
//! from sequence indices and to spread pixels across independent sample
//! sequences. None of these are cryptographic.

#![no_std]

const FNV32_OFFSET: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;
const FNV64_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 32-bit FNV-1a over a byte slice.
#[inline]
pub fn fnv1a32(data: &[u8]) -> u32 {
    let mut h = FNV32_OFFSET;
    for &b in data {
        h ^= b as u32;
        h = h.wrapping_mul(FNV32_PRIME);
    }
    h
}

/// 64-bit FNV-1a over a byte slice.
#[inline]
pub fn fnv1a64(data: &[u8]) -> u64 {
    let mut h = FNV64_OFFSET;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(FNV64_PRIME);
    }
    h
}

/// Seed for the generator behind sequence `index`.
///
/// Hashes the little-endian bytes of the index so neighbouring indices
/// produce unrelated seeds.
#[inline]
pub fn sequence_seed(index: u32) -> u64 {
    fnv1a64(&index.to_le_bytes())
}

/// 64-bit finalizer (MurmurHash3 `fmix64`). Every input bit affects every
/// output bit.
#[inline]
pub fn mix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Sequence assigned to pixel `(x, y)` out of `num_sequences`.
///
/// Returns 0 when `num_sequences` is 0.
#[inline]
pub fn pixel_sequence(x: u32, y: u32, num_sequences: u32) -> u32 {
    if num_sequences == 0 {
        return 0;
    }
    let key = ((y as u64) << 32) | x as u64;
    (mix64(key) % num_sequences as u64) as u32
}
