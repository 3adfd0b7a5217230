//! Radical-inverse low-discrepancy constructions.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::util::{to_unit, Vec2, INV_2_POW_32};

/// Coprime base pairs for Halton, one per sequence index.
pub const HALTON_BASES: [(u32, u32); 16] = [
    (2, 3),
    (2, 5),
    (2, 7),
    (3, 5),
    (3, 7),
    (5, 7),
    (2, 11),
    (3, 11),
    (5, 11),
    (7, 11),
    (2, 13),
    (3, 13),
    (5, 13),
    (7, 13),
    (11, 13),
    (3, 17),
];

/// Radical inverse of `i` in `base`: mirror the base-`base` digits of `i`
/// about the radix point.
pub fn radical_inverse(i: u32, base: u32) -> f32 {
    debug_assert!(base >= 2);
    let inv_base = 1.0 / base as f64;
    let mut n = i;
    let mut factor = inv_base;
    let mut value = 0.0f64;
    while n > 0 {
        value += (n % base) as f64 * factor;
        n /= base;
        factor *= inv_base;
    }
    to_unit(value)
}

/// Base-2 radical inverse by 32-bit reversal.
#[inline]
pub fn reverse_bits_unit(i: u32) -> f32 {
    to_unit(i.reverse_bits() as f64 * INV_2_POW_32)
}

/// Halton points using the base pair at `sequence_index`.
///
/// # Panics
/// If `sequence_index >= 16`.
pub fn halton(count: usize, sequence_index: u32) -> Vec<Vec2> {
    assert!(
        (sequence_index as usize) < HALTON_BASES.len(),
        "halton sequence index {} out of range",
        sequence_index
    );
    let (bx, by) = HALTON_BASES[sequence_index as usize];
    (0..count as u32)
        .map(|i| Vec2::new(radical_inverse(i, bx), radical_inverse(i, by)))
        .collect()
}

/// Hammersley points before the per-sequence shuffle.
pub(crate) fn hammersley_ordered(count: usize) -> Vec<Vec2> {
    let inv = if count > 0 { 1.0 / count as f64 } else { 0.0 };
    (0..count as u32)
        .map(|i| Vec2::new(to_unit(i as f64 * inv), reverse_bits_unit(i)))
        .collect()
}

/// Hammersley points, shuffled with `sequence_index` as the seed.
pub fn hammersley(count: usize, sequence_index: u32) -> Vec<Vec2> {
    let mut points = hammersley_ordered(count);
    let mut rng = Pcg32::seed_from_u64(sequence_index as u64);
    points.shuffle(&mut rng);
    points
}

/// Second Sobol dimension (primitive polynomial x + 1), XOR-scrambled.
#[inline]
fn sobol_dim1(mut i: u32, scramble: u32) -> u32 {
    let mut r = scramble;
    let mut v = 1u32 << 31;
    while i != 0 {
        if i & 1 != 0 {
            r ^= v;
        }
        i >>= 1;
        v ^= v >> 1;
    }
    r
}

/// 2D Sobol points with a random digital shift per axis.
///
/// The shift comes from a generator seeded by the hashed sequence index,
/// so each index gives a different but fixed point set with the same
/// (0,2)-sequence structure.
pub fn sobol(count: usize, sequence_index: u32) -> Vec<Vec2> {
    let mut rng = Pcg32::seed_from_u64(seed_hash::sequence_seed(sequence_index));
    let sx: u32 = rng.gen();
    let sy: u32 = rng.gen();
    (0..count as u32)
        .map(|i| {
            let x = i.reverse_bits() ^ sx;
            let y = sobol_dim1(i, sy);
            Vec2::new(
                to_unit(x as f64 * INV_2_POW_32),
                to_unit(y as f64 * INV_2_POW_32),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radical_inverse_base2() {
        assert_eq!(radical_inverse(0, 2), 0.0);
        assert_eq!(radical_inverse(1, 2), 0.5);
        assert_eq!(radical_inverse(2, 2), 0.25);
        assert_eq!(radical_inverse(3, 2), 0.75);
        assert_eq!(radical_inverse(8, 2), 0.0625);
    }

    #[test]
    fn test_radical_inverse_base3() {
        // 9 = 100 in base 3 -> 0.001 = 1/27
        assert!((radical_inverse(9, 3) - 1.0 / 27.0).abs() < 1e-7);
        // 8 = 22 in base 3 -> 0.22 = 8/9
        assert!((radical_inverse(8, 3) - 8.0 / 9.0).abs() < 1e-7);
    }

    #[test]
    fn test_halton_first_points() {
        let pts = halton(16, 0);
        assert_eq!(pts.len(), 16);
        assert_eq!(pts[0], Vec2::ZERO);
        assert_eq!(pts[1], Vec2::new(0.5, radical_inverse(1, 3)));
        assert!((pts[8].x - 0.0625).abs() < 1e-7);
        assert!((pts[8].y - 8.0 / 9.0).abs() < 1e-6);
        assert!((pts[9].y - 1.0 / 27.0).abs() < 1e-7);
    }

    #[test]
    fn test_halton_bit_identical() {
        let a = halton(257, 5);
        let b = halton(257, 5);
        let a_bits: Vec<u32> = a.iter().flat_map(|p| [p.x.to_bits(), p.y.to_bits()]).collect();
        let b_bits: Vec<u32> = b.iter().flat_map(|p| [p.x.to_bits(), p.y.to_bits()]).collect();
        assert_eq!(a_bits, b_bits);
    }

    #[test]
    #[should_panic]
    fn test_halton_index_out_of_range() {
        halton(4, 16);
    }

    #[test]
    fn test_halton_bases_coprime() {
        fn gcd(a: u32, b: u32) -> u32 {
            if b == 0 { a } else { gcd(b, a % b) }
        }
        for (a, b) in HALTON_BASES {
            assert_eq!(gcd(a, b), 1, "({}, {})", a, b);
        }
    }

    #[test]
    fn test_hammersley_bit_reversal() {
        let pts = hammersley_ordered(4);
        let ys: Vec<f32> = pts.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![0.0, 0.5, 0.25, 0.75]);
        let xs: Vec<f32> = pts.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_hammersley_shuffle_is_permutation() {
        let ordered = hammersley_ordered(64);
        let mut shuffled = hammersley(64, 3);
        assert_eq!(shuffled, hammersley(64, 3));
        assert_ne!(shuffled, ordered);

        let key = |p: &Vec2| (p.x.to_bits(), p.y.to_bits());
        shuffled.sort_by_key(key);
        let mut sorted = ordered.clone();
        sorted.sort_by_key(key);
        assert_eq!(shuffled, sorted);
    }

    #[test]
    fn test_reverse_bits_never_one() {
        assert!(reverse_bits_unit(u32::MAX) < 1.0);
    }

    #[test]
    fn test_sobol_stratified() {
        // Any 2^k prefix of an XOR-scrambled (0,2)-sequence has exactly one
        // point per 1/2^k column.
        let pts = sobol(16, 7);
        let mut cols = [0u32; 16];
        for p in &pts {
            cols[(p.x * 16.0) as usize] += 1;
        }
        assert!(cols.iter().all(|&c| c == 1));
        assert_ne!(sobol(16, 7), sobol(16, 8));
    }
}
