//! Best-candidate blue-noise point sets.
//!
//! Greedy farthest-point construction: every new point is the one of
//! [`CANDIDATE_COUNT`] uniform candidates that lies farthest from all
//! points placed so far. Points come out in insertion order, so any prefix
//! is itself well spread and can be consumed progressively.
//!
//! Nearest-point queries are an exhaustive scan. Point counts are pass
//! counts (a few thousand at most), where the scan is fast enough.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::util::Vec2;

/// Candidates drawn per placed point.
pub const CANDIDATE_COUNT: usize = 30;

/// Set of placed points answering minimum-distance queries.
#[derive(Debug, Clone, Default)]
pub struct NearestPointIndex {
    points: Vec<Vec2>,
}

impl NearestPointIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, p: Vec2) {
        self.points.push(p);
    }

    /// Squared distance from `q` to the closest stored point, or
    /// `f32::INFINITY` when empty.
    pub fn nearest_distance_squared(&self, q: Vec2) -> f32 {
        self.points
            .iter()
            .map(|p| p.distance_squared(q))
            .fold(f32::INFINITY, f32::min)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Stored points in insertion order.
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Vec2> {
        self.points
    }
}

/// Incremental best-candidate builder for one sequence.
pub struct BestCandidateBuilder {
    index: NearestPointIndex,
    rng: Pcg32,
}

impl BestCandidateBuilder {
    /// Builder seeded from the FNV-1a hash of `sequence_index`.
    pub fn new(sequence_index: u32) -> Self {
        Self::with_capacity(sequence_index, 0)
    }

    pub fn with_capacity(sequence_index: u32, capacity: usize) -> Self {
        Self {
            index: NearestPointIndex::with_capacity(capacity),
            rng: Pcg32::seed_from_u64(seed_hash::sequence_seed(sequence_index)),
        }
    }

    fn random_point(&mut self) -> Vec2 {
        Vec2::new(self.rng.gen(), self.rng.gen())
    }

    /// Draw the next batch of uniform candidates.
    pub fn draw_candidates(&mut self) -> [Vec2; CANDIDATE_COUNT] {
        std::array::from_fn(|_| self.random_point())
    }

    /// Accept the candidate farthest from every placed point and return
    /// it. Ties keep the earliest candidate.
    ///
    /// # Panics
    /// If `candidates` is empty.
    pub fn accept_best(&mut self, candidates: &[Vec2]) -> Vec2 {
        assert!(!candidates.is_empty(), "no candidates to choose from");
        let mut best = candidates[0];
        let mut best_dist = self.index.nearest_distance_squared(best);
        for &c in &candidates[1..] {
            let d = self.index.nearest_distance_squared(c);
            if d > best_dist {
                best = c;
                best_dist = d;
            }
        }
        self.index.insert(best);
        best
    }

    /// Place one more point. The first point is a single uniform draw.
    pub fn step(&mut self) -> Vec2 {
        if self.index.is_empty() {
            let p = self.random_point();
            self.index.insert(p);
            return p;
        }
        let candidates = self.draw_candidates();
        self.accept_best(&candidates)
    }

    pub fn points(&self) -> &[Vec2] {
        self.index.points()
    }

    pub fn into_points(self) -> Vec<Vec2> {
        self.index.into_points()
    }
}

/// Blue-noise set of `count` points for `sequence_index`, in insertion
/// order.
pub fn blue_noise(count: usize, sequence_index: u32) -> Vec<Vec2> {
    let mut builder = BestCandidateBuilder::with_capacity(sequence_index, count);
    for _ in 0..count {
        builder.step();
    }
    builder.into_points()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::uniform_random;

    fn min_pairwise_distance(points: &[Vec2]) -> f32 {
        let mut best = f32::INFINITY;
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                best = best.min(points[i].distance(points[j]));
            }
        }
        best
    }

    #[test]
    fn test_nearest_index_empty_is_infinite() {
        let index = NearestPointIndex::new();
        assert_eq!(index.nearest_distance_squared(Vec2::ZERO), f32::INFINITY);
    }

    #[test]
    fn test_nearest_index_exhaustive() {
        let mut index = NearestPointIndex::new();
        index.insert(Vec2::new(0.1, 0.1));
        index.insert(Vec2::new(0.9, 0.9));
        index.insert(Vec2::new(0.5, 0.2));
        let d = index.nearest_distance_squared(Vec2::new(0.5, 0.25));
        assert!((d - 0.0025).abs() < 1e-6);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_blue_noise_deterministic() {
        assert_eq!(blue_noise(64, 2), blue_noise(64, 2));
        assert_ne!(blue_noise(64, 2), blue_noise(64, 3));
    }

    #[test]
    fn test_blue_noise_prefix_is_stable() {
        let long = blue_noise(48, 9);
        let short = blue_noise(16, 9);
        assert_eq!(&long[..16], &short[..]);
    }

    #[test]
    fn test_accepted_point_beats_rejected_candidates() {
        let mut builder = BestCandidateBuilder::new(11);
        for _ in 0..20 {
            builder.step();
        }
        for _ in 0..20 {
            let before = NearestPointIndex {
                points: builder.points().to_vec(),
            };
            let candidates = builder.draw_candidates();
            let chosen = builder.accept_best(&candidates);
            let chosen_dist = before.nearest_distance_squared(chosen);
            for c in candidates {
                assert!(chosen_dist >= before.nearest_distance_squared(c));
            }
        }
    }

    #[test]
    fn test_blue_noise_better_spread_than_uniform() {
        let blue = blue_noise(256, 0);
        let white = uniform_random(256, seed_hash::sequence_seed(0));
        assert!(min_pairwise_distance(&blue) > min_pairwise_distance(&white));
        assert!(blue.iter().all(|p| (0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y)));
    }
}
