//! Deterministic 2D sample sequences.
//!
//! Every generator here is a pure function of `(count, sequence_index)`
//! (or a seed) and returns points in `[0,1)^2`. Calling one twice with the
//! same arguments yields bit-identical output, which keeps renders
//! reproducible.
//!
//! - [`radical`] - Halton, Hammersley and Sobol constructions
//! - [`blue_noise`] - best-candidate (farthest point) point sets
//! - [`lens`] - radial and polygonal aperture samples for bokeh
//! - [`table`] - the per-sequence table the backend reads during a pass

pub mod blue_noise;
pub mod lens;
pub mod radical;
pub mod table;

pub use blue_noise::{blue_noise, BestCandidateBuilder, NearestPointIndex, CANDIDATE_COUNT};
pub use lens::{lens_samples, polygon, radial};
pub use radical::{halton, hammersley, radical_inverse, sobol, HALTON_BASES};
pub use table::{SequenceParams, SequenceTable, NUM_RANDOM_SEQUENCES};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::util::Vec2;

/// Construction used for per-pixel jitter samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleMode {
    Random,
    Halton,
    Hammersley,
    #[default]
    BlueNoise,
    Sobol,
}

impl SampleMode {
    pub const ALL: [SampleMode; 5] = [
        SampleMode::Random,
        SampleMode::Halton,
        SampleMode::Hammersley,
        SampleMode::BlueNoise,
        SampleMode::Sobol,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SampleMode::Random => "random",
            SampleMode::Halton => "halton",
            SampleMode::Hammersley => "hammersley",
            SampleMode::BlueNoise => "blue_noise",
            SampleMode::Sobol => "sobol",
        }
    }

    /// Parse a mode name as printed by [`name`](Self::name). Accepts a few
    /// common spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "uniform" => Some(SampleMode::Random),
            "halton" => Some(SampleMode::Halton),
            "hammersley" => Some(SampleMode::Hammersley),
            "blue_noise" | "bluenoise" | "blue-noise" => Some(SampleMode::BlueNoise),
            "sobol" => Some(SampleMode::Sobol),
            _ => None,
        }
    }
}

/// Aperture shape used for depth-of-field lens samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BokehShape {
    #[default]
    Circular,
    /// Regular polygon with this many sides (at least 3).
    Polygon(u32),
}

impl BokehShape {
    /// Parse `circular`, `polygon` (hexagon) or `polygon:N`.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        match lower.split_once(':') {
            Some(("polygon", n)) => n.parse().ok().filter(|&n| n >= 3).map(BokehShape::Polygon),
            None if lower == "circular" || lower == "circle" => Some(BokehShape::Circular),
            None if lower == "polygon" => Some(BokehShape::Polygon(6)),
            _ => None,
        }
    }
}

/// `count` independent uniform samples per axis from a seeded generator.
///
/// All x values are drawn first, then all y values.
pub fn uniform_random(count: usize, seed: u64) -> Vec<Vec2> {
    let mut rng = Pcg32::seed_from_u64(seed);
    let xs: Vec<f32> = (0..count).map(|_| rng.gen::<f32>()).collect();
    xs.into_iter()
        .map(|x| Vec2::new(x, rng.gen::<f32>()))
        .collect()
}

/// Generate sequence `sequence_index` of `count` points with `mode`.
pub fn sample_points(mode: SampleMode, count: usize, sequence_index: u32) -> Vec<Vec2> {
    match mode {
        SampleMode::Random => uniform_random(count, seed_hash::sequence_seed(sequence_index)),
        SampleMode::Halton => halton(count, sequence_index),
        SampleMode::Hammersley => hammersley(count, sequence_index),
        SampleMode::BlueNoise => blue_noise(count, sequence_index),
        SampleMode::Sobol => sobol(count, sequence_index),
    }
}
