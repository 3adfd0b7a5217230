//! Per-sequence sample table shared with the backend.
//!
//! Layout: `num_sequences` rows of `sample_count` entries, row-major. Each
//! entry is a `Vec4`: `xy` is the pixel jitter sample, `zw` the lens
//! sample. The layout matches a `array<vec4<f32>>` storage buffer so a GPU
//! backend can upload [`SequenceTable::as_bytes`] directly.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{lens_samples, sample_points, BokehShape, SampleMode, HALTON_BASES};
use crate::util::Vec4;

/// Default number of independent sequences. Bounded by the Halton base
/// table.
pub const NUM_RANDOM_SEQUENCES: u32 = HALTON_BASES.len() as u32;

/// Lens rows use sequence indices offset by this much so they never
/// coincide with the pixel rows.
const LENS_SEQUENCE_OFFSET: u32 = 0x1000;

/// The inputs a table depends on. Two equal params build identical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceParams {
    pub sample_mode: SampleMode,
    pub sample_count: u32,
    pub bokeh_shape: BokehShape,
}

/// Immutable table of sample points for one set of [`SequenceParams`].
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTable {
    params: SequenceParams,
    num_sequences: u32,
    entries: Vec<Vec4>,
}

impl SequenceTable {
    /// Generate every sequence. Rows are built in parallel.
    ///
    /// # Panics
    /// If `num_sequences` is 0, or exceeds the Halton base table while
    /// `sample_mode` is Halton.
    pub fn build(params: SequenceParams, num_sequences: u32) -> Self {
        assert!(num_sequences > 0, "sequence table needs at least one sequence");
        let count = params.sample_count as usize;

        let rows: Vec<Vec<Vec4>> = (0..num_sequences)
            .into_par_iter()
            .map(|seq| {
                let pixel = sample_points(params.sample_mode, count, seq);
                let lens = lens_samples(count, seq + LENS_SEQUENCE_OFFSET, params.bokeh_shape);
                pixel
                    .into_iter()
                    .zip(lens)
                    .map(|(p, l)| Vec4::new(p.x, p.y, l.x, l.y))
                    .collect()
            })
            .collect();

        Self {
            params,
            num_sequences,
            entries: rows.into_iter().flatten().collect(),
        }
    }

    pub fn params(&self) -> SequenceParams {
        self.params
    }

    pub fn num_sequences(&self) -> u32 {
        self.num_sequences
    }

    pub fn sample_count(&self) -> u32 {
        self.params.sample_count
    }

    /// Entry for `sample` of `sequence`.
    ///
    /// # Panics
    /// If either index is out of range.
    #[inline]
    pub fn get(&self, sequence: u32, sample: u32) -> Vec4 {
        assert!(sequence < self.num_sequences && sample < self.params.sample_count);
        self.entries[(sequence * self.params.sample_count + sample) as usize]
    }

    /// One full row.
    pub fn sequence(&self, sequence: u32) -> &[Vec4] {
        let n = self.params.sample_count as usize;
        let start = sequence as usize * n;
        &self.entries[start..start + n]
    }

    pub fn entries(&self) -> &[Vec4] {
        &self.entries
    }

    /// Raw bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }

    /// Size in bytes of the uploaded table.
    pub fn byte_len(&self) -> usize {
        self.entries.len() * std::mem::size_of::<Vec4>()
    }
}
