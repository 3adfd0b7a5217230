//! Progressive refinement state.
//!
//! Batch mode advances one full-frame sample per pass. Interactive mode
//! walks a pixel offset across a small block; only when the whole block has
//! been covered does the sample index move on, so one sample's cost is
//! spread over `block.x * block.y` passes.

use crate::util::UVec2;

/// Where accumulation currently stands. Only the worker mutates this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressiveState {
    pub sample_index: u32,
    pub block_pixel: UVec2,
}

impl ProgressiveState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Step past the pass that was just rendered.
    pub fn advance(&mut self, interactive: bool, block_size: UVec2) {
        if !interactive {
            self.sample_index += 1;
            return;
        }

        let block = block_size.max(UVec2::ONE);
        self.block_pixel.x += 1;
        if self.block_pixel.x >= block.x {
            self.block_pixel.x = 0;
            self.block_pixel.y += 1;
            if self.block_pixel.y >= block.y {
                self.block_pixel = UVec2::ZERO;
                self.sample_index += 1;
            }
        }
    }

    /// Bring the block offset back in range after the mode or block size
    /// changed between passes. A partially covered sample counts as done.
    pub fn align(&mut self, interactive: bool, block_size: UVec2) {
        if self.block_pixel == UVec2::ZERO {
            return;
        }
        let block = block_size.max(UVec2::ONE);
        if !interactive || self.block_pixel.x >= block.x || self.block_pixel.y >= block.y {
            self.block_pixel = UVec2::ZERO;
            self.sample_index += 1;
        }
    }

    /// True once every sequence entry has been consumed.
    pub fn is_converged(&self, max_render_passes: u32) -> bool {
        self.sample_index >= max_render_passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_advances_every_call() {
        let mut s = ProgressiveState::default();
        for _ in 0..3 {
            s.advance(false, UVec2::new(5, 5));
        }
        assert_eq!(s.sample_index, 3);
        assert_eq!(s.block_pixel, UVec2::ZERO);
    }

    #[test]
    fn test_interactive_block_wrap() {
        let mut s = ProgressiveState::default();
        let block = UVec2::new(5, 5);
        for i in 0..24 {
            s.advance(true, block);
            assert_eq!(s.sample_index, 0, "after {} calls", i + 1);
        }
        assert_eq!(s.block_pixel, UVec2::new(4, 4));
        s.advance(true, block);
        assert_eq!(s.block_pixel, UVec2::ZERO);
        assert_eq!(s.sample_index, 1);
    }

    #[test]
    fn test_interactive_row_order() {
        let mut s = ProgressiveState::default();
        let block = UVec2::new(3, 2);
        s.advance(true, block);
        assert_eq!(s.block_pixel, UVec2::new(1, 0));
        s.advance(true, block);
        s.advance(true, block);
        assert_eq!(s.block_pixel, UVec2::new(0, 1));
    }

    #[test]
    fn test_shrunk_block_wraps() {
        let mut s = ProgressiveState {
            sample_index: 2,
            block_pixel: UVec2::new(4, 4),
        };
        s.advance(true, UVec2::new(2, 2));
        assert_eq!(s.block_pixel, UVec2::ZERO);
        assert_eq!(s.sample_index, 3);
    }

    #[test]
    fn test_align_after_mode_change() {
        let mut s = ProgressiveState {
            sample_index: 1,
            block_pixel: UVec2::new(3, 0),
        };
        s.align(true, UVec2::new(5, 5));
        assert_eq!(s.block_pixel, UVec2::new(3, 0));
        assert_eq!(s.sample_index, 1);

        s.align(true, UVec2::new(2, 2));
        assert_eq!(s.block_pixel, UVec2::ZERO);
        assert_eq!(s.sample_index, 2);

        s.block_pixel = UVec2::new(1, 1);
        s.align(false, UVec2::new(5, 5));
        assert_eq!(s.block_pixel, UVec2::ZERO);
        assert_eq!(s.sample_index, 3);

        s.align(false, UVec2::new(5, 5));
        assert_eq!(s.sample_index, 3);
    }

    #[test]
    fn test_reset_and_converged() {
        let mut s = ProgressiveState {
            sample_index: 8,
            block_pixel: UVec2::new(1, 2),
        };
        assert!(s.is_converged(8));
        assert!(!s.is_converged(9));
        s.reset();
        assert_eq!(s, ProgressiveState::default());
    }
}
