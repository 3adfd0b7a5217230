//! Aperture samples for depth of field.
//!
//! Both shapes warp a Sobol set onto the aperture and then map the result
//! back into `[0,1)^2`, so the backend always reads lens samples from the
//! same domain as pixel samples. The unit square center is the lens center.

use std::f32::consts::{FRAC_PI_2, TAU};

use super::{sobol, BokehShape};
use crate::util::{concentric_disk, disk_to_unit, Vec2};

/// Samples over a circular aperture.
pub fn radial(count: usize, sequence_index: u32) -> Vec<Vec2> {
    sobol(count, sequence_index)
        .into_iter()
        .map(|u| disk_to_unit(concentric_disk(u)))
        .collect()
}

/// Corner `k` of a regular `sides`-gon inscribed in the unit circle, with
/// the first corner pointing up.
#[inline]
fn polygon_vertex(k: u32, sides: u32) -> Vec2 {
    let angle = FRAC_PI_2 + TAU * k as f32 / sides as f32;
    Vec2::new(angle.cos(), angle.sin())
}

/// Samples over a regular polygonal aperture with `sides` blades.
///
/// The first coordinate picks a triangle of the center fan and is then
/// reused within it; the second spreads the sample across the triangle.
///
/// # Panics
/// If `sides < 3`.
pub fn polygon(count: usize, sequence_index: u32, sides: u32) -> Vec<Vec2> {
    assert!(sides >= 3, "polygonal bokeh needs at least 3 sides, got {}", sides);
    sobol(count, sequence_index)
        .into_iter()
        .map(|u| {
            let scaled = u.x * sides as f32;
            let sector = (scaled as u32).min(sides - 1);
            let t = (scaled - sector as f32).clamp(0.0, 1.0);
            let a = polygon_vertex(sector, sides);
            let b = polygon_vertex(sector + 1, sides);
            // Uniform over triangle (center, a, b)
            let su = t.sqrt();
            let p = a * (su * (1.0 - u.y)) + b * (su * u.y);
            disk_to_unit(p)
        })
        .collect()
}

/// Lens samples for the requested aperture shape.
pub fn lens_samples(count: usize, sequence_index: u32, shape: BokehShape) -> Vec<Vec2> {
    match shape {
        BokehShape::Circular => radial(count, sequence_index),
        BokehShape::Polygon(sides) => polygon(count, sequence_index, sides),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered(p: Vec2) -> Vec2 {
        p * 2.0 - Vec2::ONE
    }

    #[test]
    fn test_radial_inside_disk() {
        let pts = radial(256, 1);
        assert_eq!(pts, radial(256, 1));
        for p in pts {
            assert!((0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y));
            assert!(centered(p).length() <= 1.0 + 1e-4);
        }
    }

    #[test]
    fn test_polygon_inside_polygon() {
        let sides = 5;
        // Apothem of a regular polygon inscribed in the unit circle
        let apothem = (std::f32::consts::PI / sides as f32).cos();
        let pts = polygon(256, 2, sides);
        assert_eq!(pts, polygon(256, 2, sides));
        for p in pts {
            let c = centered(p);
            assert!(c.length() <= 1.0 + 1e-4);
            // Every point lies within the inscribed polygon, hence within
            // its circumcircle and never farther than the apothem along
            // each edge normal.
            for k in 0..sides {
                let mid = (polygon_vertex(k, sides) + polygon_vertex(k + 1, sides)) * 0.5;
                let normal = mid.normalize();
                assert!(c.dot(normal) <= apothem + 1e-4);
            }
        }
    }

    #[test]
    #[should_panic]
    fn test_polygon_rejects_degenerate() {
        polygon(8, 0, 2);
    }

    #[test]
    fn test_lens_samples_dispatch() {
        assert_eq!(lens_samples(32, 4, BokehShape::Circular), radial(32, 4));
        assert_eq!(lens_samples(32, 4, BokehShape::Polygon(6)), polygon(32, 4, 6));
    }
}
