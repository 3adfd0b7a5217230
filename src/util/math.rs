//! Math type re-exports and small helpers for unit-square sampling.

pub use glam::{Mat3, UVec2, Vec2, Vec3, Vec4};

/// Largest `f32` strictly below 1.0.
pub const ONE_MINUS_EPSILON: f32 = 1.0 - f32::EPSILON / 2.0;

/// `2^-32`, scale from a full `u32` to `[0, 1)`.
pub const INV_2_POW_32: f64 = 1.0 / 4_294_967_296.0;

/// Clamp a value into `[0, 1)`.
///
/// Converting an `f64` near 1.0 to `f32` can round up to exactly 1.0,
/// which would break the half-open domain every sequence promises.
#[inline]
pub fn to_unit(v: f64) -> f32 {
    (v as f32).clamp(0.0, ONE_MINUS_EPSILON)
}

/// Shirley-Chiu concentric mapping from `[0,1)^2` to the unit disk.
#[inline]
pub fn concentric_disk(u: Vec2) -> Vec2 {
    let o = u * 2.0 - Vec2::ONE;
    if o.x == 0.0 && o.y == 0.0 {
        return Vec2::ZERO;
    }
    let (r, theta) = if o.x.abs() > o.y.abs() {
        (o.x, std::f32::consts::FRAC_PI_4 * (o.y / o.x))
    } else {
        (
            o.y,
            std::f32::consts::FRAC_PI_2 - std::f32::consts::FRAC_PI_4 * (o.x / o.y),
        )
    };
    Vec2::new(theta.cos(), theta.sin()) * r
}

/// Map a point in `[-1,1]^2` back into `[0,1)^2`.
#[inline]
pub fn disk_to_unit(p: Vec2) -> Vec2 {
    let q = (p + Vec2::ONE) * 0.5;
    Vec2::new(
        q.x.clamp(0.0, ONE_MINUS_EPSILON),
        q.y.clamp(0.0, ONE_MINUS_EPSILON),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_unit_never_reaches_one() {
        assert!(to_unit(0.999_999_999_9) < 1.0);
        assert_eq!(to_unit(0.0), 0.0);
        assert_eq!(to_unit(0.5), 0.5);
    }

    #[test]
    fn test_concentric_disk_bounds() {
        for i in 0..32 {
            for j in 0..32 {
                let u = Vec2::new(i as f32 / 32.0, j as f32 / 32.0);
                assert!(concentric_disk(u).length() <= 1.0 + 1e-5);
            }
        }
        assert_eq!(concentric_disk(Vec2::splat(0.5)), Vec2::ZERO);
    }

    #[test]
    fn test_disk_to_unit_domain() {
        let q = disk_to_unit(Vec2::new(1.0, -1.0));
        assert!(q.x < 1.0);
        assert_eq!(q.y, 0.0);
        assert_eq!(disk_to_unit(Vec2::ZERO), Vec2::splat(0.5));
    }
}
