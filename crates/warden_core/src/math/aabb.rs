//! # Axis-Aligned Bounding Box
//!
//! Hitbox geometry for reach validation.
//!
//! Ray tests use the slab method: the ray is parameterized as
//! `origin + t * dir` and clipped against each axis pair of planes in turn,
//! starting from the interval `[0, max_distance]`.

use super::Vec3;

/// An axis-aligned box given by its min and max corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from its corners.
    #[inline]
    #[must_use]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates an entity hitbox standing on `feet`.
    ///
    /// The box is `width` wide on X and Z (centered on the feet) and
    /// `height` tall upwards.
    #[must_use]
    pub fn from_feet(feet: Vec3, width: f32, height: f32) -> Self {
        let half = width * 0.5;
        Self {
            min: Vec3::new(feet.x - half, feet.y, feet.z - half),
            max: Vec3::new(feet.x + half, feet.y + height, feet.z + half),
        }
    }

    /// Returns the box grown by `margin` on every face.
    #[must_use]
    pub fn expanded(self, margin: f32) -> Self {
        let m = Vec3::new(margin, margin, margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Center point of the box.
    #[inline]
    #[must_use]
    pub fn center(self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the entry distance along the ray, if it hits within
    /// `[0, max_distance]`.
    ///
    /// A zero direction component means the ray is parallel to that slab:
    /// it hits only if the origin already lies between the two planes.
    #[must_use]
    pub fn ray_intersection(self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;

        let axes = [
            (origin.x, dir.x, self.min.x, self.max.x),
            (origin.y, dir.y, self.min.y, self.max.y),
            (origin.z, dir.z, self.min.z, self.max.z),
        ];

        for (o, d, lo, hi) in axes {
            if d == 0.0 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let t1 = (lo - o) * inv;
            let t2 = (hi - o) * inv;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));

            if t_max < t_min {
                return None;
            }
        }

        Some(t_min)
    }

    /// Returns true if the ray hits the box within `[0, max_distance]`.
    #[inline]
    #[must_use]
    pub fn intersects_ray(self, origin: Vec3, dir: Vec3, max_distance: f32) -> bool {
        self.ray_intersection(origin, dir, max_distance).is_some()
    }
}
