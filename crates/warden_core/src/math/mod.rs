//! # Math Primitives
//!
//! Small value types for kinematics and hit geometry.
//!
//! Everything here is `Copy` and lives on the stack; none of it needs pooling.

mod aabb;
mod vec3;

pub use aabb::Aabb;
pub use vec3::Vec3;

/// Returns the unit look vector for a yaw/pitch pair given in degrees.
///
/// Yaw 0 faces +Z, yaw 90 faces -X, pitch 90 faces straight down.
#[inline]
#[must_use]
pub fn look_direction(yaw_degrees: f32, pitch_degrees: f32) -> Vec3 {
    let yaw = yaw_degrees.to_radians();
    let pitch = pitch_degrees.to_radians();
    Vec3::new(
        -yaw.sin() * pitch.cos(),
        -pitch.sin(),
        yaw.cos() * pitch.cos(),
    )
    .normalized()
}

/// Returns the horizontal facing vector for a yaw given in degrees.
#[inline]
#[must_use]
pub fn facing_direction(yaw_degrees: f32) -> Vec3 {
    let yaw = yaw_degrees.to_radians();
    Vec3::new(-yaw.sin(), 0.0, yaw.cos()).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_direction_cardinals() {
        let forward = look_direction(0.0, 0.0);
        assert!((forward.z - 1.0).abs() < 1e-6);
        assert!(forward.x.abs() < 1e-6);

        let west = look_direction(90.0, 0.0);
        assert!((west.x + 1.0).abs() < 1e-6);

        let down = look_direction(0.0, 90.0);
        assert!((down.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_facing_is_horizontal_unit() {
        for yaw in [0.0_f32, 33.0, 145.0, -270.0] {
            let dir = facing_direction(yaw);
            assert_eq!(dir.y, 0.0);
            assert!((dir.length() - 1.0).abs() < 1e-5);
        }
    }
}
