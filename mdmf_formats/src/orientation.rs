//! Euler-angle helpers for the `$<x, y, z>` orientation literal.
//!
//! Level files store rotations as degrees around the X, Y and Z axes. The
//! rotation is applied around Z first, then X, then Y, matching the editor
//! the format was authored with.

use glam::Quat;

/// Convert `{x, y, z}` Euler degrees into a quaternion.
pub fn quat_from_euler_degrees(degrees: [f32; 3]) -> Quat {
    let [x, y, z] = degrees.map(f32::to_radians);
    let around_z = Quat::from_rotation_z(z);
    let around_x = Quat::from_rotation_x(x);
    let around_y = Quat::from_rotation_y(y);
    around_y * around_x * around_z
}
