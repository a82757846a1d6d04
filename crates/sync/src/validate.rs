//! Numeric guards shared by the graph store and the instance store.
//!
//! Vectors are repaired in place; matrices are only ever checked, since
//! clamping a matrix element-wise does not produce a meaningful transform.

use glam::{Mat4, Vec3};

pub const DEFAULT_MAX_POSITION: f32 = 10_000.0;
pub const DEFAULT_MAX_VELOCITY: f32 = 50_000.0;

/// Magnitude ceilings for incoming samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub max_position: f32,
    pub max_velocity: f32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_position: DEFAULT_MAX_POSITION,
            max_velocity: DEFAULT_MAX_VELOCITY,
        }
    }
}

#[inline]
fn component_ok(value: f32, max_magnitude: f32) -> bool {
    value.is_finite() && value.abs() <= max_magnitude
}

pub fn validate_vec3(v: Vec3, max_magnitude: f32) -> bool {
    component_ok(v.x, max_magnitude)
        && component_ok(v.y, max_magnitude)
        && component_ok(v.z, max_magnitude)
}

/// Replaces NaN and infinite components with 0 and clamps the rest to
/// `±max_magnitude`. Returns the number of components that changed.
pub fn clamp_vec3(v: &mut Vec3, max_magnitude: f32) -> usize {
    repair_vec3(v, Vec3::ZERO, max_magnitude)
}

/// Like [`clamp_vec3`], but non-finite components take the matching
/// component of `fallback` instead of 0. The fallback is itself clamped
/// first, so the result always validates.
pub fn repair_vec3(v: &mut Vec3, fallback: Vec3, max_magnitude: f32) -> usize {
    let mut repaired = 0;
    for axis in 0..3 {
        let value = v[axis];
        let fixed = if !value.is_finite() {
            let fb = fallback[axis];
            if fb.is_finite() {
                fb.clamp(-max_magnitude, max_magnitude)
            } else {
                0.0
            }
        } else if value.abs() > max_magnitude {
            value.clamp(-max_magnitude, max_magnitude)
        } else {
            continue;
        };
        v[axis] = fixed;
        repaired += 1;
    }
    repaired
}

pub fn validate_matrix(m: &Mat4) -> bool {
    m.to_cols_array().iter().all(|e| e.is_finite())
}
