//! Helpers for values the game stores as 16 bit floats.
//!
//! The editor works in `f32`, but a value only counts as changed once it
//! differs after being squashed to half precision, so every store goes
//! through [`force_half_precision`].

use half::f16;

/// Smallest positive value a half can hold (subnormal, 2^-24)
pub const HALF_EPSILON: f32 = 5.960464477539063e-8;
pub const HALF_MAX: f32 = 65504.0;

/// Clamps to the finite half range, NaN is left alone
pub fn clamp_half(value: f32) -> f32 {
	if value.is_nan() {return value}
	value.clamp(-HALF_MAX, HALF_MAX)
}

pub fn to_half(value: f32) -> f16 {
	f16::from_f32(clamp_half(value))
}

pub fn force_half_precision(value: f32) -> f32 {
	to_half(value).to_f32()
}

/// Gloss is used as a divisor by the shaders, it may never be stored as 0
pub fn gloss_floor(value: f32) -> f32 {
	force_half_precision(value).max(HALF_EPSILON)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn epsilon_is_smallest_subnormal() {
		assert_eq!(f16::from_f32(HALF_EPSILON).to_bits(), 1);
		assert_eq!(f16::from_bits(1).to_f32(), HALF_EPSILON);
		assert_eq!(f16::MAX.to_f32(), HALF_MAX);
	}

	#[test]
	fn force_half_precision_is_idempotent() {
		for v in [0.0, -0.0, 1.0 / 3.0, 0.1, 1234.5678, -98765.0, 1e-9, 65519.0, f32::INFINITY, f32::MIN_POSITIVE] {
			let once = force_half_precision(v);
			assert_eq!(force_half_precision(once).to_bits(), once.to_bits(), "{v}");
		}
	}

	#[test]
	fn values_clamp_to_half_range() {
		assert_eq!(force_half_precision(1e9), HALF_MAX);
		assert_eq!(force_half_precision(-1e9), -HALF_MAX);
		assert_eq!(force_half_precision(f32::INFINITY), HALF_MAX);
		assert!(force_half_precision(f32::NAN).is_nan());
	}

	#[test]
	fn gloss_never_stores_zero() {
		for v in [0.0, -0.0, -1.0, -1e9, 1e-12, f32::NAN] {
			assert_eq!(gloss_floor(v), HALF_EPSILON, "{v}");
		}
		assert_eq!(gloss_floor(20.0), 20.0);
		assert_eq!(gloss_floor(gloss_floor(0.0)), HALF_EPSILON);
	}
}
