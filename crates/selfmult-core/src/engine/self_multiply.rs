//! Signed power-law self-multiplication
//!
//! Multiplies a live sample by an exponentiated delayed copy of the signal.
//! Fractional powers of negative numbers have no real value, so the delayed
//! sample's magnitude is exponentiated and the sign of the plain product
//! `x·d` is applied afterwards.

use crate::types::Sample;

/// Sign of `x·d`; a zero product counts as positive
#[inline]
pub fn product_sign(x: Sample, delayed: Sample) -> Sample {
    if x * delayed < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Combine a live sample with its delayed counterpart
///
/// `result = sign(x·d) · |x| · |d|^exponent`. With exponent 1 this is the
/// plain product `x·d`.
#[inline]
pub fn self_multiply(x: Sample, delayed: Sample, exponent: f32) -> Sample {
    product_sign(x, delayed) * x.abs() * delayed.abs().powf(exponent)
}
