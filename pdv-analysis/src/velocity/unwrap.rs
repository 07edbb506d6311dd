use crate::Real;
use std::f64::consts::{PI, TAU};

/// Removes the 2π jumps from a sequence of wrapped phase angles.
///
/// A step is corrected only when its magnitude reaches π, and is mapped into
/// `[-π, π)` except that a positive step of exactly π stays `+π`.
pub fn unwrap(phase: &[Real]) -> Vec<Real> {
    let mut correction = 0.0;
    let mut previous = match phase.first() {
        Some(&first) => first,
        None => return Vec::new(),
    };
    phase
        .iter()
        .map(|&angle| {
            let step = angle - previous;
            previous = angle;
            if step.abs() >= PI {
                let mut wrapped = (step + PI).rem_euclid(TAU) - PI;
                if wrapped == -PI && step > 0.0 {
                    wrapped = PI;
                }
                correction += wrapped - step;
            }
            angle + correction
        })
        .collect()
}
