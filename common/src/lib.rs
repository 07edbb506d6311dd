pub mod tracer;

pub type Real = f64;

/// Time measured in nanoseconds, as used by the HEL search window.
pub type Nanoseconds = f64;

pub const NANOSECONDS_PER_SECOND: Real = 1e9;

pub fn seconds_to_nanoseconds(seconds: Real) -> Nanoseconds {
    seconds * NANOSECONDS_PER_SECOND
}
