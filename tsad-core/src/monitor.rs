//! The monitor loop's bad-point predicate (§4.6 Monitor loop step 4, §8-6).
//!
//! Preserved verbatim including the `lower = 0` edge case (§9): when
//! `lower` is zero the sensitivity term is also zero, so any observation
//! more than 10 below zero is bad regardless of `sensitivity`. This is
//! intentional for non-negative series and must not be "fixed".

/// `true` iff `value` falls outside `[lower, upper]` by more than both an
/// absolute margin of 10 and a `sensitivity`-scaled fraction of the bound it
/// crossed.
pub fn is_bad_point(value: f64, lower: f64, upper: f64, sensitivity: f64) -> bool {
    let above = value > upper + upper.abs() * sensitivity && value - upper > 10.0;
    let below = value < lower - lower.abs() * sensitivity && lower - value > 10.0;

    above || below
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_example_150_is_bad() {
        assert!(is_bad_point(150.0, 0.0, 100.0, 0.5));
    }

    #[test]
    fn spec_example_109_is_not_bad() {
        assert!(!is_bad_point(109.0, 0.0, 100.0, 0.5));
    }

    #[test]
    fn spec_example_minus_60_against_zero_lower_is_bad() {
        assert!(is_bad_point(-60.0, 0.0, 100.0, 0.5));
    }

    #[test]
    fn small_negative_excursion_against_zero_lower_is_not_bad() {
        // threshold is lower - |lower|*sensitivity = 0 when lower == 0, so
        // anything within 10 of zero is still fine.
        assert!(!is_bad_point(-5.0, 0.0, 100.0, 0.5));
    }

    #[test]
    fn within_bounds_is_never_bad() {
        assert!(!is_bad_point(50.0, 0.0, 100.0, 0.5));
    }
}
