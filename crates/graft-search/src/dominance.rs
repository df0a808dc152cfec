//! Fitness comparison
//!
//! Objectives are compared in priority order: the first objective that
//! differs decides, in its own direction. A missing fitness (failed run)
//! never dominates and is dominated by anything.

use std::cmp::Ordering;

/// Whether `a` is strictly better than `b`
#[must_use]
pub fn dominates(a: Option<&[f64]>, b: Option<&[f64]>, maximize: &[bool]) -> bool {
    let Some(a) = a else {
        return false;
    };
    let Some(b) = b else {
        return true;
    };
    for (k, (x, y)) in a.iter().zip(b).enumerate() {
        let max = maximize.get(k).copied().unwrap_or(false);
        if x < y {
            return !max;
        }
        if x > y {
            return max;
        }
    }
    false
}

/// [`dominates`] or equal
#[must_use]
pub fn dominates_or_equal(a: Option<&[f64]>, b: Option<&[f64]>, maximize: &[bool]) -> bool {
    dominates(a, b, maximize) || a == b
}

/// Best-first ordering for sorting, failures last
#[must_use]
pub fn best_first(a: Option<&[f64]>, b: Option<&[f64]>, maximize: &[bool]) -> Ordering {
    if dominates(a, b, maximize) {
        Ordering::Less
    } else if dominates(b, a, maximize) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn f(v: &[f64]) -> Option<&[f64]> {
        Some(v)
    }

    #[test]
    fn scalars_follow_direction() {
        assert!(dominates(f(&[1.0]), f(&[2.0]), &[false]));
        assert!(!dominates(f(&[1.0]), f(&[2.0]), &[true]));
        assert!(!dominates(f(&[1.0]), f(&[1.0]), &[false]));
        assert!(dominates_or_equal(f(&[1.0]), f(&[1.0]), &[false]));
    }

    #[test]
    fn missing_fitness() {
        assert!(!dominates(None, f(&[1.0]), &[false]));
        assert!(dominates(f(&[1.0]), None, &[false]));
        assert!(!dominates(None, None, &[false]));
    }

    #[test]
    fn vectors_in_priority_order() {
        let max = [false, true];
        assert!(dominates(f(&[1.0, 0.0]), f(&[2.0, 9.0]), &max));
        assert!(dominates(f(&[1.0, 5.0]), f(&[1.0, 4.0]), &max));
        assert!(!dominates(f(&[1.0, 4.0]), f(&[1.0, 5.0]), &max));
    }

    #[test]
    fn sorting_puts_failures_last() {
        let mut values = vec![None, Some(vec![3.0]), Some(vec![1.0])];
        values.sort_by(|a, b| best_first(a.as_deref(), b.as_deref(), &[false]));
        assert_eq!(values, vec![Some(vec![1.0]), Some(vec![3.0]), None]);
    }

    fn fitness() -> impl Strategy<Value = Option<Vec<f64>>> {
        prop::option::weighted(0.9, prop::collection::vec(-3i8..3, 2).prop_map(|v| v.into_iter().map(f64::from).collect()))
    }

    proptest! {
        #[test]
        fn no_cycles(a in fitness(), b in fitness(), c in fitness(), m0: bool, m1: bool) {
            let max = [m0, m1];
            let (a, b, c) = (a.as_deref(), b.as_deref(), c.as_deref());
            if dominates(a, b, &max) && dominates(b, c, &max) {
                prop_assert!(!dominates(c, a, &max));
            }
            if dominates(a, b, &max) {
                prop_assert!(!dominates(b, a, &max));
            }
        }
    }
}
