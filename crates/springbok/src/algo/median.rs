//! Span-weighted median used to pick a representative node size.

/// Returns a representative value of `values`, or `None` for an empty slice.
///
/// Odd-length inputs yield the plain median. For even lengths (four or more) the two middle
/// values are interpolated, each weighted by the spread of the *opposite* half, which pulls the
/// result toward the tighter cluster:
///
/// ```
/// use springbok::weighted_median;
///
/// assert_eq!(weighted_median(&[1.0, 2.0, 3.0, 10.0]), Some(2.125));
/// assert_eq!(weighted_median(&[2.0, 4.0]), Some(3.0));
/// ```
pub fn weighted_median(values: &[f64]) -> Option<f64> {
    match values {
        [] => None,
        [v] => Some(*v),
        [a, b] => Some((a + b) / 2.0),
        _ => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            let n = sorted.len();
            if !n.is_multiple_of(2) {
                return Some(sorted[n / 2]);
            }
            let rm = n / 2;
            let lm = rm - 1;
            let rspan = sorted[n - 1] - sorted[rm];
            let lspan = sorted[lm] - sorted[0];
            if lspan == rspan {
                Some((sorted[lm] + sorted[rm]) / 2.0)
            } else {
                Some((sorted[lm] * rspan + sorted[rm] * lspan) / (lspan + rspan))
            }
        }
    }
}
