use crate::history::SamplePoint;

/// X (seconds) and Y (WPM) upper bounds for the results chart.
///
/// The Y bound is rounded up to the next multiple of ten so the axis labels
/// stay readable as the peak moves between runs.
pub fn chart_bounds(wpm: &[SamplePoint]) -> (f64, f64) {
    let duration = wpm.last().map_or(1.0, |p| p.time).max(1.0);
    let peak = wpm.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    let ceiling = ((peak / 10.0).ceil() * 10.0).max(10.0);
    (duration, ceiling)
}

/// Format an axis label without trailing noise.
pub fn axis_label(value: f64) -> String {
    if (value - value.round()).abs() < f64::EPSILON {
        format!("{}", value.round())
    } else {
        format!("{value:.1}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_series_gets_minimal_bounds() {
        let (x, y) = chart_bounds(&[]);
        assert_eq!(x, 1.0);
        assert_eq!(y, 10.0);
    }

    #[test]
    fn bounds_cover_the_whole_series() {
        let points = [
            SamplePoint::new(0.3, 35.0),
            SamplePoint::new(5.0, 62.0),
            SamplePoint::new(12.5, 48.0),
        ];
        let (x, y) = chart_bounds(&points);
        assert_eq!(x, 12.5);
        assert_eq!(y, 70.0);
    }

    #[test]
    fn labels_drop_fractional_zeroes() {
        assert_eq!(axis_label(30.0), "30");
        assert_eq!(axis_label(12.5), "12.5");
    }
}
