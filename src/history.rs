/// Named smoothing and downsampling constants for a live sample series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Minimum gap between two stored points; tighter updates are folded
    /// into the previous point instead.
    pub append_threshold_secs: f64,
    /// Blend weight toward the raw value when appending a new point.
    pub append_alpha: f64,
    /// Blend weight when folding a sub-threshold update into the last point.
    pub merge_alpha: f64,
    /// Hard cap on stored points.
    pub max_points: usize,
    /// Newest points kept verbatim when the cap forces downsampling.
    pub recent_window: usize,
    /// A final value landing this close to an existing point overwrites it.
    pub final_merge_window_secs: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            append_threshold_secs: 0.3,
            append_alpha: 0.1,
            merge_alpha: 0.05,
            max_points: 120,
            recent_window: 30,
            final_merge_window_secs: 0.2,
        }
    }
}

/// One charted sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// Seconds since the test started.
    pub time: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

impl From<SamplePoint> for (f64, f64) {
    fn from(p: SamplePoint) -> Self {
        (p.time, p.value)
    }
}

/// A time-ascending, exponentially smoothed series of chart samples.
///
/// Owned by one session; cleared on reset. Once sealed by [`finalize`],
/// regular recording becomes a no-op, and the terminal point is guaranteed to
/// carry the exact reported final value.
///
/// [`finalize`]: SampleSeries::finalize
#[derive(Debug, Clone)]
pub struct SampleSeries {
    points: Vec<SamplePoint>,
    config: SamplerConfig,
    sealed: bool,
}

impl Default for SampleSeries {
    fn default() -> Self {
        Self::new(SamplerConfig::default())
    }
}

impl SampleSeries {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            points: Vec::new(),
            config,
            sealed: false,
        }
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }

    /// Record a live reading.
    ///
    /// Readings spaced at least the append threshold apart become new points,
    /// smoothed toward the raw value; tighter readings re-blend the last
    /// point in place so sub-threshold updates cannot jitter the chart.
    pub fn record(&mut self, time: f64, raw: f64) {
        if self.sealed {
            return;
        }

        let Some(last) = self.points.last_mut() else {
            self.points.push(SamplePoint::new(time, raw));
            return;
        };

        if time - last.time >= self.config.append_threshold_secs {
            let alpha = self.config.append_alpha;
            let smoothed = last.value * (1.0 - alpha) + raw * alpha;
            self.points.push(SamplePoint::new(time, smoothed));
            self.enforce_cap();
        } else {
            let alpha = self.config.merge_alpha;
            last.value = last.value * (1.0 - alpha) + raw * alpha;
        }
    }

    /// Reconcile the series with the reported final metrics and seal it.
    ///
    /// Samples recorded past the final time are dropped; the terminal point
    /// is overwritten (or appended) to match the final value exactly.
    /// Idempotent: repeating the call with the same arguments leaves the
    /// series unchanged.
    pub fn finalize(&mut self, final_time: f64, final_value: f64) {
        self.points.retain(|p| p.time <= final_time);

        match self.points.last_mut() {
            Some(last) if final_time - last.time <= self.config.final_merge_window_secs => {
                *last = SamplePoint::new(final_time, final_value);
            }
            _ => self.points.push(SamplePoint::new(final_time, final_value)),
        }

        self.sealed = true;
    }

    /// Drop all points and reopen the series for a fresh session.
    pub fn clear(&mut self) {
        self.points.clear();
        self.sealed = false;
    }

    /// Keep the newest `recent_window` points verbatim and stride older
    /// points until the series fits the cap again.
    fn enforce_cap(&mut self) {
        if self.points.len() <= self.config.max_points {
            return;
        }

        let recent = self.config.recent_window.min(self.points.len());
        let older_len = self.points.len() - recent;
        let older_budget = self.config.max_points.saturating_sub(recent).max(1);
        let stride = older_len.div_ceil(older_budget);

        let mut thinned = Vec::with_capacity(self.config.max_points);
        thinned.extend(self.points[..older_len].iter().copied().step_by(stride));
        thinned.extend_from_slice(&self.points[older_len..]);
        self.points = thinned;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> SampleSeries {
        SampleSeries::default()
    }

    #[test]
    fn first_reading_is_stored_raw() {
        let mut s = series();
        s.record(0.5, 40.0);
        assert_eq!(s.points(), &[SamplePoint::new(0.5, 40.0)]);
    }

    #[test]
    fn spaced_readings_append_smoothed_points() {
        let mut s = series();
        s.record(0.0, 40.0);
        s.record(0.5, 60.0);
        assert_eq!(s.len(), 2);
        // 40 * 0.9 + 60 * 0.1
        assert!((s.points()[1].value - 42.0).abs() < 1e-12);
    }

    #[test]
    fn rapid_readings_fold_into_the_last_point() {
        let mut s = series();
        s.record(0.0, 40.0);
        s.record(0.5, 60.0);
        let before = s.len();

        // Under the 0.3s threshold: the point count must not grow.
        s.record(0.6, 90.0);
        s.record(0.7, 90.0);
        assert_eq!(s.len(), before);

        // 42 * 0.95 + 90 * 0.05, applied twice.
        let expected = (42.0f64 * 0.95 + 90.0 * 0.05) * 0.95 + 90.0 * 0.05;
        assert!((s.points()[before - 1].value - expected).abs() < 1e-9);
    }

    #[test]
    fn time_stays_non_decreasing() {
        let mut s = series();
        for i in 0..200 {
            s.record(i as f64 * 0.17, 50.0 + (i % 7) as f64);
        }
        let times: Vec<f64> = s.points().iter().map(|p| p.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn long_sessions_stay_under_the_cap() {
        let mut s = series();
        for i in 0..130 {
            s.record(i as f64 * 0.3, 50.0);
        }
        assert!(s.len() <= 120, "len = {}", s.len());

        // Newest thirty points are untouched by downsampling: still spaced
        // exactly one append threshold apart.
        let pts = s.points();
        let recent = &pts[pts.len() - 30..];
        for pair in recent.windows(2) {
            assert!((pair[1].time - pair[0].time - 0.3).abs() < 1e-9);
        }

        // Older points were strided, so their spacing is wider.
        assert!(pts[1].time - pts[0].time > 0.3 + 1e-9);
    }

    #[test]
    fn finalize_overwrites_a_nearby_terminal_point() {
        let mut s = series();
        s.record(0.0, 40.0);
        s.record(9.9, 47.0);
        s.finalize(10.0, 52.0);

        let last = *s.points().last().unwrap();
        assert_eq!(last, SamplePoint::new(10.0, 52.0));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn finalize_appends_when_no_point_is_close() {
        let mut s = series();
        s.record(0.0, 40.0);
        s.record(9.0, 47.0);
        s.finalize(10.0, 52.0);

        assert_eq!(s.len(), 3);
        assert_eq!(*s.points().last().unwrap(), SamplePoint::new(10.0, 52.0));
    }

    #[test]
    fn finalize_drops_samples_past_the_final_time() {
        let mut s = series();
        s.record(0.0, 40.0);
        s.record(5.0, 45.0);
        s.record(11.0, 48.0);
        s.finalize(10.0, 52.0);

        assert!(s.points().iter().all(|p| p.time <= 10.0));
        assert_eq!(*s.points().last().unwrap(), SamplePoint::new(10.0, 52.0));
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut s = series();
        s.record(0.0, 40.0);
        s.record(9.9, 47.0);
        s.finalize(10.0, 52.0);
        let first = s.points().to_vec();

        s.finalize(10.0, 52.0);
        assert_eq!(s.points(), first.as_slice());
    }

    #[test]
    fn sealed_series_ignores_further_readings() {
        let mut s = series();
        s.record(0.0, 40.0);
        s.finalize(1.0, 41.0);
        let len = s.len();

        s.record(2.0, 90.0);
        assert_eq!(s.len(), len);
        assert_eq!(s.last_value(), Some(41.0));
    }

    #[test]
    fn clear_reopens_the_series() {
        let mut s = series();
        s.record(0.0, 40.0);
        s.finalize(1.0, 41.0);
        s.clear();

        assert!(s.is_empty());
        s.record(0.0, 55.0);
        assert_eq!(s.len(), 1);
    }
}
