use std::time::{Duration, Instant};

use crate::content::{TestDuration, TextMode};
use crate::final_stats::{classify_characters, consistency, CharacterStats};
use crate::history::{SampleSeries, SamplerConfig};
use crate::metrics::{calculate_accuracy, calculate_wpm, final_accuracy, MetricsConfig, WpmInput};

/// Lifecycle of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No keystroke yet; duration and mode are still selectable.
    Idle,
    /// Clock running, settings locked.
    Active,
    /// Final line typed or the duration elapsed.
    Completed,
}

/// User-selectable parameters of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSettings {
    pub duration: TestDuration,
    pub mode: TextMode,
    pub competitive: bool,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            duration: TestDuration::Medium,
            mode: TextMode::Normal,
            competitive: false,
        }
    }
}

/// Read-only view of a session for the rendering layer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub typed_text: String,
    pub target_text: String,
    pub elapsed_seconds: f64,
    pub current_wpm: u32,
    pub current_accuracy: u8,
    pub wpm_history: Vec<(f64, f64)>,
    pub accuracy_history: Vec<(f64, f64)>,
    pub is_active: bool,
    pub is_completed: bool,
}

/// Everything computed once a test completes.
#[derive(Debug, Clone, Copy)]
pub struct FinalReport {
    pub wpm: u32,
    pub accuracy: f64,
    pub character_stats: CharacterStats,
    pub consistency: Option<f64>,
    pub elapsed: Duration,
    pub characters_typed: usize,
    pub total_keypresses: usize,
}

/// One typing attempt against a (possibly multi-line) target text.
///
/// The test owns its clock bookkeeping, keystroke accounting, sample
/// history, and lifecycle. All timing flows in through the `now` arguments;
/// nothing here reads the wall clock, which keeps every transition
/// reproducible in tests.
#[derive(Debug)]
pub struct TypingTest {
    settings: TestSettings,
    metrics_config: MetricsConfig,
    sampler_config: SamplerConfig,
    lines: Vec<String>,
    line_index: usize,
    typed_line: String,
    /// Typed text of completed lines, newline-joined, in target alignment.
    completed_typed: String,
    phase: Phase,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    total_keypresses: usize,
    wpm_series: SampleSeries,
    accuracy_series: SampleSeries,
    report: Option<FinalReport>,
    submitted: bool,
}

impl TypingTest {
    pub fn new(target: String, settings: TestSettings) -> Self {
        Self::with_configs(
            target,
            settings,
            MetricsConfig::default(),
            SamplerConfig::default(),
        )
    }

    pub fn with_configs(
        target: String,
        settings: TestSettings,
        metrics_config: MetricsConfig,
        sampler_config: SamplerConfig,
    ) -> Self {
        let lines: Vec<String> = target
            .trim_matches('\n')
            .split('\n')
            .map(str::to_string)
            .collect();
        Self {
            settings,
            metrics_config,
            sampler_config,
            lines,
            line_index: 0,
            typed_line: String::new(),
            completed_typed: String::new(),
            phase: Phase::Idle,
            started_at: None,
            finished_at: None,
            paused_at: None,
            paused_total: Duration::ZERO,
            total_keypresses: 0,
            wpm_series: SampleSeries::new(sampler_config),
            accuracy_series: SampleSeries::new(sampler_config),
            report: None,
            submitted: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn settings(&self) -> TestSettings {
        self.settings
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn total_keypresses(&self) -> usize {
        self.total_keypresses
    }

    pub fn line_index(&self) -> usize {
        self.line_index
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn current_line_target(&self) -> &str {
        &self.lines[self.line_index.min(self.lines.len() - 1)]
    }

    pub fn current_line_typed(&self) -> &str {
        &self.typed_line
    }

    pub fn target_text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn typed_text(&self) -> String {
        format!("{}{}", self.completed_typed, self.typed_line)
    }

    pub fn report(&self) -> Option<&FinalReport> {
        self.report.as_ref()
    }

    pub fn wpm_points(&self) -> &[crate::history::SamplePoint] {
        self.wpm_series.points()
    }

    pub fn accuracy_points(&self) -> &[crate::history::SamplePoint] {
        self.accuracy_series.points()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Marked by the submission service once the store accepted the score.
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
    }

    /// Wall time spent typing, net of pause credit.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let Some(started) = self.started_at else {
            return Duration::ZERO;
        };
        let end = match self.finished_at {
            Some(finished) => finished,
            None => self.paused_at.unwrap_or(now),
        };
        end.saturating_duration_since(started)
            .saturating_sub(self.paused_total)
    }

    pub fn seconds_remaining(&self, now: Instant) -> f64 {
        let limit = self.settings.duration.secs() as f64;
        (limit - self.elapsed(now).as_secs_f64()).max(0.0)
    }

    /// Apply the full replacement typed text for the current line.
    ///
    /// Input longer than the target line is rejected outright. The absolute
    /// length delta counts toward total keypresses, so deletions cost
    /// strokes without shortening the net text. The first character latches
    /// the start time; filling the last line completes the test.
    pub fn on_input(&mut self, new_typed: &str, now: Instant) {
        if self.phase == Phase::Completed || self.paused_at.is_some() {
            return;
        }

        let target_len = self.current_line_target().chars().count();
        let new_len = new_typed.chars().count();
        if new_len > target_len {
            return;
        }

        let old_len = self.typed_line.chars().count();
        let delta = new_len.abs_diff(old_len);
        if delta == 0 && new_typed == self.typed_line {
            return;
        }
        self.total_keypresses += delta;

        if self.started_at.is_none() && new_len > 0 {
            self.started_at = Some(now);
            self.phase = Phase::Active;
        }

        self.typed_line = new_typed.to_string();

        if new_len == target_len && target_len > 0 {
            self.advance_line(now);
        }
    }

    /// One scheduler tick: sample the live metrics and enforce the duration
    /// cutoff. Both jobs ride the same tick so there is nothing to drift or
    /// cancel separately.
    pub fn on_tick(&mut self, now: Instant) {
        if self.phase != Phase::Active || self.paused_at.is_some() {
            return;
        }

        let elapsed = self.elapsed(now);
        if elapsed.as_secs_f64() >= self.settings.duration.secs() as f64 {
            self.complete(now);
            return;
        }

        let wpm = self.live_wpm(now);
        let accuracy = self.live_accuracy();
        let t = elapsed.as_secs_f64();
        self.wpm_series.record(t, f64::from(wpm));
        self.accuracy_series.record(t, f64::from(accuracy));
    }

    pub fn live_wpm(&self, now: Instant) -> u32 {
        let typed = self.typed_text();
        let input = WpmInput {
            typed: &typed,
            target: &self.target_text(),
            position: typed.chars().count(),
            elapsed_ms: self.elapsed(now).as_millis() as u64,
            total_keypresses: self.total_keypresses,
            finished: self.phase == Phase::Completed,
        };
        calculate_wpm(&input, &self.metrics_config)
    }

    pub fn live_accuracy(&self) -> u8 {
        calculate_accuracy(&self.typed_text(), &self.target_text())
    }

    /// Suspend the clock (e.g. the terminal lost focus).
    pub fn pause(&mut self, now: Instant) {
        if self.phase == Phase::Active && self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let Some(paused) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused);
        }
    }

    /// Settings changes are rejected while the clock is running.
    pub fn change_duration(&mut self, duration: TestDuration) -> bool {
        if self.phase == Phase::Active {
            return false;
        }
        self.settings.duration = duration;
        true
    }

    pub fn set_mode(&mut self, mode: TextMode) -> bool {
        if self.phase == Phase::Active {
            return false;
        }
        self.settings.mode = mode;
        true
    }

    pub fn toggle_competitive(&mut self) -> bool {
        if self.phase == Phase::Active {
            return false;
        }
        self.settings.competitive = !self.settings.competitive;
        true
    }

    /// Back to Idle with a fresh target; duration and mode survive.
    pub fn reset(&mut self, new_target: String) {
        *self = Self::with_configs(
            new_target,
            self.settings,
            self.metrics_config,
            self.sampler_config,
        );
    }

    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let (wpm, accuracy) = match &self.report {
            Some(report) => (report.wpm, report.accuracy.round() as u8),
            None => (self.live_wpm(now), self.live_accuracy()),
        };
        Snapshot {
            typed_text: self.typed_text(),
            target_text: self.target_text(),
            elapsed_seconds: self.elapsed(now).as_secs_f64(),
            current_wpm: wpm,
            current_accuracy: accuracy,
            wpm_history: self.wpm_series.points().iter().map(|p| (*p).into()).collect(),
            accuracy_history: self
                .accuracy_series
                .points()
                .iter()
                .map(|p| (*p).into())
                .collect(),
            is_active: self.phase == Phase::Active,
            is_completed: self.phase == Phase::Completed,
        }
    }

    fn advance_line(&mut self, now: Instant) {
        loop {
            self.completed_typed.push_str(&self.typed_line);
            self.typed_line.clear();

            if self.line_index + 1 < self.lines.len() {
                self.completed_typed.push('\n');
                self.line_index += 1;
                // Blank lines carry nothing to type; skip straight past them.
                if self.lines[self.line_index].is_empty() {
                    continue;
                }
                return;
            }

            self.line_index += 1;
            self.complete(now);
            return;
        }
    }

    /// Seal the attempt: final stats first, then the exact terminal history
    /// point, so the chart always ends on the reported numbers.
    fn complete(&mut self, now: Instant) {
        if self.phase == Phase::Completed {
            return;
        }
        self.finished_at = Some(now);
        self.phase = Phase::Completed;

        let typed = self.typed_text();
        let target = self.target_text();
        let elapsed = self.elapsed(now);

        let character_stats = classify_characters(&typed, &target);
        let wpm_values: Vec<f64> = self.wpm_series.points().iter().map(|p| p.value).collect();
        let consistency = consistency(&wpm_values);

        let wpm = calculate_wpm(
            &WpmInput {
                typed: &typed,
                target: &target,
                position: typed.chars().count(),
                elapsed_ms: elapsed.as_millis() as u64,
                total_keypresses: self.total_keypresses,
                finished: true,
            },
            &self.metrics_config,
        );
        let accuracy = final_accuracy(Some(&character_stats), self.accuracy_series.last_value());

        let t = elapsed.as_secs_f64();
        self.wpm_series.finalize(t, f64::from(wpm));
        self.accuracy_series.finalize(t, accuracy);

        self.report = Some(FinalReport {
            wpm,
            accuracy,
            character_stats,
            consistency,
            elapsed,
            characters_typed: typed.chars().count(),
            total_keypresses: self.total_keypresses,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn start() -> Instant {
        Instant::now()
    }

    fn after(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    fn settings() -> TestSettings {
        TestSettings::default()
    }

    fn type_text(test: &mut TypingTest, text: &str, t: Instant) {
        let mut typed = String::new();
        for c in text.chars() {
            if c == '\n' {
                // Line advance happens when the line fills; newline itself
                // is never typed.
                typed.clear();
                continue;
            }
            typed.push(c);
            test.on_input(&typed, t);
        }
    }

    #[test]
    fn starts_idle_and_activates_on_first_keystroke() {
        let t0 = start();
        let mut test = TypingTest::new("hello".into(), settings());
        assert_matches!(test.phase(), Phase::Idle);
        assert!(!test.has_started());

        test.on_input("h", after(t0, 100));
        assert_matches!(test.phase(), Phase::Active);
        assert!(test.has_started());
    }

    #[test]
    fn typed_text_never_exceeds_the_target() {
        let t0 = start();
        let mut test = TypingTest::new("hi".into(), settings());
        test.on_input("h", t0);

        // Overlong input is rejected wholesale.
        test.on_input("hix", after(t0, 50));
        assert_eq!(test.current_line_typed(), "h");
        assert!(test.typed_text().chars().count() <= test.target_text().chars().count());
    }

    #[test]
    fn corrections_count_keystrokes_by_length_delta() {
        let t0 = start();
        let mut test = TypingTest::new("hello".into(), settings());
        test.on_input("he", t0);
        test.on_input("h", after(t0, 50));
        test.on_input("hel", after(t0, 100));

        // 2 grown + 1 shrunk + 2 grown
        assert_eq!(test.total_keypresses(), 5);
    }

    #[test]
    fn completes_when_the_last_line_fills() {
        let t0 = start();
        let mut test = TypingTest::new("hi".into(), settings());
        test.on_input("h", t0);
        test.on_input("hi", after(t0, 7_000));

        assert_matches!(test.phase(), Phase::Completed);
        let report = test.report().expect("report after completion");
        assert!(report.wpm >= 1);
        assert_eq!(report.accuracy, 100.0);
    }

    #[test]
    fn multi_line_targets_advance_line_by_line() {
        let t0 = start();
        let mut test = TypingTest::new("ab\ncd".into(), settings());
        assert_eq!(test.line_count(), 2);

        test.on_input("a", t0);
        test.on_input("ab", after(t0, 100));
        assert_eq!(test.line_index(), 1);
        assert_eq!(test.current_line_typed(), "");
        assert_eq!(test.current_line_target(), "cd");
        assert_matches!(test.phase(), Phase::Active);

        test.on_input("c", after(t0, 200));
        test.on_input("cd", after(t0, 7_000));
        assert_matches!(test.phase(), Phase::Completed);
        assert_eq!(test.typed_text(), "ab\ncd");
    }

    #[test]
    fn duration_cutoff_forces_completion_mid_text() {
        let t0 = start();
        let mut test = TypingTest::new("hello world".into(), settings());
        test.on_input("hel", t0);

        // Past the 30s limit without finishing the text.
        test.on_tick(after(t0, 31_000));

        assert_matches!(test.phase(), Phase::Completed);
        let report = test.report().unwrap();
        assert_eq!(report.character_stats.missed, "lo world".len());
        assert_eq!(report.character_stats.extra, 0);
    }

    #[test]
    fn ticks_sample_history_while_active() {
        let t0 = start();
        let mut test = TypingTest::new("hello world".into(), settings());
        test.on_input("hello", t0);

        for i in 1..=5 {
            test.on_tick(after(t0, i * 400));
        }
        assert!(!test.wpm_points().is_empty());
        assert_eq!(test.wpm_points().len(), test.accuracy_points().len());
    }

    #[test]
    fn ticks_do_nothing_before_start_or_after_completion() {
        let t0 = start();
        let mut test = TypingTest::new("hi".into(), settings());
        test.on_tick(after(t0, 400));
        assert!(test.wpm_points().is_empty());

        test.on_input("h", t0);
        test.on_input("hi", after(t0, 7_000));
        let len = test.wpm_points().len();
        test.on_tick(after(t0, 8_000));
        assert_eq!(test.wpm_points().len(), len);
    }

    #[test]
    fn history_ends_exactly_on_the_final_metrics() {
        let t0 = start();
        let mut test = TypingTest::new("hello".into(), settings());
        test.on_input("he", t0);
        test.on_tick(after(t0, 500));
        test.on_tick(after(t0, 1_000));
        type_text(&mut test, "hello", after(t0, 6_000));

        let report = *test.report().unwrap();
        let last_wpm = *test.wpm_points().last().unwrap();
        let last_acc = *test.accuracy_points().last().unwrap();
        assert_eq!(last_wpm.value, f64::from(report.wpm));
        assert_eq!(last_acc.value, report.accuracy);
        assert_eq!(last_wpm.time, report.elapsed.as_secs_f64());
    }

    #[test]
    fn pause_credit_stops_the_clock() {
        let t0 = start();
        let mut test = TypingTest::new("hello".into(), settings());
        test.on_input("h", t0);

        test.pause(after(t0, 1_000));
        test.resume(after(t0, 11_000));

        // 11s wall time minus 10s paused.
        let elapsed = test.elapsed(after(t0, 11_000));
        assert_eq!(elapsed, Duration::from_secs(1));
    }

    #[test]
    fn input_is_ignored_while_paused() {
        let t0 = start();
        let mut test = TypingTest::new("hello".into(), settings());
        test.on_input("h", t0);
        test.pause(after(t0, 500));

        test.on_input("he", after(t0, 600));
        assert_eq!(test.current_line_typed(), "h");
    }

    #[test]
    fn settings_lock_while_active() {
        let t0 = start();
        let mut test = TypingTest::new("hello".into(), settings());
        assert!(test.change_duration(TestDuration::Long));

        test.on_input("h", t0);
        assert!(!test.change_duration(TestDuration::Short));
        assert!(!test.set_mode(TextMode::Code));
        assert!(!test.toggle_competitive());
        assert_eq!(test.settings().duration, TestDuration::Long);
    }

    #[test]
    fn reset_returns_to_idle_and_keeps_settings() {
        let t0 = start();
        let mut test = TypingTest::new("hello".into(), settings());
        test.change_duration(TestDuration::Marathon);
        test.set_mode(TextMode::Code);
        test.on_input("h", t0);
        test.on_tick(after(t0, 400));

        test.reset("fn main() {}".into());

        assert_matches!(test.phase(), Phase::Idle);
        assert_eq!(test.settings().duration, TestDuration::Marathon);
        assert_eq!(test.settings().mode, TextMode::Code);
        assert!(test.wpm_points().is_empty());
        assert_eq!(test.total_keypresses(), 0);
        assert!(!test.is_submitted());
    }

    #[test]
    fn snapshot_reflects_the_live_session() {
        let t0 = start();
        let mut test = TypingTest::new("hello".into(), settings());
        test.on_input("he", t0);
        test.on_tick(after(t0, 400));

        let snap = test.snapshot(after(t0, 500));
        assert!(snap.is_active);
        assert!(!snap.is_completed);
        assert_eq!(snap.typed_text, "he");
        assert_eq!(snap.target_text, "hello");
        assert_eq!(snap.current_accuracy, 100);
        assert_eq!(snap.wpm_history.len(), test.wpm_points().len());
    }

    #[test]
    fn snapshot_after_completion_carries_final_numbers() {
        let t0 = start();
        let mut test = TypingTest::new("hi".into(), settings());
        test.on_input("h", t0);
        test.on_input("hi", after(t0, 6_000));

        let snap = test.snapshot(after(t0, 9_000));
        let report = test.report().unwrap();
        assert!(snap.is_completed);
        assert_eq!(snap.current_wpm, report.wpm);
        assert_eq!(snap.elapsed_seconds, report.elapsed.as_secs_f64());
    }
}
