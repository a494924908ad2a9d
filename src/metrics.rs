use crate::final_stats::CharacterStats;
use crate::util::round2;

/// Characters per standardized word.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Named tuning constants for the WPM formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    /// Floor on elapsed time, in minutes. Keeps the first seconds of a
    /// session from producing absurd WPM values.
    pub min_elapsed_minutes: f64,
    /// Exponent applied to the correct-keystroke ratio while typing.
    pub correction_exponent: f64,
    /// Accuracy at or above this fraction carries no penalty.
    pub high_accuracy_floor: f64,
    /// Accuracy at or above this fraction is penalized mildly.
    pub mid_accuracy_floor: f64,
    pub mid_accuracy_exponent: f64,
    pub low_accuracy_exponent: f64,
    /// Flat discount applied to in-progress readings.
    pub live_realism_factor: f64,
    /// Flat discount applied to the final reading.
    pub final_realism_factor: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            min_elapsed_minutes: 0.1,
            correction_exponent: 0.85,
            high_accuracy_floor: 0.97,
            mid_accuracy_floor: 0.90,
            mid_accuracy_exponent: 0.9,
            low_accuracy_exponent: 1.3,
            live_realism_factor: 0.92,
            final_realism_factor: 0.95,
        }
    }
}

/// Everything the WPM formula needs about the state of a test.
#[derive(Debug, Clone, Copy)]
pub struct WpmInput<'a> {
    pub typed: &'a str,
    pub target: &'a str,
    /// Cursor position in chars; the live formula analyzes `typed[..position]`.
    pub position: usize,
    /// Wall time minus accumulated pause credit, in milliseconds.
    pub elapsed_ms: u64,
    /// Every grow/shrink of the typed text, so corrections are not free.
    pub total_keypresses: usize,
    pub finished: bool,
}

/// Per-position comparison of a typed prefix against the target.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PrefixTally {
    correct: usize,
    incorrect: usize,
    /// Typed characters with no target position left to compare against.
    extra: usize,
}

fn tally_prefix<I>(typed: I, target: &str) -> PrefixTally
where
    I: Iterator<Item = char>,
{
    let mut target_chars = target.chars();
    let mut tally = PrefixTally::default();
    for c in typed {
        match target_chars.next() {
            Some(expected) if expected == c => tally.correct += 1,
            Some(_) => tally.incorrect += 1,
            None => tally.extra += 1,
        }
    }
    tally
}

impl PrefixTally {
    fn accuracy_fraction(&self) -> f64 {
        let attempted = self.correct + self.incorrect + self.extra;
        if attempted == 0 {
            return 0.0;
        }
        self.correct as f64 / attempted as f64
    }
}

/// Words-per-minute for the analyzed portion of a test.
///
/// Returns 0 before the first keystroke. Once anything has been typed the
/// result is at least 1, even if every character was later deleted: an
/// attempt that ran never reports a zero speed.
pub fn calculate_wpm(input: &WpmInput, cfg: &MetricsConfig) -> u32 {
    if input.typed.is_empty() && input.total_keypresses == 0 {
        return 0;
    }

    let elapsed_minutes = (input.elapsed_ms as f64 / 60_000.0).max(cfg.min_elapsed_minutes);

    let tally = if input.finished {
        tally_prefix(input.typed.chars(), input.target)
    } else {
        tally_prefix(input.typed.chars().take(input.position), input.target)
    };

    let mut wpm = (tally.correct as f64 / CHARS_PER_WORD) / elapsed_minutes;

    if input.finished {
        wpm *= cfg.final_realism_factor;
    } else {
        let keypresses = input.total_keypresses.max(1);
        let correction = (tally.correct as f64 / keypresses as f64).min(1.0);
        wpm *= correction.powf(cfg.correction_exponent);

        let accuracy = tally.accuracy_fraction();
        if accuracy < cfg.mid_accuracy_floor {
            wpm *= accuracy.powf(cfg.low_accuracy_exponent);
        } else if accuracy < cfg.high_accuracy_floor {
            wpm *= accuracy.powf(cfg.mid_accuracy_exponent);
        }

        wpm *= cfg.live_realism_factor;
    }

    (wpm.round() as u32).max(1)
}

/// Accuracy of the typed text against the target, as a whole percentage.
///
/// Characters typed past the end of the target count against accuracy.
/// An empty typed string reports 0.
pub fn calculate_accuracy(typed: &str, target: &str) -> u8 {
    if typed.is_empty() {
        return 0;
    }
    let tally = tally_prefix(typed.chars(), target);
    (tally.accuracy_fraction() * 100.0).round() as u8
}

/// Accuracy reported at the end of a test.
///
/// Prefers the detailed character outcome counts; falls back to the last
/// sampled accuracy when they are unavailable, then to 0.
pub fn final_accuracy(stats: Option<&CharacterStats>, last_sampled: Option<f64>) -> f64 {
    if let Some(stats) = stats {
        let total = stats.total();
        if total == 0 {
            return 0.0;
        }
        return round2(stats.correct as f64 / total as f64 * 100.0);
    }
    last_sampled.unwrap_or(0.0)
}
