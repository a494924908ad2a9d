use crate::util::coefficient_of_variation;

/// Outcome counts for every character position of a finished test.
///
/// The four buckets partition `max(typed_len, target_len)`: positions present
/// in both strings are correct or incorrect, positions the typist never
/// reached are missed, positions typed past the end of the target are extra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacterStats {
    pub correct: usize,
    pub incorrect: usize,
    pub missed: usize,
    pub extra: usize,
}

impl CharacterStats {
    pub fn total(&self) -> usize {
        self.correct + self.incorrect + self.missed + self.extra
    }
}

/// Classify the final typed text against the target, position by position.
pub fn classify_characters(typed: &str, target: &str) -> CharacterStats {
    let mut stats = CharacterStats::default();
    let mut typed_chars = typed.chars();
    let mut target_chars = target.chars();

    loop {
        match (typed_chars.next(), target_chars.next()) {
            (Some(t), Some(expected)) => {
                if t == expected {
                    stats.correct += 1;
                } else {
                    stats.incorrect += 1;
                }
            }
            (None, Some(_)) => stats.missed += 1,
            (Some(_), None) => stats.extra += 1,
            (None, None) => break,
        }
    }

    stats
}

/// Consistency of a finished test, from the spread of its WPM samples.
///
/// 100 means a perfectly even pace; the score drops by one point per percent
/// of relative standard deviation, floored at 0. Not computable without
/// samples.
pub fn consistency(wpm_samples: &[f64]) -> Option<f64> {
    if wpm_samples.is_empty() {
        return None;
    }
    let cv = coefficient_of_variation(wpm_samples).unwrap_or(0.0);
    Some((100.0 - cv.min(100.0)).clamp(0.0, 100.0))
}
