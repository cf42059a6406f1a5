use serde::Serialize;

use crate::accent::AccentMode;
use crate::normalize::normalize_text;
use crate::similarity::word_similarity;

/// Placeholder recorded when the transcription has no token at a reference
/// position.
pub const NOT_SPOKEN: &str = "(not spoken)";

/// Threshold and bonus-curve constants. The defaults are carried over from
/// the deployed scoring behavior; they can be overridden via settings.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Per-word similarity at or above which a word counts as correct.
    pub similarity_threshold: f64,
    /// Average scores at or above this become a flat 100.
    pub perfect_cutoff: f64,
    /// Average scores at or above this gain `bonus` points, capped at 100.
    pub bonus_cutoff: f64,
    pub bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 70.0,
            perfect_cutoff: 95.0,
            bonus_cutoff: 90.0,
            bonus: 5.0,
        }
    }
}

/// One reference position the learner missed or mispronounced. `similarity`
/// is rounded to a whole percent for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordComparison {
    pub expected: String,
    pub actual: String,
    pub similarity: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringResult {
    pub score: f64,
    pub correct_words: Vec<String>,
    pub incorrect_words: Vec<WordComparison>,
    pub total_words: usize,
    pub spoken_words: usize,
}

impl ScoringResult {
    fn empty() -> Self {
        Self {
            score: 0.0,
            correct_words: Vec::new(),
            incorrect_words: Vec::new(),
            total_words: 0,
            spoken_words: 0,
        }
    }
}

/// Score a transcription against a reference sentence.
///
/// Alignment is strictly positional: reference token i is compared with
/// transcribed token i, a missing position counts as similarity 0, and
/// transcribed tokens beyond the reference length do not enter the score
/// (they are still visible through `spoken_words`).
pub fn evaluate(
    reference: &str,
    transcription: &str,
    mode: AccentMode,
    config: &ScoringConfig,
) -> ScoringResult {
    let reference = normalize_text(reference);
    let transcription = normalize_text(transcription);

    let reference_words: Vec<&str> = reference.split(' ').filter(|w| !w.is_empty()).collect();
    let transcribed_words: Vec<&str> = transcription.split(' ').filter(|w| !w.is_empty()).collect();

    if reference_words.is_empty() {
        return ScoringResult::empty();
    }

    let mut word_scores = Vec::with_capacity(reference_words.len());
    let mut correct_words = Vec::new();
    let mut incorrect_words = Vec::new();

    for (index, expected) in reference_words.iter().enumerate() {
        match transcribed_words.get(index) {
            Some(actual) => {
                let similarity = word_similarity(&mode.apply(expected), &mode.apply(actual));
                word_scores.push(similarity);
                if similarity >= config.similarity_threshold {
                    correct_words.push((*expected).to_string());
                } else {
                    incorrect_words.push(WordComparison {
                        expected: (*expected).to_string(),
                        actual: (*actual).to_string(),
                        similarity: similarity.round() as u8,
                    });
                }
            }
            None => {
                word_scores.push(0.0);
                incorrect_words.push(WordComparison {
                    expected: (*expected).to_string(),
                    actual: NOT_SPOKEN.to_string(),
                    similarity: 0,
                });
            }
        }
    }

    let raw_score = word_scores.iter().sum::<f64>() / word_scores.len() as f64;

    ScoringResult {
        score: round_score(apply_bonus(raw_score, config)),
        correct_words,
        incorrect_words,
        total_words: reference_words.len(),
        spoken_words: transcribed_words.len(),
    }
}

fn apply_bonus(raw_score: f64, config: &ScoringConfig) -> f64 {
    if raw_score >= config.perfect_cutoff {
        100.0
    } else if raw_score >= config.bonus_cutoff {
        (raw_score + config.bonus).min(100.0)
    } else {
        raw_score
    }
}

/// Round to one decimal place and clamp to [0, 100].
pub fn round_score(score: f64) -> f64 {
    ((score * 10.0).round() / 10.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::{evaluate, round_score, ScoringConfig, ScoringResult, NOT_SPOKEN};
    use crate::accent::AccentMode;

    fn strict(reference: &str, transcription: &str) -> ScoringResult {
        evaluate(
            reference,
            transcription,
            AccentMode::Strict,
            &ScoringConfig::default(),
        )
    }

    #[test]
    fn empty_reference_is_a_defined_zero_result() {
        let result = strict("", "anything at all");
        assert_eq!(result.score, 0.0);
        assert_eq!(result.total_words, 0);
        assert!(result.correct_words.is_empty());
        assert!(result.incorrect_words.is_empty());
    }

    #[test]
    fn punctuation_only_difference_scores_100() {
        let result = strict("Hello world", "Hello, world!");
        assert_eq!(result.score, 100.0);
        assert_eq!(result.correct_words, vec!["hello", "world"]);
        assert!(result.incorrect_words.is_empty());
    }

    #[test]
    fn positional_alignment_with_a_dropped_word() {
        // "are" lines up against "you", and the final "you" has no partner.
        let result = strict("Hello how are you", "Hello how you");
        assert_eq!(result.total_words, 4);
        assert_eq!(result.spoken_words, 3);
        assert_eq!(result.correct_words, vec!["hello", "how"]);
        assert_eq!(result.incorrect_words.len(), 2);
        assert_eq!(result.incorrect_words[0].expected, "are");
        assert_eq!(result.incorrect_words[0].actual, "you");
        assert_eq!(result.incorrect_words[1].expected, "you");
        assert_eq!(result.incorrect_words[1].actual, NOT_SPOKEN);
        assert_eq!(result.incorrect_words[1].similarity, 0);
    }

    #[test]
    fn correct_plus_incorrect_always_equals_total() {
        for (reference, transcription) in [
            ("Hello how are you", "Hello how you"),
            ("one two three", ""),
            ("a b c d e", "a b c d e f g"),
            ("Six geese", "6 geese"),
        ] {
            let result = strict(reference, transcription);
            assert_eq!(
                result.correct_words.len() + result.incorrect_words.len(),
                result.total_words
            );
        }
    }

    #[test]
    fn spoken_digit_does_not_match_number_word() {
        let result = strict("six", "6");
        assert_eq!(result.score, 0.0);
        assert_eq!(result.incorrect_words[0].expected, "six");
        assert_eq!(result.incorrect_words[0].actual, "6");
    }

    #[test]
    fn extra_trailing_words_are_ignored_by_the_score() {
        let result = strict("hello world", "hello world again and again");
        assert_eq!(result.score, 100.0);
        assert_eq!(result.total_words, 2);
        assert_eq!(result.spoken_words, 5);
    }

    #[test]
    fn accent_mode_changes_the_verdict_for_three_tree() {
        let tolerant = evaluate(
            "three",
            "tree",
            AccentMode::Tolerant,
            &ScoringConfig::default(),
        );
        assert_eq!(tolerant.score, 100.0);
        assert_eq!(tolerant.correct_words, vec!["three"]);

        // Strict mode still pays the edit-distance cost: 4 of 5 characters
        // line up, so the word passes the threshold but the score drops.
        let strict = strict("three", "tree");
        assert_eq!(strict.score, 80.0);
        assert_eq!(strict.correct_words, vec!["three"]);
    }

    #[test]
    fn result_reports_normalized_words_not_accent_forms() {
        let result = evaluate(
            "Three pens",
            "tree pens",
            AccentMode::Tolerant,
            &ScoringConfig::default(),
        );
        // The tolerant transform ("tree" / "bens") never leaks into output.
        assert_eq!(result.correct_words, vec!["three", "pens"]);
    }

    #[test]
    fn near_perfect_average_becomes_perfect() {
        // 19 exact words and one close miss keep the average above 95.
        let reference = vec!["word"; 19].join(" ") + " stream";
        let transcription = vec!["word"; 19].join(" ") + " streams";
        let result = strict(&reference, &transcription);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn excellent_average_gains_the_bonus() {
        // 7 exact words plus "kitten"/"sitting" (similarity 400/7):
        // average = (700 + 400/7) / 8 ~ 94.6 -> bonus -> 99.6.
        let reference = vec!["word"; 7].join(" ") + " kitten";
        let transcription = vec!["word"; 7].join(" ") + " sitting";
        let result = strict(&reference, &transcription);
        assert_eq!(result.score, 99.6);
    }

    #[test]
    fn mid_range_average_gets_no_bonus() {
        // "four" vs "nine" shares no letters, so the position scores 0.
        let result = strict("one two three four", "one two three nine");
        assert_eq!(result.score, 75.0);
        assert_eq!(result.incorrect_words.len(), 1);
    }

    #[test]
    fn score_keeps_one_decimal_digit() {
        for (reference, transcription) in [
            ("Hello how are you", "Hello how you"),
            ("one two three", "one two tree"),
            ("a b", "b a"),
        ] {
            let score = strict(reference, transcription).score;
            assert!((0.0..=100.0).contains(&score));
            assert_eq!(score, round_score(score));
        }
    }

    #[test]
    fn round_score_clamps_and_rounds() {
        assert_eq!(round_score(87.45), 87.5);
        assert_eq!(round_score(100.2), 100.0);
        assert_eq!(round_score(-3.0), 0.0);
    }
}
