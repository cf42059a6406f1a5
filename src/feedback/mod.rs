use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use tera::{Context as TeraContext, Tera};

use crate::accent::AccentMode;
use crate::providers::ToolSpec;
use crate::scoring::{ScoringResult, WordComparison};

pub const FEEDBACK_TOOL_NAME: &str = "deliver_feedback";
pub const WORD_TIP_TOOL_NAME: &str = "deliver_word_tip";

#[derive(Debug, Clone)]
pub struct FeedbackOptions {
    pub mode: AccentMode,
    pub max_words: usize,
}

// ---------------------------------------------------------------------------
// Deterministic template path.
//
// Phrase pools are interchangeable; selection is a pure function of the
// scoring result so the same attempt always produces the same feedback.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreTier {
    Excellent,
    Good,
    Fair,
    NeedsWork,
    Encouragement,
}

fn tier_for(score: f64) -> ScoreTier {
    if score >= 90.0 {
        ScoreTier::Excellent
    } else if score >= 75.0 {
        ScoreTier::Good
    } else if score >= 60.0 {
        ScoreTier::Fair
    } else if score >= 40.0 {
        ScoreTier::NeedsWork
    } else {
        ScoreTier::Encouragement
    }
}

const EXCELLENT_PHRASES: &[&str] = &[
    "Outstanding pronunciation!",
    "Your clarity is impressive!",
    "Nearly perfect pronunciation!",
    "Excellent job on your pronunciation!",
];

const GOOD_PHRASES: &[&str] = &[
    "Good progress on your pronunciation!",
    "You're doing well with your pronunciation!",
    "Nice work on most of the words!",
    "Your pronunciation is getting better!",
];

const FAIR_PHRASES: &[&str] = &[
    "You're making progress!",
    "Some good pronunciation there!",
    "You're on the right track!",
    "Good effort, keep it up!",
];

const NEEDS_WORK_PHRASES: &[&str] = &[
    "Keep practicing, improvement is coming!",
    "Every practice makes you better!",
    "Practice makes perfect!",
    "You're learning, keep going!",
];

const ENCOURAGEMENT_PHRASES: &[&str] = &[
    "Don't give up, you can do this!",
    "This sentence is a tough one, stay with it!",
    "Slow and clear beats fast and unclear!",
    "One practice at a time, you'll get there!",
];

const PERFECT_PHRASES: &[&str] = &[
    "All words pronounced correctly!",
    "No mistakes detected, amazing!",
    "Perfect pronunciation throughout!",
    "You nailed every word!",
];

const MOTIVATION_PHRASES: &[&str] = &[
    "You're getting closer each time!",
    "Keep up the great work!",
    "You're making real progress!",
    "Your hard work is paying off!",
    "One step closer to fluency!",
    "Every practice counts!",
];

fn achievement_pool(tier: ScoreTier) -> &'static [&'static str] {
    match tier {
        ScoreTier::Excellent => EXCELLENT_PHRASES,
        ScoreTier::Good => GOOD_PHRASES,
        ScoreTier::Fair => FAIR_PHRASES,
        ScoreTier::NeedsWork => NEEDS_WORK_PHRASES,
        ScoreTier::Encouragement => ENCOURAGEMENT_PHRASES,
    }
}

fn phrase_seed(result: &ScoringResult) -> usize {
    (result.score * 10.0) as usize + result.total_words + result.correct_words.len()
}

fn pick<'a>(pool: &[&'a str], seed: usize) -> &'a str {
    pool[seed % pool.len()]
}

/// One-line feedback: praise for the tier, the most important mistake words,
/// and a closing motivation. The lowest tier stays encouragement-only and
/// does not dwell on individual mistakes.
pub fn dynamic_feedback(result: &ScoringResult) -> String {
    let seed = phrase_seed(result);
    let tier = tier_for(result.score);
    let mut parts = vec![pick(achievement_pool(tier), seed).to_string()];
    if tier != ScoreTier::Encouragement {
        if result.incorrect_words.is_empty() {
            parts.push(pick(PERFECT_PHRASES, seed).to_string());
        } else {
            parts.push(mistake_highlight(&result.incorrect_words, seed));
        }
    }
    parts.push(pick(MOTIVATION_PHRASES, seed).to_string());
    parts.join(" ")
}

fn mistake_highlight(mistakes: &[WordComparison], seed: usize) -> String {
    let first = &mistakes[0].expected;
    if mistakes.len() > 1 && seed % 2 == 0 {
        format!(
            "Work on '{}' and '{}', they need the most attention.",
            first, mistakes[1].expected
        )
    } else {
        match seed % 3 {
            0 => format!("You struggled with '{}', practice the sound carefully.", first),
            1 => format!("Watch the pronunciation of '{}'.", first),
            _ => format!("The word '{}' is tricky, practice it slowly.", first),
        }
    }
}

/// Multi-line report with the score header, a tier summary, the words that
/// need practice (first five) and generic improvement tips.
pub fn detailed_feedback(result: &ScoringResult) -> String {
    let mut lines = vec![
        format!(
            "Score: {:.1}/100 ({}/{} words correct)",
            result.score,
            result.correct_words.len(),
            result.total_words
        ),
        tier_summary(tier_for(result.score)).to_string(),
    ];
    if result.incorrect_words.is_empty() {
        lines.push("All words pronounced correctly. Excellent work!".to_string());
    } else {
        let words = result
            .incorrect_words
            .iter()
            .take(5)
            .map(|word| word.expected.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Words needing practice: {}", words));
        lines.push("Tips:".to_string());
        lines.push("- Listen to native speakers pronouncing these words".to_string());
        lines.push("- Break each word into syllables and practice slowly".to_string());
        lines.push("- Record yourself and compare against the reference".to_string());
    }
    lines.join("\n")
}

fn tier_summary(tier: ScoreTier) -> &'static str {
    match tier {
        ScoreTier::Excellent => "Excellent! Your pronunciation is nearly perfect.",
        ScoreTier::Good => "Good job! Your pronunciation is clear and understandable.",
        ScoreTier::Fair => "You're making progress. Keep practicing to improve clarity.",
        ScoreTier::NeedsWork => "Focus on the highlighted words and practice regularly.",
        ScoreTier::Encouragement => "Don't give up! Take it one word at a time.",
    }
}

// ---------------------------------------------------------------------------
// Provider-backed path: prompt rendering and the tool contract.
// ---------------------------------------------------------------------------

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    let base = json!({
        "type": "object",
        "properties": {
            "feedback": {
                "type": "string",
                "description": "Feedback text for the learner, within the word limit."
            },
            "focus_words": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Words the learner should practice next, most important first."
            }
        },
        "required": ["feedback"]
    });

    ToolSpec {
        name: tool_name.to_string(),
        description: "Deliver pronunciation feedback for one practice attempt.".to_string(),
        parameters: base,
    }
}

pub fn word_tip_tool_spec(tool_name: &str) -> ToolSpec {
    let base = json!({
        "type": "object",
        "properties": {
            "tip": {
                "type": "string",
                "description": "Pronunciation tip for the requested word."
            }
        },
        "required": ["tip"]
    });

    ToolSpec {
        name: tool_name.to_string(),
        description: "Deliver a pronunciation tip for a single word.".to_string(),
        parameters: base,
    }
}

pub fn render_feedback_prompt(options: &FeedbackOptions, tool_name: &str) -> Result<String> {
    let template = load_prompt_template("feedback_prompt.tera")?;
    let mut context = TeraContext::new();
    context.insert("tolerant", &matches!(options.mode, AccentMode::Tolerant));
    context.insert("max_words", &options.max_words);
    context.insert("tool_name", tool_name);
    Tera::one_off(&template, &context, false).with_context(|| "failed to render feedback prompt")
}

pub fn render_word_tip_prompt(max_words: usize, tool_name: &str) -> Result<String> {
    let template = load_prompt_template("word_tip_prompt.tera")?;
    let mut context = TeraContext::new();
    context.insert("max_words", &max_words);
    context.insert("tool_name", tool_name);
    Tera::one_off(&template, &context, false).with_context(|| "failed to render word tip prompt")
}

/// User message sent alongside the system prompt: the raw pair plus the
/// engine's verdict, so the model comments on the mistakes the engine found.
pub fn build_feedback_input(
    reference: &str,
    transcription: &str,
    result: &ScoringResult,
) -> String {
    let mistakes = if result.incorrect_words.is_empty() {
        "none".to_string()
    } else {
        result
            .incorrect_words
            .iter()
            .map(|word| word.expected.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Reference: \"{}\"\nTranscription: \"{}\"\nScore: {:.1}/100 ({}/{} words correct)\nMistake words: {}",
        reference.trim(),
        transcription.trim(),
        result.score,
        result.correct_words.len(),
        result.total_words,
        mistakes
    )
}

#[derive(Debug, Clone)]
pub struct FeedbackReply {
    pub feedback: String,
    pub focus_words: Vec<String>,
}

pub fn parse_feedback_args(value: serde_json::Value) -> Result<FeedbackReply> {
    #[derive(Deserialize)]
    struct ToolArgs {
        feedback: String,
        #[serde(default)]
        focus_words: Option<Vec<String>>,
    }

    let args: ToolArgs = serde_json::from_value(value)?;
    if args.feedback.trim().is_empty() {
        return Err(anyhow!("feedback text is empty"));
    }
    Ok(FeedbackReply {
        feedback: args.feedback.trim().to_string(),
        focus_words: args.focus_words.unwrap_or_default(),
    })
}

pub fn parse_word_tip_args(value: serde_json::Value) -> Result<String> {
    #[derive(Deserialize)]
    struct ToolArgs {
        tip: String,
    }

    let args: ToolArgs = serde_json::from_value(value)?;
    if args.tip.trim().is_empty() {
        return Err(anyhow!("tip text is empty"));
    }
    Ok(args.tip.trim().to_string())
}

fn load_prompt_template(name: &str) -> Result<String> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("feedback")
        .join("prompts")
        .join(name);
    std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read prompt: {}", path.display()))
}
