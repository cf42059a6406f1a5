use anyhow::{Context, Result, anyhow};
use std::path::Path;

pub mod accent;
mod coach;
pub mod feedback;
pub mod logging;
pub mod normalize;
mod providers;
pub mod scoring;
pub mod server;
pub mod settings;
pub mod similarity;
#[cfg(test)]
mod test_util;

pub use accent::AccentMode;
pub use coach::{AnalysisOutput, Coach, WordTipOutput};
pub use providers::{Gemini, OpenAI, Provider, ProviderKind, ProviderUsage};
pub use scoring::{ScoringConfig, ScoringResult, WordComparison, evaluate};

#[derive(Debug, Clone)]
pub struct Config {
    pub reference: Option<String>,
    pub mode: Option<String>,
    pub model: Option<String>,
    pub key: Option<String>,
    pub ai: bool,
    pub detailed: bool,
    pub tip: Option<String>,
    pub settings_path: Option<String>,
    pub with_using_tokens: bool,
    pub with_using_model: bool,
}

pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let mode = resolve_mode(config.mode.as_deref(), &settings)?;

    if let Some(word) = config.tip.clone() {
        let coach = build_coach(&config, settings)?;
        let output = coach.word_tip(&word).await?;
        return Ok(append_meta(
            output.tip,
            output.model.as_deref(),
            output.usage.as_ref(),
            &config,
        ));
    }

    let reference = config.reference.clone().unwrap_or_default();
    let transcription = input.unwrap_or_default().trim().to_string();

    if !config.ai {
        let result = scoring::evaluate(&reference, &transcription, mode, &settings.scoring);
        let report = if config.detailed {
            feedback::detailed_feedback(&result)
        } else {
            format_report(&result, &feedback::dynamic_feedback(&result), &[])
        };
        return Ok(append_meta(report, None, None, &config));
    }

    let coach = build_coach(&config, settings)?;
    let output = coach.analyze(&reference, &transcription, mode).await?;
    let report = format_report(&output.result, &output.feedback, &output.focus_words);
    Ok(append_meta(
        report,
        output.model.as_deref(),
        output.usage.as_ref(),
        &config,
    ))
}

pub(crate) fn resolve_mode(arg: Option<&str>, settings: &settings::Settings) -> Result<AccentMode> {
    let Some(raw) = arg else {
        return Ok(settings.accent_mode);
    };
    AccentMode::from_name(raw).ok_or_else(|| {
        anyhow!(
            "invalid accent mode '{}' (expected tolerant or strict)",
            raw
        )
    })
}

fn build_coach(
    config: &Config,
    settings: settings::Settings,
) -> Result<Coach<providers::ProviderImpl>> {
    let model_arg = config.model.clone().or_else(|| settings.feedback_model.clone());
    let selection =
        providers::resolve_provider_selection(model_arg.as_deref(), config.key.as_deref())?;
    let key = providers::resolve_key(selection.provider, config.key.as_deref())
        .with_context(|| "no API key found for selected provider")?;
    let provider = providers::build_provider(
        selection.provider,
        key,
        selection.requested_model.as_deref(),
    );
    Ok(Coach::new(provider, settings))
}

fn format_report(result: &ScoringResult, feedback: &str, focus_words: &[String]) -> String {
    let mut lines = vec![format!(
        "Score: {:.1}/100 ({}/{} words correct)",
        result.score,
        result.correct_words.len(),
        result.total_words
    )];
    if !result.correct_words.is_empty() {
        lines.push(format!("Correct: {}", result.correct_words.join(", ")));
    }
    if !result.incorrect_words.is_empty() {
        let detail = result
            .incorrect_words
            .iter()
            .map(|word| format!("{} -> {} ({}%)", word.expected, word.actual, word.similarity))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Needs work: {}", detail));
    }
    lines.push(format!("Feedback: {}", feedback));
    if !focus_words.is_empty() {
        lines.push(format!("Focus next: {}", focus_words.join(", ")));
    }
    lines.join("\n")
}

fn append_meta(
    mut output: String,
    model: Option<&str>,
    usage: Option<&ProviderUsage>,
    config: &Config,
) -> String {
    let mut meta_lines = Vec::new();

    if config.with_using_model {
        meta_lines.push(format!("model: {}", model.unwrap_or("unavailable")));
    }

    if config.with_using_tokens {
        meta_lines.push(format_usage(usage));
    }

    if !meta_lines.is_empty() {
        output.push('\n');
        output.push_str(&meta_lines.join("\n"));
    }

    output
}

fn format_usage(usage: Option<&ProviderUsage>) -> String {
    let Some(usage) = usage else {
        return "tokens: unavailable".to_string();
    };
    let total = usage.total_tokens.or_else(|| {
        usage
            .prompt_tokens
            .zip(usage.completion_tokens)
            .map(|(prompt, completion)| prompt + completion)
    });

    let mut parts = Vec::new();
    if let Some(prompt) = usage.prompt_tokens {
        parts.push(format!("prompt={}", prompt));
    }
    if let Some(completion) = usage.completion_tokens {
        parts.push(format!("completion={}", completion));
    }
    if let Some(total) = total {
        parts.push(format!("total={}", total));
    }

    if parts.is_empty() {
        "tokens: unavailable".to_string()
    } else {
        format!("tokens: {}", parts.join(", "))
    }
}
