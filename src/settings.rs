use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::accent::AccentMode;
use crate::scoring::ScoringConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub accent_mode: AccentMode,
    pub scoring: ScoringConfig,
    pub feedback_max_words: usize,
    pub feedback_model: Option<String>,
    pub server_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accent_mode: AccentMode::Tolerant,
            scoring: ScoringConfig::default(),
            feedback_max_words: 150,
            feedback_model: None,
            server_addr: "127.0.0.1:7800".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    scoring: Option<ScoringSettings>,
    feedback: Option<FeedbackSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringSettings {
    accent_mode: Option<String>,
    similarity_threshold: Option<f64>,
    perfect_cutoff: Option<f64>,
    bonus_cutoff: Option<f64>,
    bonus: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedbackSettings {
    max_words: Option<usize>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(scoring) = incoming.scoring {
            if let Some(mode) = scoring.accent_mode
                && let Some(parsed) = AccentMode::from_name(&mode)
            {
                self.accent_mode = parsed;
            }
            if let Some(threshold) = scoring.similarity_threshold
                && (0.0..=100.0).contains(&threshold)
            {
                self.scoring.similarity_threshold = threshold;
            }
            if let Some(cutoff) = scoring.perfect_cutoff
                && (0.0..=100.0).contains(&cutoff)
            {
                self.scoring.perfect_cutoff = cutoff;
            }
            if let Some(cutoff) = scoring.bonus_cutoff
                && (0.0..=100.0).contains(&cutoff)
            {
                self.scoring.bonus_cutoff = cutoff;
            }
            if let Some(bonus) = scoring.bonus
                && bonus >= 0.0
            {
                self.scoring.bonus = bonus;
            }
        }
        if let Some(feedback) = incoming.feedback {
            if let Some(max_words) = feedback.max_words
                && max_words > 0
            {
                self.feedback_max_words = max_words;
            }
            if let Some(model) = feedback.model
                && !model.trim().is_empty()
            {
                self.feedback_model = Some(model);
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr
                && !addr.trim().is_empty()
            {
                self.server_addr = addr;
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".pronunciation-coach-rust"))
        }
    })
}
