use serde::{Deserialize, Serialize};

use crate::scoring::WordComparison;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct AnalyzeRequest {
    pub(crate) reference: Option<String>,
    pub(crate) transcription: Option<String>,
    pub(crate) mode: Option<String>,
    pub(crate) ai_feedback: Option<bool>,
    pub(crate) detailed: Option<bool>,
    pub(crate) model: Option<String>,
    pub(crate) key: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeResponse {
    pub(crate) score: f64,
    pub(crate) total_words: usize,
    pub(crate) spoken_words: usize,
    pub(crate) correct_words: Vec<String>,
    pub(crate) incorrect_words: Vec<WordComparison>,
    pub(crate) mode: String,
    pub(crate) feedback: String,
    pub(crate) feedback_source: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) focus_words: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) model: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
