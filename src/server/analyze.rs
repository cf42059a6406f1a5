use crate::coach::Coach;
use crate::feedback;
use crate::providers;
use crate::scoring;

use super::models::{AnalyzeRequest, AnalyzeResponse};
use super::state::ServerState;

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: axum::http::StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: axum::http::StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: axum::http::StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

pub(crate) async fn analyze_request(
    state: &ServerState,
    request: AnalyzeRequest,
) -> Result<AnalyzeResponse, ServerError> {
    let settings = state.settings.clone();
    let mode = crate::resolve_mode(request.mode.as_deref(), &settings)
        .map_err(|err| ServerError::bad_request(err.to_string()))?;

    // Absent fields degrade to the defined empty-reference edge case
    // instead of an error.
    let reference = request.reference.unwrap_or_default();
    let transcription = request.transcription.unwrap_or_default();
    let ai_feedback = request.ai_feedback.unwrap_or(false);

    if !ai_feedback {
        let result = scoring::evaluate(&reference, &transcription, mode, &settings.scoring);
        let feedback_text = if request.detailed.unwrap_or(false) {
            feedback::detailed_feedback(&result)
        } else {
            feedback::dynamic_feedback(&result)
        };
        return Ok(build_response(result, mode, feedback_text, "template", Vec::new(), None));
    }

    let model_arg = request.model.clone().or_else(|| settings.feedback_model.clone());
    let selection =
        providers::resolve_provider_selection(model_arg.as_deref(), request.key.as_deref())
            .map_err(|err| ServerError::bad_request(err.to_string()))?;
    let key = providers::resolve_key(selection.provider, request.key.as_deref())
        .map_err(|err| ServerError::bad_request(err.to_string()))?;
    let provider = providers::build_provider(
        selection.provider,
        key,
        selection.requested_model.as_deref(),
    );

    let coach = Coach::new(provider, settings);
    // No canned fallback here: a provider failure is reported as a failure.
    let output = coach
        .analyze(&reference, &transcription, mode)
        .await
        .map_err(|err| ServerError::bad_gateway(format!("feedback generation failed: {}", err)))?;

    Ok(build_response(
        output.result,
        mode,
        output.feedback,
        "ai",
        output.focus_words,
        output.model,
    ))
}

fn build_response(
    result: scoring::ScoringResult,
    mode: crate::accent::AccentMode,
    feedback: String,
    feedback_source: &str,
    focus_words: Vec<String>,
    model: Option<String>,
) -> AnalyzeResponse {
    AnalyzeResponse {
        score: result.score,
        total_words: result.total_words,
        spoken_words: result.spoken_words,
        correct_words: result.correct_words,
        incorrect_words: result.incorrect_words,
        mode: mode.as_str().to_string(),
        feedback,
        feedback_source: feedback_source.to_string(),
        focus_words,
        model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn build_state() -> ServerState {
        ServerState {
            settings: Settings::default(),
        }
    }

    #[tokio::test]
    async fn template_analysis_round_trip() {
        let request = AnalyzeRequest {
            reference: Some("Hello how are you".to_string()),
            transcription: Some("hello how you".to_string()),
            mode: Some("strict".to_string()),
            ..AnalyzeRequest::default()
        };
        let response = analyze_request(&build_state(), request)
            .await
            .expect("response");

        assert_eq!(response.score, 50.0);
        assert_eq!(response.total_words, 4);
        assert_eq!(response.spoken_words, 3);
        assert_eq!(response.correct_words, vec!["hello", "how"]);
        assert_eq!(response.incorrect_words.len(), 2);
        assert_eq!(response.mode, "strict");
        assert_eq!(response.feedback_source, "template");
        assert!(!response.feedback.is_empty());
        assert!(response.model.is_none());

        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["incorrect_words"][1]["actual"], "(not spoken)");
        assert!(value.get("model").is_none());
    }

    #[tokio::test]
    async fn missing_fields_degrade_to_the_empty_edge_case() {
        let response = analyze_request(&build_state(), AnalyzeRequest::default())
            .await
            .expect("response");
        assert_eq!(response.score, 0.0);
        assert_eq!(response.total_words, 0);
        assert!(response.correct_words.is_empty());
        assert!(response.incorrect_words.is_empty());
        // Settings default picks the accent mode when the request omits it.
        assert_eq!(response.mode, "tolerant");
    }

    #[tokio::test]
    async fn invalid_mode_is_a_bad_request() {
        let request = AnalyzeRequest {
            reference: Some("Hello".to_string()),
            transcription: Some("hello".to_string()),
            mode: Some("native".to_string()),
            ..AnalyzeRequest::default()
        };
        let error = analyze_request(&build_state(), request)
            .await
            .expect_err("should fail");
        assert_eq!(error.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(error.message.contains("invalid accent mode"));
    }

    #[tokio::test]
    async fn detailed_template_feedback_is_multiline() {
        let request = AnalyzeRequest {
            reference: Some("Hello how are you".to_string()),
            transcription: Some("hello how you".to_string()),
            detailed: Some(true),
            ..AnalyzeRequest::default()
        };
        let response = analyze_request(&build_state(), request)
            .await
            .expect("response");
        assert!(response.feedback.contains("Words needing practice"));
    }
}
