use anyhow::{Result, anyhow};
use tracing::info;

use crate::accent::AccentMode;
use crate::feedback::{self, FEEDBACK_TOOL_NAME, FeedbackOptions, WORD_TIP_TOOL_NAME};
use crate::providers::{Provider, ProviderUsage};
use crate::scoring::{self, ScoringResult};
use crate::settings::Settings;

/// Provider-backed analysis pipeline: runs the pure scoring engine, then
/// asks the provider for feedback on the result. Scoring never depends on
/// the provider; a feedback failure surfaces as an error while the caller
/// can still score the same pair through `scoring::evaluate` alone.
#[derive(Debug, Clone)]
pub struct Coach<P: Provider + Clone> {
    provider: P,
    settings: Settings,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub result: ScoringResult,
    pub feedback: String,
    pub focus_words: Vec<String>,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

#[derive(Debug, Clone)]
pub struct WordTipOutput {
    pub tip: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

impl<P: Provider + Clone> Coach<P> {
    pub fn new(provider: P, settings: Settings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn analyze(
        &self,
        reference: &str,
        transcription: &str,
        mode: AccentMode,
    ) -> Result<AnalysisOutput> {
        let result = scoring::evaluate(reference, transcription, mode, &self.settings.scoring);

        let options = FeedbackOptions {
            mode,
            max_words: self.settings.feedback_max_words,
        };
        let tool = feedback::tool_spec(FEEDBACK_TOOL_NAME);
        let system_prompt = feedback::render_feedback_prompt(&options, FEEDBACK_TOOL_NAME)?;
        let user_input = feedback::build_feedback_input(reference, transcription, &result);

        let response = self
            .provider
            .clone()
            .register_tool(tool)
            .append_system_input(system_prompt)
            .append_user_input(user_input)
            .call_tool(FEEDBACK_TOOL_NAME)
            .await?;

        let reply = feedback::parse_feedback_args(response.args)?;
        info!(
            "feedback generated ({} chars, mode {})",
            reply.feedback.len(),
            mode.as_str()
        );

        Ok(AnalysisOutput {
            result,
            feedback: reply.feedback,
            focus_words: reply.focus_words,
            model: response.model,
            usage: response.usage,
        })
    }

    pub async fn word_tip(&self, word: &str) -> Result<WordTipOutput> {
        let word = word.trim();
        if word.is_empty() {
            return Err(anyhow!("word is empty"));
        }
        if word.split_whitespace().count() > 1 {
            return Err(anyhow!("word tips cover a single word (got '{}')", word));
        }

        let tool = feedback::word_tip_tool_spec(WORD_TIP_TOOL_NAME);
        let system_prompt =
            feedback::render_word_tip_prompt(self.settings.feedback_max_words, WORD_TIP_TOOL_NAME)?;

        let response = self
            .provider
            .clone()
            .register_tool(tool)
            .append_system_input(system_prompt)
            .append_user_input(word.to_string())
            .call_tool(WORD_TIP_TOOL_NAME)
            .await?;

        let tip = feedback::parse_word_tip_args(response.args)?;
        Ok(WordTipOutput {
            tip,
            model: response.model,
            usage: response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Provider, ProviderFuture, ProviderResponse, ToolSpec};
    use serde_json::json;

    #[derive(Clone)]
    struct TestProvider {
        response: serde_json::Value,
    }

    impl Provider for TestProvider {
        fn append_system_input(self, _input: String) -> Self {
            self
        }

        fn append_user_input(self, _input: String) -> Self {
            self
        }

        fn register_tool(self, _tool: ToolSpec) -> Self {
            self
        }

        fn call_tool(self, _tool_name: &str) -> ProviderFuture {
            let args = self.response;
            Box::pin(async move {
                Ok(ProviderResponse {
                    args,
                    model: Some("test".to_string()),
                    usage: None,
                })
            })
        }
    }

    fn build_coach(response: serde_json::Value) -> Coach<TestProvider> {
        Coach::new(TestProvider { response }, Settings::default())
    }

    #[tokio::test]
    async fn analysis_pairs_the_score_with_provider_feedback() {
        let coach = build_coach(json!({
            "feedback": "Two words need attention. Keep at it!",
            "focus_words": ["are", "you"]
        }));
        let output = coach
            .analyze("Hello how are you", "hello how you", AccentMode::Strict)
            .await
            .expect("analysis");

        assert_eq!(output.result.total_words, 4);
        assert_eq!(output.result.correct_words, vec!["hello", "how"]);
        assert_eq!(output.feedback, "Two words need attention. Keep at it!");
        assert_eq!(output.focus_words, vec!["are", "you"]);
        assert_eq!(output.model.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn empty_provider_feedback_is_an_error_not_a_fallback() {
        let coach = build_coach(json!({"feedback": "   "}));
        let error = coach
            .analyze("Hello", "hello", AccentMode::Strict)
            .await
            .expect_err("should fail");
        assert!(error.to_string().contains("feedback text is empty"));
    }

    #[tokio::test]
    async fn word_tip_rejects_phrases() {
        let coach = build_coach(json!({"tip": "irrelevant"}));
        assert!(coach.word_tip("hello world").await.is_err());
        assert!(coach.word_tip("   ").await.is_err());

        let tip = coach.word_tip("three").await.expect("tip");
        assert_eq!(tip.tip, "irrelevant");
    }
}
