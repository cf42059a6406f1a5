use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use super::retry::{
    TRANSIENT_BASE_DELAY, TRANSIENT_MAX_ATTEMPTS, is_transient, retry_after, wait_with_backoff,
};
use super::{
    Message, MessageRole, Provider, ProviderFuture, ProviderResponse, ProviderUsage, ToolSpec,
};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub(crate) const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Gemini {
    key: String,
    model: String,
    messages: Vec<Message>,
    tools: Vec<ToolSpec>,
}

impl Gemini {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            tools: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    fn find_tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

impl Provider for Gemini {
    fn append_system_input(mut self, input: String) -> Self {
        self.messages.push(Message::system(input));
        self
    }

    fn append_user_input(mut self, input: String) -> Self {
        self.messages.push(Message::user(input));
        self
    }

    fn register_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    fn call_tool(self, tool_name: &str) -> ProviderFuture {
        let tool_name = tool_name.to_string();
        Box::pin(async move {
            let tool = self
                .find_tool(&tool_name)
                .cloned()
                .ok_or_else(|| anyhow!("tool '{}' not registered", tool_name))?;
            let client = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .with_context(|| "failed to build HTTP client")?;
            let url = format!("{}/{}:generateContent", BASE_URL, self.model);

            let (system_inputs, user_inputs): (Vec<Message>, Vec<Message>) = self
                .messages
                .into_iter()
                .partition(|message| matches!(message.role, MessageRole::System));

            let system_instruction = system_inputs
                .into_iter()
                .map(|message| message.content)
                .collect::<Vec<_>>()
                .join("\n\n");

            let contents = user_inputs
                .into_iter()
                .map(|message| {
                    json!({
                        "role": "user",
                        "parts": [{"text": message.content}]
                    })
                })
                .collect::<Vec<_>>();

            let body = json!({
                "contents": contents,
                "systemInstruction": if system_instruction.trim().is_empty() { Value::Null } else { json!({"parts": [{"text": system_instruction}]}) },
                "tools": [
                    {
                        "function_declarations": [
                            {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.parameters
                            }
                        ]
                    }
                ],
                "tool_config": {
                    "function_calling_config": {
                        "mode": "ANY",
                        "allowed_function_names": [tool.name]
                    }
                }
            });

            let mut attempt = 0usize;
            let mut delay = TRANSIENT_BASE_DELAY;
            loop {
                attempt += 1;
                let response = match client
                    .post(&url)
                    .header("x-goog-api-key", self.key.clone())
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(response) => response,
                    Err(_) if attempt < TRANSIENT_MAX_ATTEMPTS => {
                        delay = wait_with_backoff("Gemini", attempt, delay, None).await;
                        continue;
                    }
                    Err(err) => {
                        return Err(err).with_context(|| "Gemini request failed");
                    }
                };

                let status = response.status();
                let retry_after = retry_after(response.headers());
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    return extract_tool_response(&text, &tool_name, &self.model);
                }
                if is_transient(status, &text) && attempt < TRANSIENT_MAX_ATTEMPTS {
                    delay = wait_with_backoff("Gemini", attempt, delay, retry_after).await;
                    continue;
                }
                return Err(anyhow!(
                    "Gemini API error ({}): {}",
                    status,
                    extract_gemini_error(&text).unwrap_or(text)
                ));
            }
        })
    }
}

fn extract_tool_response(
    text: &str,
    tool_name: &str,
    fallback_model: &str,
) -> Result<ProviderResponse, anyhow::Error> {
    let payload: GeminiResponse = serde_json::from_str(text)
        .map_err(|err| anyhow!("failed to parse Gemini response JSON: {}", err))?;
    let candidate = payload
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .ok_or_else(|| anyhow!("no candidate returned from Gemini"))?;

    for part in &candidate.parts {
        if let Some(function_call) = &part.function_call
            && function_call.name == tool_name
        {
            let model = payload
                .model_version
                .filter(|value| !value.trim().is_empty())
                .or_else(|| Some(fallback_model.to_string()));
            let usage = payload.usage_metadata.map(|usage| ProviderUsage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            });
            return Ok(ProviderResponse {
                args: function_call.args.clone(),
                model,
                usage,
            });
        }
    }

    Err(anyhow!("no tool call returned from Gemini"))
}

fn extract_gemini_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GeminiError>,
    }

    #[derive(Deserialize)]
    struct GeminiError {
        message: Option<String>,
        status: Option<String>,
        code: Option<i32>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(
        error.message,
        error.status,
        error.code.map(|value| value.to_string()),
    ))
}

fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let mut parts = Vec::new();
    if let Some(message) = message
        && !message.trim().is_empty()
    {
        parts.push(message);
    }
    if let Some(kind) = kind
        && !kind.trim().is_empty()
    {
        parts.push(format!("type: {}", kind));
    }
    if let Some(code) = code
        && !code.trim().is_empty()
    {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
    #[serde(rename = "modelVersion")]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u64>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u64>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[cfg(test)]
mod tests {
    use super::extract_tool_response;

    #[test]
    fn extracts_feedback_tool_args() {
        let payload = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/gemini_tool_response.json"
        ));
        let response = extract_tool_response(payload, "deliver_feedback", "gemini-1.5-flash")
            .expect("tool response");
        assert_eq!(
            response.args["feedback"].as_str().unwrap(),
            "Great work! Your sentence was clear. Practice the word 'three': touch your tongue to your teeth for the opening sound. Keep going, you are close."
        );
        assert_eq!(response.args["focus_words"][0].as_str().unwrap(), "three");
        assert_eq!(response.model.as_deref(), Some("gemini-1.5-flash-002"));
        let usage = response.usage.expect("usage");
        assert_eq!(usage.prompt_tokens, Some(412));
        assert_eq!(usage.completion_tokens, Some(58));
        assert_eq!(usage.total_tokens, Some(470));
    }

    #[test]
    fn missing_tool_call_is_an_error() {
        let payload = r#"{"candidates": [{"content": {"parts": [{"text": "plain text"}]}}]}"#;
        let error = extract_tool_response(payload, "deliver_feedback", "gemini-1.5-flash")
            .expect_err("should fail");
        assert!(error.to_string().contains("no tool call"));
    }

    #[test]
    fn fallback_model_fills_a_missing_model_version() {
        let payload = r#"{
            "candidates": [
                {"content": {"parts": [{"functionCall": {"name": "deliver_feedback", "args": {"feedback": "ok"}}}]}}
            ]
        }"#;
        let response = extract_tool_response(payload, "deliver_feedback", "gemini-1.5-flash")
            .expect("tool response");
        assert_eq!(response.model.as_deref(), Some("gemini-1.5-flash"));
        assert!(response.usage.is_none());
    }
}
