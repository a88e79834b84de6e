use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use dr_core::{
    CompletionRequest, CompletionResponse, Error, FinishReason, Message, Provider, Role, ToolCall,
    ToolDefinition, Usage,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: Option<String>,
}

impl GeminiProvider {
    /// Create a provider. An empty key is a configuration error, reported up front.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(api_key, Duration::from_secs(150))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config("GEMINI_API_KEY not set"));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: None,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    fn resolve_model(&self, request: &CompletionRequest) -> String {
        request
            .model
            .clone()
            .or_else(|| self.default_model.clone())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string())
    }

    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let mut system_parts: Vec<GeminiPart> = Vec::new();
        let mut contents: Vec<GeminiContent> = Vec::new();

        for msg in &request.messages {
            let text = msg.content.as_text().to_string();
            match msg.role {
                Role::System => {
                    if !text.is_empty() {
                        system_parts.push(GeminiPart::Text { text });
                    }
                }
                Role::User => {
                    contents.push(GeminiContent::new("user", vec![GeminiPart::Text { text }]));
                }
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !text.is_empty() {
                        parts.push(GeminiPart::Text { text });
                    }
                    parts.extend(msg.tool_calls.iter().map(|tc| GeminiPart::FunctionCall {
                        function_call: GeminiFunctionCall {
                            name: tc.name.clone(),
                            args: tc.arguments.clone(),
                        },
                    }));
                    contents.push(GeminiContent::new("model", parts));
                }
                Role::Tool => {
                    // Function responses travel in user turns, keyed by function name.
                    let tool_call_id = msg.tool_call_id.clone().unwrap_or_default();
                    let name = find_function_name_by_id(&request.messages, &tool_call_id)
                        .unwrap_or_else(|| format!("unknown_{}", tool_call_id));
                    contents.push(GeminiContent::new(
                        "user",
                        vec![GeminiPart::FunctionResponse {
                            function_response: GeminiFunctionResponse {
                                name,
                                response: serde_json::json!({ "result": text }),
                            },
                        }],
                    ));
                }
            }
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiToolsEntry {
                function_declarations: request.tools.iter().map(convert_tool).collect(),
            }])
        };

        GeminiRequest {
            contents: merge_adjacent_contents(contents),
            system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
                role: None,
                parts: system_parts,
            }),
            tools,
            generation_config: Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            }),
        }
    }

    fn parse_response(&self, response: GeminiResponse, model: &str) -> Result<CompletionResponse, Error> {
        let candidate = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| {
                match response.prompt_feedback.and_then(|f| f.block_reason) {
                    Some(reason) => Error::api(400, format!("Blocked by safety filter: {}", reason)),
                    None => Error::api(500, "No candidates in Gemini response"),
                }
            })?;

        let mut content_text = String::new();
        let mut tool_calls = Vec::new();

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            match part {
                GeminiPart::Text { text } => {
                    if !content_text.is_empty() {
                        content_text.push('\n');
                    }
                    content_text.push_str(&text);
                }
                GeminiPart::FunctionCall { function_call } => {
                    let id = format!("gemini_tc_{}", tool_calls.len());
                    tool_calls.push(ToolCall::new(id, function_call.name, function_call.args));
                }
                GeminiPart::FunctionResponse { .. } => {}
            }
        }

        let finish_reason = if !tool_calls.is_empty() {
            FinishReason::ToolCalls
        } else {
            match candidate.finish_reason.as_deref() {
                Some("MAX_TOKENS") => FinishReason::Length,
                Some("SAFETY") | Some("RECITATION") => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            }
        };

        let message = if tool_calls.is_empty() {
            Message::assistant(content_text)
        } else {
            Message::assistant_with_tool_calls(content_text, tool_calls)
        };

        let usage = response
            .usage_metadata
            .map(|u| {
                Usage::new(
                    u.prompt_token_count.unwrap_or(0),
                    u.candidates_token_count.unwrap_or(0),
                )
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            message,
            usage,
            model: model.to_string(),
            finish_reason,
        })
    }

    fn parse_error(&self, status: u16, body: &str) -> Error {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: ErrorDetail,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            message: String,
        }

        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            401 | 403 => Error::auth(message),
            429 => Error::rate_limit(message),
            400 => Error::invalid_request(message),
            _ => Error::api(status, message),
        }
    }
}

fn convert_tool(tool: &ToolDefinition) -> GeminiFunctionDeclaration {
    GeminiFunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: serde_json::to_value(&tool.parameters).unwrap_or_default(),
    }
}

/// Find the function name for a given tool_call_id by searching previous messages
fn find_function_name_by_id(messages: &[Message], tool_call_id: &str) -> Option<String> {
    messages
        .iter()
        .flat_map(|m| m.tool_calls.iter())
        .find(|tc| tc.id == tool_call_id)
        .map(|tc| tc.name.clone())
}

/// Merge adjacent contents with the same role
fn merge_adjacent_contents(contents: Vec<GeminiContent>) -> Vec<GeminiContent> {
    let mut merged: Vec<GeminiContent> = Vec::new();

    for content in contents {
        if let Some(last) = merged.last_mut() {
            if last.role == content.role {
                last.parts.extend(content.parts);
                continue;
            }
        }
        merged.push(content);
    }

    merged
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let model = self.resolve_model(&request);
        let api_request = self.build_request(&request);

        debug!(
            model = %model,
            content_count = api_request.contents.len(),
            has_tools = api_request.tools.is_some(),
            "Gemini request"
        );
        trace!(request = %serde_json::to_string(&api_request).unwrap_or_default(), "Gemini request payload");

        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(e.to_string())
                } else {
                    Error::network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %error_text, "Gemini request failed");
            return Err(self.parse_error(status.as_u16(), &error_text));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        trace!(response = %response_text, "Gemini response payload");

        let api_response: GeminiResponse = serde_json::from_str(&response_text)?;
        let parsed = self.parse_response(api_response, &model)?;

        debug!(
            model = %parsed.model,
            finish_reason = ?parsed.finish_reason,
            content_len = parsed.message.content.as_text().len(),
            tool_calls = parsed.message.tool_calls.len(),
            prompt_tokens = parsed.usage.prompt_tokens,
            completion_tokens = parsed.usage.completion_tokens,
            "Gemini response"
        );

        Ok(parsed)
    }
}

// ── Gemini API types ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiToolsEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn new(role: &str, parts: Vec<GeminiPart>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolsEntry {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider::new("test-key").unwrap()
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = GeminiProvider::new("  ").err().unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_provider_defaults() {
        let provider = provider();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.default_model(), None);
        let request = CompletionRequest::new(vec![Message::user("Hello")]);
        assert_eq!(provider.resolve_model(&request), "gemini-2.5-pro");
    }

    #[test]
    fn test_resolve_model_precedence() {
        let provider = provider()
            .with_default_model("gemini-2.5-flash")
            .with_base_url("https://proxy.local/v1beta/");
        assert_eq!(provider.base_url, "https://proxy.local/v1beta");

        let request = CompletionRequest::new(vec![Message::user("Hello")]);
        assert_eq!(provider.resolve_model(&request), "gemini-2.5-flash");

        let request = request.with_model("gemini-2.0-flash");
        assert_eq!(provider.resolve_model(&request), "gemini-2.0-flash");
    }

    #[test]
    fn test_build_request_system_instruction() {
        let request = CompletionRequest::new(vec![
            Message::system("You are a researcher."),
            Message::user("Hello"),
        ])
        .with_temperature(0.3)
        .with_max_tokens(6000);
        let api_request = provider().build_request(&request);

        let sys = api_request.system_instruction.as_ref().unwrap();
        assert!(sys.role.is_none());
        assert_eq!(api_request.contents.len(), 1);
        assert_eq!(api_request.contents[0].role.as_deref(), Some("user"));

        let json = serde_json::to_value(&api_request).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 6000);
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_build_request_tool_round_trip() {
        let messages = vec![
            Message::user("Research rust"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("gemini_tc_0", "linkup_search", serde_json::json!({"query": "rust"}))],
            ),
            Message::tool_result("gemini_tc_0", "Search 1/8 ..."),
        ];
        let request = CompletionRequest::new(messages)
            .with_tools(vec![ToolDefinition::new("linkup_search", "Search the web")]);
        let api_request = provider().build_request(&request);

        assert_eq!(api_request.contents.len(), 3);
        assert_eq!(api_request.contents[1].role.as_deref(), Some("model"));
        let json = serde_json::to_value(&api_request.contents[2]).unwrap();
        assert_eq!(json["parts"][0]["functionResponse"]["name"], "linkup_search");

        let tools = api_request.tools.unwrap();
        assert_eq!(tools[0].function_declarations[0].name, "linkup_search");
    }

    #[test]
    fn test_parse_response_text_and_usage() {
        let body = r#"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Report"}]}, "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
        }"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        let parsed = provider().parse_response(response, "gemini-2.5-pro").unwrap();

        assert_eq!(parsed.message.content.as_text(), "Report");
        assert_eq!(parsed.finish_reason, FinishReason::Stop);
        assert_eq!(parsed.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_function_call() {
        let body = r#"{
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "linkup_search", "args": {"query": "rust", "focus": "academic"}}}
            ]}, "finishReason": "STOP"}]
        }"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        let parsed = provider().parse_response(response, "gemini-2.5-pro").unwrap();

        assert_eq!(parsed.finish_reason, FinishReason::ToolCalls);
        let call = &parsed.message.tool_calls[0];
        assert_eq!(call.id, "gemini_tc_0");
        assert_eq!(call.arguments["focus"], "academic");
    }

    #[test]
    fn test_parse_response_blocked() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        let err = provider().parse_response(response, "gemini-2.5-pro").unwrap_err();
        assert!(err.to_string().contains("safety filter"));
    }

    #[test]
    fn test_parse_error_mapping() {
        let provider = provider();
        let body = r#"{"error": {"message": "API key not valid", "status": "PERMISSION_DENIED"}}"#;
        assert!(provider.parse_error(403, body).is_auth_error());

        let body = r#"{"error": {"message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(provider.parse_error(429, body).is_rate_limited());

        let body = r#"{"error": {"message": "The model is overloaded. Please try again later.", "status": "UNAVAILABLE"}}"#;
        let err = provider.parse_error(503, body);
        assert!(err.is_rate_limited());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_merge_adjacent_contents() {
        let contents = vec![
            GeminiContent::new("user", vec![GeminiPart::Text { text: "a".into() }]),
            GeminiContent::new("user", vec![GeminiPart::Text { text: "b".into() }]),
            GeminiContent::new("model", vec![GeminiPart::Text { text: "c".into() }]),
        ];
        let merged = merge_adjacent_contents(contents);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].parts.len(), 2);
    }
}
