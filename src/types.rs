use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Name of the one tool the model may call.
pub const SEARCH_IMAGE_TOOL: &str = "search_image";

/// Body of `POST /api/edit-with-ai`, as sent by the editor frontend.
///
/// Fields are optional here so that a missing field becomes an
/// `InvalidRequest` with a readable message instead of a serde rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub element_html: Option<String>,
    pub user_prompt: Option<String>,
    /// Computed styles of the element, forwarded verbatim into the prompt.
    #[serde(default)]
    pub element_css: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    pub modified_html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

/// A message in the conversation sent to the chat completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

// Some providers send `"tool_calls": null` rather than omitting the field.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ToolCall>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ToolCall>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Returns a new conversation with `extra` appended; the original is left as sent.
pub fn extended_with(conversation: &[ChatMessage], extra: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let mut next = Vec::with_capacity(conversation.len() + extra.len());
    next.extend_from_slice(conversation);
    next.extend(extra);
    next
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON string, exactly as the model produced it.
    pub arguments: String,
}

/// Parsed arguments of a `search_image` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchImageArgs {
    pub query: String,
}

/// Function schema declared to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: Value,
}

impl ToolSpec {
    pub fn search_image() -> Self {
        Self {
            kind: "function",
            function: json!({
                "name": SEARCH_IMAGE_TOOL,
                "description": "Search for a stock photo matching a short description and return its URL.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "A few keywords describing the image, e.g. \"sunset over the sea\"."
                        }
                    },
                    "required": ["query"]
                }
            }),
        }
    }
}

/// One call to the chat completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageResult {
    pub url: String,
    pub description: Option<String>,
}
