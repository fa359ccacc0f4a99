use std::sync::Arc;

use serde_json::{Value, json};

use crate::chat::{self, ChatCompletion};
use crate::error::{EditError, EditResult};
use crate::image_search::ImageSearch;
use crate::types::{
    ChatMessage, CompletionRequest, Role, SEARCH_IMAGE_TOOL, SearchImageArgs, ToolCall, ToolSpec,
    extended_with,
};

/// Sampling temperature for every call; edits should be reproducible.
const TEMPERATURE: f32 = 0.0;

const SYSTEM_PROMPT: &str = r#"You are an assistant embedded in a visual HTML editor. You rewrite a single HTML element in place.

Rules:
1. Respond with ONLY the replacement HTML for the element. No explanation, no markdown, no code fences.
2. Change only what the user asks for. Every other attribute, class, text and style must stay exactly as it is.
3. Only touch styling when asked to. Style changes go inline in the element's style attribute.
4. If the user asks to delete or remove the element, respond with an empty message.
5. If the edit needs a picture, call the search_image tool with a short keyword query and use the returned image_url as the src."#;

/// Where a single edit currently stands. The tool round trip is optional:
/// a reply without a tool call goes straight to `Done`.
#[derive(Debug)]
enum EditState {
    AwaitingFirstCompletion {
        conversation: Vec<ChatMessage>,
    },
    /// `conversation` already ends with the assistant's tool-call record.
    AwaitingToolResult {
        conversation: Vec<ChatMessage>,
        call: ToolCall,
    },
    AwaitingSecondCompletion {
        conversation: Vec<ChatMessage>,
    },
    Done(String),
}

/// Turns an element plus an instruction into replacement markup.
///
/// Holds only shared, immutable collaborator handles, so one instance serves
/// any number of concurrent requests.
#[derive(Clone)]
pub struct Orchestrator {
    chat: Arc<dyn ChatCompletion>,
    image_search: Option<Arc<dyn ImageSearch>>,
}

impl Orchestrator {
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        Self {
            chat,
            image_search: None,
        }
    }

    /// Enables the `search_image` tool.
    pub fn with_image_search(mut self, image_search: Arc<dyn ImageSearch>) -> Self {
        self.image_search = Some(image_search);
        self
    }

    /// Returns the replacement markup, trimmed. An empty string means the
    /// user asked for the element to be deleted.
    pub async fn run(
        &self,
        element_html: &str,
        user_prompt: &str,
        element_css: Option<&Value>,
    ) -> EditResult<String> {
        let mut state = EditState::AwaitingFirstCompletion {
            conversation: initial_conversation(element_html, user_prompt, element_css),
        };

        loop {
            state = match state {
                EditState::AwaitingFirstCompletion { conversation } => {
                    let reply = self
                        .chat
                        .complete(CompletionRequest {
                            messages: conversation.clone(),
                            tools: self.tools(),
                            temperature: TEMPERATURE,
                        })
                        .await?;
                    after_first_completion(conversation, reply)?
                }
                EditState::AwaitingToolResult { conversation, call } => {
                    let tool_message = self.resolve_tool_call(&call).await?;
                    EditState::AwaitingSecondCompletion {
                        conversation: extended_with(&conversation, vec![tool_message]),
                    }
                }
                EditState::AwaitingSecondCompletion { conversation } => {
                    let reply = self
                        .chat
                        .complete(CompletionRequest {
                            messages: conversation,
                            tools: Vec::new(),
                            temperature: TEMPERATURE,
                        })
                        .await?;
                    if !reply.tool_calls.is_empty() {
                        tracing::warn!(
                            tool_calls = reply.tool_calls.len(),
                            "ignoring tool calls in the follow-up completion"
                        );
                    }
                    EditState::Done(final_text(reply.content)?)
                }
                EditState::Done(html) => {
                    tracing::info!(chars = html.len(), "edit complete");
                    return Ok(html);
                }
            };
        }
    }

    fn tools(&self) -> Vec<ToolSpec> {
        match self.image_search {
            Some(_) => vec![ToolSpec::search_image()],
            None => Vec::new(),
        }
    }

    async fn resolve_tool_call(&self, call: &ToolCall) -> EditResult<ChatMessage> {
        if call.function.name != SEARCH_IMAGE_TOOL {
            return Err(EditError::UnsupportedTool(call.function.name.clone()));
        }
        let Some(image_search) = &self.image_search else {
            return Err(EditError::UnsupportedTool(call.function.name.clone()));
        };

        let args: SearchImageArgs = serde_json::from_str(&call.function.arguments)
            .map_err(|e| {
                EditError::MalformedToolArguments(format!("{} in {:?}", e, call.function.arguments))
            })?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(EditError::MalformedToolArguments(
                "search_image called with an empty query".to_string(),
            ));
        }

        tracing::info!(query, "model requested an image");
        let image = image_search
            .search(query)
            .await?
            .ok_or_else(|| EditError::ImageSearchFailed(query.to_string()))?;

        let mut payload = json!({ "query": query, "image_url": image.url });
        if let Some(description) = image.description {
            payload["description"] = json!(description);
        }
        Ok(ChatMessage::tool_result(call.id.clone(), payload.to_string()))
    }
}

fn initial_conversation(
    element_html: &str,
    user_prompt: &str,
    element_css: Option<&Value>,
) -> Vec<ChatMessage> {
    let mut user = format!("Current HTML element:\n{}\n", element_html);
    if let Some(css) = element_css.filter(|css| !css.is_null()) {
        user.push_str(&format!("\nCurrent CSS:\n{}\n", css));
    }
    user.push_str(&format!("\nRequest: {}", user_prompt));

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

fn after_first_completion(
    conversation: Vec<ChatMessage>,
    reply: ChatMessage,
) -> EditResult<EditState> {
    let ChatMessage {
        content, tool_calls, ..
    } = reply;
    let mut calls = tool_calls.into_iter();
    let Some(call) = calls.next() else {
        return Ok(EditState::Done(final_text(content)?));
    };

    let dropped = calls.count();
    if dropped > 0 {
        tracing::warn!(dropped, "model requested several tool calls; only the first is answered");
    }

    // Any text sent alongside the call is superseded by the follow-up answer.
    let record = ChatMessage {
        role: Role::Assistant,
        content,
        tool_calls: vec![call.clone()],
        tool_call_id: None,
    };
    Ok(EditState::AwaitingToolResult {
        conversation: extended_with(&conversation, vec![record]),
        call,
    })
}

fn final_text(content: Option<String>) -> EditResult<String> {
    let content = content.ok_or(EditError::EmptyCompletion {
        service: chat::SERVICE,
    })?;
    Ok(strip_code_fence(&content).to_string())
}

/// Fence labels that may sit directly against the markup on one line.
const MARKUP_LABELS: &[&str] = &["html", "xhtml", "htm", "xml", "svg"];

/// Removes a surrounding Markdown fence such as "```html ... ```".
/// Only a bare language label is dropped; markup on the fence line is kept.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    if let Some((first_line, rest)) = inner.split_once('\n') {
        let label = first_line.trim();
        if label.is_empty() || label.chars().all(|c| c.is_ascii_alphanumeric()) {
            return rest.trim();
        }
    }
    strip_inline_label(inner).trim()
}

// "html<p>X</p>" or "html <p>X</p>": a markup label followed by a tag.
fn strip_inline_label(inner: &str) -> &str {
    for label in MARKUP_LABELS {
        let Some(head) = inner.get(..label.len()) else {
            continue;
        };
        let after = &inner[label.len()..];
        if head.eq_ignore_ascii_case(label) && after.trim_start().starts_with('<') {
            return after;
        }
    }
    inner
}
