//! Claude Code stream-json parser
//!
//! Normalizes the `--output-format stream-json` line protocol emitted by the
//! Claude Code CLI. One JSON record per line; the `type` field discriminates
//! records and `message.content` carries either a plain string or an array
//! of typed blocks.
//!
//! # Error Handling
//!
//! - **Malformed JSON lines**: not an error. The line is wrapped as a `Text`
//!   event whose text equals the raw line, with `raw` omitted.
//! - **Missing `type` discriminator**: the record maps to a `System` event.
//! - **Absent `message` sub-object**: derived fields fall back to defaults
//!   rather than failing.

use crate::events::EventParser;
use crate::types::{AgentEvent, AgentEventKind, AgentKind, EventUsage};
use serde::Deserialize;

/// Parser for Claude Code stream-json output.
pub struct ClaudeEventParser;

impl ClaudeEventParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClaudeEventParser {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================
// Raw record types (serde deserialization)
// ============================================

/// One line of stream-json output.
///
/// Uses `#[serde(default)]` liberally so that missing fields degrade to
/// defaults instead of failing the whole record.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case", default)]
struct RawRecord {
    #[serde(rename = "type")]
    record_type: Option<String>,
    subtype: Option<String>,
    session_id: Option<String>,
    message: Option<RawMessage>,
    /// Result text for `result` records
    result: Option<String>,
    is_error: Option<bool>,
    usage: Option<RawUsage>,
    /// Streaming payload for `stream_event` records
    event: Option<RawStreamEvent>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    content: Option<RawContent>,
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { name: String },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl RawUsage {
    fn to_event_usage(&self) -> Option<EventUsage> {
        // Absent fields mean "no usage reported", which is distinct from zero
        if self.input_tokens.is_none() && self.output_tokens.is_none() {
            return None;
        }
        Some(EventUsage {
            input_tokens: self.input_tokens.unwrap_or(0),
            output_tokens: self.output_tokens.unwrap_or(0),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawStreamEvent {
    delta: Option<RawDelta>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDelta {
    text: Option<String>,
}

impl EventParser for ClaudeEventParser {
    fn agent(&self) -> AgentKind {
        AgentKind::Claude
    }

    fn parse_line(&self, line: &str) -> Option<AgentEvent> {
        if line.trim().is_empty() {
            return None;
        }

        let raw_json: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return Some(AgentEvent::plain_text(line)),
        };

        // Structured but unexpected shapes still degrade to defaults
        let record: RawRecord = serde_json::from_value(raw_json.clone()).unwrap_or_default();

        let mut event = match record.record_type.as_deref() {
            Some("system") => {
                let kind = if record.subtype.as_deref() == Some("init") {
                    AgentEventKind::Init
                } else {
                    AgentEventKind::System
                };
                AgentEvent::of_kind(kind)
            }
            Some("assistant") => {
                let mut event = assistant_event(record.message.as_ref());
                if event.usage.is_none() {
                    event.usage = record.usage.as_ref().and_then(RawUsage::to_event_usage);
                }
                event
            }
            Some("user") => user_event(record.message.as_ref()),
            Some("stream_event") => {
                let mut event = AgentEvent::of_kind(AgentEventKind::Text);
                event.text = record
                    .event
                    .and_then(|e| e.delta)
                    .and_then(|d| d.text)
                    .or(Some(String::new()));
                event.is_partial = true;
                event
            }
            Some("result") => {
                let kind = if record.is_error.unwrap_or(false) {
                    AgentEventKind::Error
                } else {
                    AgentEventKind::Result
                };
                let mut event = AgentEvent::of_kind(kind);
                event.text = record.result;
                event.usage = record.usage.as_ref().and_then(RawUsage::to_event_usage);
                event
            }
            // Unknown type, or no type at all
            _ => AgentEvent::of_kind(AgentEventKind::System),
        };

        event.session_id = record.session_id;
        event.raw = Some(raw_json);
        Some(event)
    }

    fn extract_slash_commands(&self, event: &AgentEvent) -> Option<Vec<String>> {
        // Only init records advertise the command list
        if event.kind != AgentEventKind::Init {
            return None;
        }
        let raw = event.raw.as_ref()?;
        let commands = raw.get("slash_commands")?.as_array()?;
        Some(
            commands
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        )
    }
}

/// Build an event from an assistant record's message content.
///
/// A message carrying any `tool_use` block becomes a `ToolUse` event;
/// otherwise the text blocks are concatenated into a `Text` event.
fn assistant_event(message: Option<&RawMessage>) -> AgentEvent {
    let Some(message) = message else {
        return AgentEvent::of_kind(AgentEventKind::Text);
    };

    let mut event = AgentEvent::of_kind(AgentEventKind::Text);
    event.usage = message.usage.as_ref().and_then(RawUsage::to_event_usage);

    match message.content.as_ref() {
        Some(RawContent::Text(text)) => {
            event.text = Some(text.clone());
        }
        Some(RawContent::Blocks(blocks)) => {
            let mut texts: Vec<&str> = Vec::new();
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => texts.push(text),
                    ContentBlock::ToolUse { name } => {
                        event.kind = AgentEventKind::ToolUse;
                        event.tool_name = Some(name.clone());
                        event.tool_state = Some("started".to_string());
                    }
                    _ => {}
                }
            }
            if !texts.is_empty() {
                event.text = Some(texts.join(""));
            }
        }
        None => {}
    }

    event
}

/// User records mostly carry tool results back to the agent.
fn user_event(message: Option<&RawMessage>) -> AgentEvent {
    let blocks = match message.and_then(|m| m.content.as_ref()) {
        Some(RawContent::Blocks(blocks)) => blocks,
        _ => return AgentEvent::of_kind(AgentEventKind::System),
    };

    for block in blocks {
        if let ContentBlock::ToolResult { is_error } = block {
            let mut event = AgentEvent::of_kind(if *is_error {
                AgentEventKind::Error
            } else {
                AgentEventKind::ToolUse
            });
            event.tool_state = Some("completed".to_string());
            return event;
        }
    }

    AgentEvent::of_kind(AgentEventKind::System)
}
