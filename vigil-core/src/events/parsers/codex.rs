//! Codex exec JSONL parser
//!
//! Normalizes the `codex exec --json` line protocol. Each line is an
//! envelope `{"id": "...", "msg": {"type": "...", ...}}`; the inner `msg`
//! object carries the actual event. Codex reports cumulative token usage in
//! dedicated `token_count` records rather than on message records.

use crate::events::EventParser;
use crate::types::{AgentEvent, AgentEventKind, AgentKind, EventUsage};
use serde::Deserialize;

/// Parser for Codex exec JSONL output.
pub struct CodexEventParser;

impl CodexEventParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CodexEventParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEnvelope {
    msg: Option<RawMsg>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case", default)]
struct RawMsg {
    #[serde(rename = "type")]
    msg_type: Option<String>,
    session_id: Option<String>,
    /// Complete agent message text
    message: Option<String>,
    /// Incremental chunk for delta records
    delta: Option<String>,
    /// Command vector for exec records
    command: Option<Vec<String>>,
    last_agent_message: Option<String>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl EventParser for CodexEventParser {
    fn agent(&self) -> AgentKind {
        AgentKind::Codex
    }

    fn parse_line(&self, line: &str) -> Option<AgentEvent> {
        if line.trim().is_empty() {
            return None;
        }

        let raw_json: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return Some(AgentEvent::plain_text(line)),
        };

        let envelope: RawEnvelope = serde_json::from_value(raw_json.clone()).unwrap_or_default();
        // Missing msg envelope degrades to a default record, not a failure
        let msg = envelope.msg.unwrap_or_default();

        let mut event = match msg.msg_type.as_deref() {
            Some("session_configured") => AgentEvent::of_kind(AgentEventKind::Init),
            Some("agent_message") => {
                let mut event = AgentEvent::of_kind(AgentEventKind::Text);
                event.text = msg.message.clone();
                event
            }
            Some("agent_message_delta") => {
                let mut event = AgentEvent::of_kind(AgentEventKind::Text);
                event.text = msg.delta.clone();
                event.is_partial = true;
                event
            }
            Some("exec_command_begin") => {
                let mut event = AgentEvent::of_kind(AgentEventKind::ToolUse);
                event.tool_name = Some(command_name(msg.command.as_deref()));
                event.tool_state = Some("started".to_string());
                event
            }
            Some("exec_command_end") => {
                let mut event = AgentEvent::of_kind(AgentEventKind::ToolUse);
                event.tool_state = Some("completed".to_string());
                event
            }
            Some("token_count") => {
                let mut event = AgentEvent::of_kind(AgentEventKind::System);
                if msg.input_tokens.is_some() || msg.output_tokens.is_some() {
                    event.usage = Some(EventUsage {
                        input_tokens: msg.input_tokens.unwrap_or(0),
                        output_tokens: msg.output_tokens.unwrap_or(0),
                    });
                }
                event
            }
            Some("task_complete") => {
                let mut event = AgentEvent::of_kind(AgentEventKind::Result);
                event.text = msg.last_agent_message.clone();
                event
            }
            Some("error") => {
                let mut event = AgentEvent::of_kind(AgentEventKind::Error);
                event.text = msg.message.clone();
                event
            }
            // Unknown type, or no type at all
            _ => AgentEvent::of_kind(AgentEventKind::System),
        };

        event.session_id = msg.session_id;
        event.raw = Some(raw_json);
        Some(event)
    }
}

/// First word of the exec command, "shell" when no command was recorded.
fn command_name(command: Option<&[String]>) -> String {
    command
        .and_then(|c| c.first())
        .cloned()
        .unwrap_or_else(|| "shell".to_string())
}
