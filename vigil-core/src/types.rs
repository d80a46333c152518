//! Core domain types for vigil
//!
//! These types form the canonical model that normalizes activity from the
//! supported agent CLIs and the telemetry the supervisor records about them.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Agent** | An external coding-agent CLI whose output we supervise (Claude Code, Codex, plain terminal) |
//! | **Transcript** | An append-only JSONL file recording one agent conversation |
//! | **Session** | One transcript file; identity is derived from the filename |
//! | **Overlay** | User-assigned labels (name, star, origin) kept outside the transcript |
//! | **Query event** | One completed interactive or automated query, persisted in the telemetry store |
//! | **Auto Run** | Batch execution of tasks from a task document, tracked separately from ad hoc queries |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Agents
// ============================================

/// Supported agent CLIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Claude,
    Codex,
    /// A plain terminal pane; produces transcripts but is not backed by an LLM.
    Terminal,
}

impl AgentKind {
    /// Returns the display name for this agent
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Claude => "Claude Code",
            AgentKind::Codex => "Codex",
            AgentKind::Terminal => "Terminal",
        }
    }

    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Codex => "codex",
            AgentKind::Terminal => "terminal",
        }
    }

    /// Default context-window capacity in tokens, used when a session
    /// reports no window of its own. Zero means "no window exists".
    pub fn default_context_window(&self) -> u64 {
        match self {
            AgentKind::Claude => 200_000,
            AgentKind::Codex => 200_000,
            AgentKind::Terminal => 0,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" | "Claude" => Ok(AgentKind::Claude),
            "codex" | "Codex" => Ok(AgentKind::Codex),
            "terminal" | "Terminal" => Ok(AgentKind::Terminal),
            _ => Err(format!("unknown agent kind: {}", s)),
        }
    }
}

// ============================================
// Normalized events
// ============================================

/// Classification of a normalized output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentEventKind {
    /// Session initialization (carries the session id in most formats)
    Init,
    /// Streamed or complete text output
    Text,
    /// Tool invocation
    ToolUse,
    /// Terminal result record for a query
    Result,
    /// Error reported by the agent
    Error,
    /// Anything the format does not classify
    System,
}

/// Token usage attached to a single event.
///
/// Absence of usage is meaningful: a zero-valued usage is a real observation,
/// while `None` means the record carried no usage fields at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Canonical normalized unit emitted by a line parser.
///
/// `raw` preserves the decoded payload for consumers that need fields the
/// normalizer does not model. It is omitted when the line was not valid
/// JSON (the line itself is then carried in `text`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEvent {
    pub kind: AgentEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// True for incremental/streaming text chunks
    #[serde(default)]
    pub is_partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<EventUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl AgentEvent {
    /// A bare event of the given kind with every optional field unset.
    pub fn of_kind(kind: AgentEventKind) -> Self {
        Self {
            kind,
            session_id: None,
            text: None,
            is_partial: false,
            tool_name: None,
            tool_state: None,
            usage: None,
            raw: None,
        }
    }

    /// Fallback for lines that are not valid JSON: the raw line becomes the
    /// text payload and `raw` stays empty.
    pub fn plain_text(line: &str) -> Self {
        let mut event = Self::of_kind(AgentEventKind::Text);
        event.text = Some(line.to_string());
        event
    }
}

// ============================================
// Sessions
// ============================================

/// How a session was started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// Started interactively by a person
    #[default]
    User,
    /// Started by an Auto Run batch
    Auto,
}

impl SessionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOrigin::User => "user",
            SessionOrigin::Auto => "auto",
        }
    }
}

impl std::str::FromStr for SessionOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SessionOrigin::User),
            "auto" => Ok(SessionOrigin::Auto),
            _ => Err(format!("unknown session origin: {}", s)),
        }
    }
}

/// Normalized overlay record for one session.
///
/// The overlay store persists these in two historical shapes (a bare origin
/// string and a labeled object); both are normalized into this struct at the
/// read boundary and the raw shapes never travel further.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLabels {
    pub origin: SessionOrigin,
    pub session_name: Option<String>,
    pub starred: Option<bool>,
}

/// Summary of one transcript file, with derived statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Stable id derived from the transcript filename
    pub session_id: String,
    /// Project directory the session belongs to
    pub project_path: String,
    /// Truncated preview of the first user message, if one was found
    /// within the scan bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    /// Exact count of structurally valid records in the transcript
    pub message_count: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    /// Derived from token counts and the configured pricing rates
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Span between the earliest and latest observed timestamps, in seconds
    pub duration_seconds: u64,
    pub origin: SessionOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
}

// ============================================
// Usage aggregates
// ============================================

/// Raw token counters, either per model or top-level for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

impl TokenCounts {
    /// True when every counter is zero.
    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0
            && self.output_tokens == 0
            && self.cache_read_tokens == 0
            && self.cache_creation_tokens == 0
    }
}

/// Per-model usage as reported by a session, with the model's window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
    /// Token capacity of the model, 0 if unknown
    pub context_window: u64,
}

/// Normalized usage aggregate for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub total_cost_usd: f64,
    /// Token capacity of the largest model involved, 0 if unknown
    pub context_window: u64,
}

// ============================================
// Query events (telemetry store)
// ============================================

/// Whether a query was issued by a person or by an Auto Run batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySource {
    User,
    Auto,
}

impl QuerySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuerySource::User => "user",
            QuerySource::Auto => "auto",
        }
    }
}

impl std::str::FromStr for QuerySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(QuerySource::User),
            "auto" => Ok(QuerySource::Auto),
            _ => Err(format!("unknown query source: {}", s)),
        }
    }
}

/// One completed interactive or automated query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEvent {
    /// Generated unique id
    pub id: String,
    pub session_id: String,
    pub agent_type: AgentKind,
    pub source: QuerySource,
    /// Epoch milliseconds
    pub start_time: i64,
    /// Milliseconds; zero is valid (cached/instant responses)
    pub duration: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_remote: Option<bool>,
}

/// Time window for store queries, anchored at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeRange {
    /// Lower bound on `start_time` in epoch milliseconds, or `None` for
    /// an unbounded query.
    pub fn start_bound_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        let days = match self {
            TimeRange::Day => 1,
            TimeRange::Week => 7,
            TimeRange::Month => 30,
            TimeRange::Year => 365,
            TimeRange::All => return None,
        };
        Some((now - chrono::Duration::days(days)).timestamp_millis())
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            "all" => Ok(TimeRange::All),
            _ => Err(format!("unknown time range: {}", s)),
        }
    }
}

// ============================================
// Auto Run records
// ============================================

/// Outcome of a single Auto Run task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoRunTaskStatus {
    Completed,
    Failed,
    Skipped,
}

impl AutoRunTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoRunTaskStatus::Completed => "completed",
            AutoRunTaskStatus::Failed => "failed",
            AutoRunTaskStatus::Skipped => "skipped",
        }
    }
}

impl std::str::FromStr for AutoRunTaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(AutoRunTaskStatus::Completed),
            "failed" => Ok(AutoRunTaskStatus::Failed),
            "skipped" => Ok(AutoRunTaskStatus::Skipped),
            _ => Err(format!("unknown auto run task status: {}", s)),
        }
    }
}

/// One batch run of tasks from a task document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRunSession {
    pub id: String,
    /// Path of the task document that drove the run
    pub doc_path: String,
    /// Epoch milliseconds
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub failed_tasks: i64,
}

/// One task executed within an Auto Run session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRunTask {
    pub id: String,
    /// Auto Run session this task belongs to
    pub run_id: String,
    /// Position of the task within the document
    pub task_index: i64,
    /// Epoch milliseconds
    pub started_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<i64>,
    pub status: AutoRunTaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
