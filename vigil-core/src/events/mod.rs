//! Output event normalization
//!
//! Each supported agent CLI emits a different line-oriented stream format.
//! This module normalizes one line of output into a canonical [`AgentEvent`]
//! through the [`EventParser`] trait, one implementation per format.
//!
//! ## Design Principles
//!
//! 1. **Never throws**: any non-empty line produces an event; content that
//!    fails to decode degrades to a `Text` event carrying the raw line
//! 2. **No format branching in callers**: code holds a `Box<dyn EventParser>`
//!    obtained from the registry and never inspects the payload to decide
//!    which format it is
//! 3. **Lossless**: valid payloads are preserved in `AgentEvent::raw` for
//!    consumers that need unmodeled fields

pub mod parsers;

pub use parsers::{create_all_parsers, parser_for};

use crate::types::{AgentEvent, AgentEventKind, AgentKind, EventUsage};

/// Trait implemented by all agent output parsers.
///
/// `parse_line` does the normalization; the remaining methods are read-only
/// projections over an already-parsed event. The default projections cover
/// formats that record everything on the event itself; a parser overrides
/// them only when its format needs payload-level digging.
pub trait EventParser: Send + Sync {
    /// Which agent CLI this parser handles
    fn agent(&self) -> AgentKind;

    /// Normalize one line of output.
    ///
    /// Returns `None` for empty or whitespace-only lines. Never fails:
    /// undecodable content becomes a `Text` event whose text is the raw line.
    fn parse_line(&self, line: &str) -> Option<AgentEvent>;

    /// Whether this event terminates a query.
    fn is_result_event(&self, event: &AgentEvent) -> bool {
        event.kind == AgentEventKind::Result
    }

    /// Session id carried by this event, if any.
    ///
    /// Only some events in a stream carry the id; the first one establishes
    /// session identity and later ones confirm it.
    fn extract_session_id(&self, event: &AgentEvent) -> Option<String> {
        event.session_id.clone()
    }

    /// Token usage carried by this event.
    ///
    /// `None` means the event had no usage fields; zero-valued usage is a
    /// distinct, valid observation.
    fn extract_usage(&self, event: &AgentEvent) -> Option<EventUsage> {
        event.usage
    }

    /// Slash commands advertised by the agent, for formats that expose them.
    fn extract_slash_commands(&self, _event: &AgentEvent) -> Option<Vec<String>> {
        None
    }
}
