//! Format-specific event parsers
//!
//! Each supported agent CLI has a parser module that implements the
//! [`EventParser`](super::EventParser) trait.
//!
//! ## Supported Agents
//!
//! | Agent | Module |
//! |-------|--------|
//! | Claude Code | [`claude`] |
//! | Codex | [`codex`] |

mod claude;
mod codex;

pub use claude::ClaudeEventParser;
pub use codex::CodexEventParser;

use super::EventParser;
use crate::types::AgentKind;

/// Create all available parsers.
pub fn create_all_parsers() -> Vec<Box<dyn EventParser>> {
    vec![
        Box::new(ClaudeEventParser::new()),
        Box::new(CodexEventParser::new()),
    ]
}

/// Get a parser for a specific agent.
///
/// Returns `None` for agents with no structured output format (e.g., a
/// plain terminal pane).
pub fn parser_for(agent: AgentKind) -> Option<Box<dyn EventParser>> {
    match agent {
        AgentKind::Claude => Some(Box::new(ClaudeEventParser::new())),
        AgentKind::Codex => Some(Box::new(CodexEventParser::new())),
        AgentKind::Terminal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_all_parsers() {
        let parsers = create_all_parsers();
        assert!(!parsers.is_empty());
        assert!(parsers.iter().any(|p| p.agent() == AgentKind::Claude));
        assert!(parsers.iter().any(|p| p.agent() == AgentKind::Codex));
    }

    #[test]
    fn test_parser_for_claude() {
        let parser = parser_for(AgentKind::Claude);
        assert!(parser.is_some());
        assert_eq!(parser.unwrap().agent(), AgentKind::Claude);
    }

    #[test]
    fn test_parser_for_terminal() {
        assert!(parser_for(AgentKind::Terminal).is_none());
    }
}
