//! Transcript file scanning and metadata extraction
//!
//! Transcripts are append-only JSONL files, one per session, named so the
//! file stem is the session id. The scanner lists valid transcripts in a
//! project directory and derives per-session statistics in a single
//! line-by-line pass, without ever holding a whole file in memory.
//!
//! # Error Handling
//!
//! - **Missing project directory**: a normal outcome, yields an empty list.
//! - **Zero-byte files**: discarded; some agents create a transcript file
//!   before ever writing to it.
//! - **Malformed lines**: skipped, the rest of the file is still processed.
//!
//! # Bounded scans
//!
//! Expensive derived fields are only looked for within configured line
//! windows ([`ScanConfig`]): the first user message within the leading
//! `first_message_lines`, the earliest timestamp within the leading
//! `head_timestamp_lines`, and the latest timestamp within the trailing
//! `tail_timestamp_lines`. This is a precision/performance trade-off: a
//! field outside its window is simply not observed. Message counts and
//! token sums always cover the whole file.

use crate::config::{PricingRates, ScanConfig};
use crate::error::{Error, Result};
use crate::types::{SessionLabels, SessionSummary, TokenCounts};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A valid transcript file discovered in a project directory.
#[derive(Debug, Clone)]
pub struct TranscriptFile {
    /// Session id, derived from the file stem
    pub session_id: String,
    /// Absolute path to the transcript
    pub path: PathBuf,
    /// File size in bytes (always > 0; empty files are filtered out)
    pub size_bytes: u64,
    /// File creation time, falling back to mtime where unavailable
    pub created_at: DateTime<Utc>,
    /// Last modification time; canonical session ordering key
    pub modified_at: DateTime<Utc>,
}

/// List valid transcript files in a project directory.
///
/// A missing directory yields an empty result. Entries must carry the
/// `.jsonl` extension and a non-zero size. The result is sorted by
/// `modified_at` descending with session-id ties broken ascending, which is
/// the canonical session order used everywhere downstream.
pub fn scan_project_dir(dir: &Path) -> Result<Vec<TranscriptFile>> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "Project directory missing, no sessions");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to stat transcript");
                continue;
            }
        };

        if metadata.len() == 0 {
            continue;
        }

        let modified_at = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());
        let created_at = metadata
            .created()
            .map(DateTime::from)
            .unwrap_or(modified_at);

        files.push(TranscriptFile {
            session_id: session_id.to_string(),
            path,
            size_bytes: metadata.len(),
            created_at,
            modified_at,
        });
    }

    files.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });

    Ok(files)
}

// ============================================
// Raw transcript record types
// ============================================

/// One transcript record. `#[serde(default)]` keeps partial records usable.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    #[serde(rename = "type")]
    record_type: Option<String>,
    message: Option<RawMessage>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    role: Option<String>,
    content: Option<RawContent>,
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<RawPart>),
}

/// A typed content part; only `text` parts contribute to the preview.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawPart {
    #[serde(rename = "type")]
    part_type: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
}

impl RawUsage {
    fn has_any(&self) -> bool {
        self.input_tokens.is_some()
            || self.output_tokens.is_some()
            || self.cache_read_input_tokens.is_some()
            || self.cache_creation_input_tokens.is_some()
    }
}

/// Derive a [`SessionSummary`] from a transcript in one bounded pass.
///
/// Per-line decode failures are skipped silently; the rest of the file is
/// still processed. Cost is accumulated incrementally from the configured
/// pricing rates while scanning, not as a second pass.
pub fn read_summary(
    file: &TranscriptFile,
    project_path: &str,
    scan: &ScanConfig,
    pricing: &PricingRates,
    labels: &SessionLabels,
) -> Result<SessionSummary> {
    let handle = File::open(&file.path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open {}: {}", file.path.display(), e),
        ))
    })?;
    let reader = BufReader::new(handle);

    let mut message_count: u64 = 0;
    let mut tokens = TokenCounts::default();
    let mut cost_usd = 0.0_f64;
    let mut first_message: Option<String> = None;
    let mut head_min_ts: Option<DateTime<Utc>> = None;
    // Timestamps from the trailing window; capped at tail_timestamp_lines
    let mut tail_ts: VecDeque<DateTime<Utc>> = VecDeque::new();

    let mut line_no = 0usize;

    for line in reader.lines() {
        line_no += 1;

        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!(
                    path = %file.path.display(),
                    line = line_no,
                    error = %e,
                    "Unreadable transcript line, skipping"
                );
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let record: RawRecord = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(_) => continue,
        };

        // Every structurally valid record counts; this sum must be exact
        message_count += 1;

        if let Some(usage) = record.message.as_ref().and_then(|m| m.usage.as_ref()) {
            if usage.has_any() {
                let line_tokens = TokenCounts {
                    input_tokens: usage.input_tokens.unwrap_or(0),
                    output_tokens: usage.output_tokens.unwrap_or(0),
                    cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0),
                    cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
                };

                tokens.input_tokens += line_tokens.input_tokens;
                tokens.output_tokens += line_tokens.output_tokens;
                tokens.cache_read_tokens += line_tokens.cache_read_tokens;
                tokens.cache_creation_tokens += line_tokens.cache_creation_tokens;

                cost_usd += pricing.cost_usd(&line_tokens);
            }
        }

        let timestamp = record
            .timestamp
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        if let Some(ts) = timestamp {
            if line_no <= scan.head_timestamp_lines {
                head_min_ts = Some(match head_min_ts {
                    Some(existing) => existing.min(ts),
                    None => ts,
                });
            }
            tail_ts.push_back(ts);
            while tail_ts.len() > scan.tail_timestamp_lines {
                tail_ts.pop_front();
            }
        }

        if first_message.is_none() && line_no <= scan.first_message_lines {
            if is_user_record(&record) {
                if let Some(text) = extract_message_text(&record) {
                    if !text.trim().is_empty() {
                        first_message = Some(truncate_preview(&text, scan.preview_length));
                    }
                }
            }
        }
    }

    // Duration uses min/max over the observed windows rather than first/last,
    // so out-of-order timestamps cannot produce a negative span
    let duration_seconds = match (head_min_ts, tail_ts.iter().max()) {
        (Some(start), Some(end)) if *end > start => (*end - start).num_seconds().max(0) as u64,
        _ => 0,
    };

    Ok(SessionSummary {
        session_id: file.session_id.clone(),
        project_path: project_path.to_string(),
        first_message,
        message_count,
        input_tokens: tokens.input_tokens,
        output_tokens: tokens.output_tokens,
        cache_read_tokens: tokens.cache_read_tokens,
        cache_creation_tokens: tokens.cache_creation_tokens,
        cost_usd,
        created_at: file.created_at,
        modified_at: file.modified_at,
        duration_seconds,
        origin: labels.origin,
        session_name: labels.session_name.clone(),
        starred: labels.starred,
    })
}

fn is_user_record(record: &RawRecord) -> bool {
    record.record_type.as_deref() == Some("user")
        || record
            .message
            .as_ref()
            .and_then(|m| m.role.as_deref())
            .map(|r| r == "user")
            .unwrap_or(false)
}

/// Text of a message: plain strings verbatim, part arrays reduced to their
/// `text`-typed parts only (images and other part types are ignored).
fn extract_message_text(record: &RawRecord) -> Option<String> {
    match record.message.as_ref()?.content.as_ref()? {
        RawContent::Text(text) => Some(text.clone()),
        RawContent::Parts(parts) => {
            let text: String = parts
                .iter()
                .filter(|p| p.part_type.as_deref() == Some("text"))
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("");
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
    }
}

/// Truncate on a character boundary; byte indexing would split UTF-8.
fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_transcript(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    fn transcript_file(path: PathBuf) -> TranscriptFile {
        let metadata = std::fs::metadata(&path).unwrap();
        TranscriptFile {
            session_id: path.file_stem().unwrap().to_str().unwrap().to_string(),
            size_bytes: metadata.len(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
            path,
        }
    }

    fn summarize(path: PathBuf, scan: &ScanConfig) -> SessionSummary {
        read_summary(
            &transcript_file(path),
            "/work/demo",
            scan,
            &PricingRates::default(),
            &SessionLabels::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("does-not-exist");
        let files = scan_project_dir(&missing).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_zero_byte_files_excluded() {
        let tmp = TempDir::new().unwrap();
        write_transcript(tmp.path(), "real.jsonl", &[r#"{"type":"user"}"#]);
        File::create(tmp.path().join("stub.jsonl")).unwrap();
        File::create(tmp.path().join("notes.txt")).unwrap();

        let files = scan_project_dir(tmp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].session_id, "real");
    }

    #[test]
    fn test_malformed_lines_skipped_but_counted_from_valid() {
        let tmp = TempDir::new().unwrap();
        let path = write_transcript(
            tmp.path(),
            "s1.jsonl",
            &[
                r#"{"type":"user","message":{"role":"user","content":"fix the tests"},"timestamp":"2026-01-05T10:00:00Z"}"#,
                "not json {{{",
                r#"{"broken":"#,
                r#"{"type":"assistant","message":{"usage":{"input_tokens":100,"output_tokens":50}},"timestamp":"2026-01-05T10:05:00Z"}"#,
            ],
        );
        let summary = summarize(path, &ScanConfig::default());

        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.first_message.as_deref(), Some("fix the tests"));
        assert_eq!(summary.input_tokens, 100);
        assert_eq!(summary.output_tokens, 50);
        assert_eq!(summary.duration_seconds, 300);
    }

    #[test]
    fn test_cost_per_million_rates() {
        let tmp = TempDir::new().unwrap();
        let path = write_transcript(
            tmp.path(),
            "cost.jsonl",
            &[
                r#"{"type":"assistant","message":{"usage":{"input_tokens":1000000,"output_tokens":1000000,"cache_read_input_tokens":1000000,"cache_creation_input_tokens":1000000}}}"#,
            ],
        );
        let summary = summarize(path, &ScanConfig::default());
        // $3 + $15 + $0.30 + $3.75 for one million tokens of each type
        assert!((summary.cost_usd - 22.05).abs() < 1e-9);
    }

    #[test]
    fn test_array_content_text_parts_only() {
        let tmp = TempDir::new().unwrap();
        let path = write_transcript(
            tmp.path(),
            "parts.jsonl",
            &[
                r#"{"type":"user","message":{"role":"user","content":[{"type":"image","source":{"type":"base64"}},{"type":"text","text":"look at "},{"type":"text","text":"this screenshot"}]}}"#,
            ],
        );
        let summary = summarize(path, &ScanConfig::default());
        assert_eq!(
            summary.first_message.as_deref(),
            Some("look at this screenshot")
        );
    }

    #[test]
    fn test_first_message_beyond_bound_not_found() {
        let tmp = TempDir::new().unwrap();
        let filler = r#"{"type":"assistant","message":{}}"#;
        let mut lines: Vec<&str> = vec![filler; 5];
        let user = r#"{"type":"user","message":{"role":"user","content":"late hello"}}"#;
        lines.push(user);
        let path = write_transcript(tmp.path(), "late.jsonl", &lines);

        let tight = ScanConfig {
            first_message_lines: 3,
            ..ScanConfig::default()
        };
        assert!(summarize(path.clone(), &tight).first_message.is_none());

        let wide = ScanConfig::default();
        assert_eq!(
            summarize(path, &wide).first_message.as_deref(),
            Some("late hello")
        );
    }

    #[test]
    fn test_preview_truncation() {
        let tmp = TempDir::new().unwrap();
        let long = "x".repeat(400);
        let line = format!(
            r#"{{"type":"user","message":{{"role":"user","content":"{}"}}}}"#,
            long
        );
        let path = write_transcript(tmp.path(), "long.jsonl", &[&line]);
        let summary = summarize(path, &ScanConfig::default());
        assert_eq!(summary.first_message.unwrap().chars().count(), 200);
    }

    #[test]
    fn test_tail_timestamp_bound_truncates_window() {
        let tmp = TempDir::new().unwrap();
        let path = write_transcript(
            tmp.path(),
            "tail.jsonl",
            &[
                r#"{"type":"user","timestamp":"2026-01-05T10:00:00Z"}"#,
                r#"{"type":"assistant","timestamp":"2026-01-05T10:20:00Z"}"#,
                r#"{"type":"assistant","timestamp":"2026-01-05T10:10:00Z"}"#,
            ],
        );

        // Default bounds see all three timestamps: 10:00 to 10:20
        let summary = summarize(path.clone(), &ScanConfig::default());
        assert_eq!(summary.duration_seconds, 1200);

        // A one-line tail window only observes the final 10:10 timestamp
        let tight = ScanConfig {
            tail_timestamp_lines: 1,
            ..ScanConfig::default()
        };
        assert_eq!(summarize(path, &tight).duration_seconds, 600);
    }

    #[test]
    fn test_head_timestamp_bound_truncates_window() {
        let tmp = TempDir::new().unwrap();
        let path = write_transcript(
            tmp.path(),
            "head.jsonl",
            &[
                r#"{"type":"user","timestamp":"2026-01-05T10:10:00Z"}"#,
                r#"{"type":"assistant","timestamp":"2026-01-05T10:00:00Z"}"#,
                r#"{"type":"assistant","timestamp":"2026-01-05T10:20:00Z"}"#,
            ],
        );

        // Default bounds find the 10:00 minimum on the second line
        let summary = summarize(path.clone(), &ScanConfig::default());
        assert_eq!(summary.duration_seconds, 1200);

        // A one-line head window never sees it, so the span starts at 10:10
        let tight = ScanConfig {
            head_timestamp_lines: 1,
            ..ScanConfig::default()
        };
        assert_eq!(summarize(path, &tight).duration_seconds, 600);
    }

    #[test]
    fn test_out_of_order_timestamps_never_negative() {
        let tmp = TempDir::new().unwrap();
        let path = write_transcript(
            tmp.path(),
            "ooo.jsonl",
            &[
                r#"{"type":"user","timestamp":"2026-01-05T10:10:00Z"}"#,
                r#"{"type":"assistant","timestamp":"2026-01-05T10:00:00Z"}"#,
            ],
        );
        let summary = summarize(path, &ScanConfig::default());
        // min/max semantics: 10:00 to 10:10 regardless of record order
        assert_eq!(summary.duration_seconds, 600);
    }

    #[test]
    fn test_usage_absent_is_zero_sums() {
        let tmp = TempDir::new().unwrap();
        let path = write_transcript(
            tmp.path(),
            "nousage.jsonl",
            &[r#"{"type":"user","message":{"role":"user","content":"hi"}}"#],
        );
        let summary = summarize(path, &ScanConfig::default());
        assert_eq!(summary.input_tokens, 0);
        assert_eq!(summary.cost_usd, 0.0);
    }
}
