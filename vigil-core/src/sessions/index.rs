//! Ordered session listing, overlay merge, and cursor pagination
//!
//! The index combines scanner output with the origin/label overlay owned by
//! an external key-value layer. The overlay is accessed through the
//! [`OverlayStore`] trait so callers can back it with whatever persistence
//! they already have; the index only reads.

use crate::config::Config;
use crate::error::Result;
use crate::sessions::scanner::{self, TranscriptFile};
use crate::types::{SessionLabels, SessionOrigin, SessionSummary};
use serde::Deserialize;
use std::path::PathBuf;

/// Read access to the session label overlay.
///
/// Keyed by `(project_path, session_id)`. A missing entry is the common
/// case and means "no labels, user origin".
pub trait OverlayStore: Send + Sync {
    fn entry(&self, project_path: &str, session_id: &str) -> Option<RawOverlayEntry>;
}

/// Stored overlay shapes. Older installs wrote a bare origin string; newer
/// ones write the labeled object. Both decode here and are normalized into
/// [`SessionLabels`] immediately — the union never travels further.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawOverlayEntry {
    Legacy(String),
    Labeled {
        #[serde(default)]
        origin: SessionOrigin,
        #[serde(default, rename = "sessionName")]
        session_name: Option<String>,
        #[serde(default)]
        starred: Option<bool>,
    },
}

impl RawOverlayEntry {
    /// Collapse into the canonical label shape.
    pub fn normalize(self) -> SessionLabels {
        match self {
            RawOverlayEntry::Legacy(origin) => SessionLabels {
                origin: origin.parse().unwrap_or_default(),
                session_name: None,
                starred: None,
            },
            RawOverlayEntry::Labeled {
                origin,
                session_name,
                starred,
            } => SessionLabels {
                origin,
                session_name,
                starred,
            },
        }
    }
}

/// An overlay store with no entries; used when the caller has no
/// persistence layer wired up.
pub struct NoOverlay;

impl OverlayStore for NoOverlay {
    fn entry(&self, _project_path: &str, _session_id: &str) -> Option<RawOverlayEntry> {
        None
    }
}

/// A page request. `cursor` is the opaque session id of the last item the
/// caller already has; `limit` defaults to [`DEFAULT_PAGE_LIMIT`].
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// One page of sessions plus the bookkeeping a caller needs to continue.
#[derive(Debug, Clone)]
pub struct SessionPage {
    pub sessions: Vec<SessionSummary>,
    pub has_more: bool,
    /// Count of all valid transcript files, independent of paging
    pub total_count: usize,
    /// Cursor for the next page; `None` on the last page
    pub next_cursor: Option<String>,
}

/// Lists sessions for project directories under a transcripts root.
///
/// Each project gets one directory under the root, named by encoding the
/// project path. Ordering is always `modified_at` descending with session-id
/// ties ascending, so pagination is stable as long as no transcript changes
/// between pages.
pub struct SessionIndex {
    root: PathBuf,
    config: Config,
}

impl SessionIndex {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Directory holding the transcripts for one project. Path separators
    /// are flattened so the project path becomes a single directory name.
    pub fn project_dir(&self, project_path: &str) -> PathBuf {
        self.root.join(encode_project_path(project_path))
    }

    /// Full ordered listing with overlay labels merged in.
    pub fn list_sessions(
        &self,
        project_path: &str,
        overlay: &dyn OverlayStore,
    ) -> Result<Vec<SessionSummary>> {
        let files = scanner::scan_project_dir(&self.project_dir(project_path))?;
        self.summarize(project_path, &files, overlay)
    }

    /// Cursor-paginated listing.
    ///
    /// The cursor names the last session of the previous page; the new page
    /// starts strictly after it in canonical order. A cursor that no longer
    /// matches any file (the transcript was deleted, or the id was never
    /// valid) restarts from the beginning instead of erroring.
    pub fn list_sessions_paginated(
        &self,
        project_path: &str,
        request: &PageRequest,
        overlay: &dyn OverlayStore,
    ) -> Result<SessionPage> {
        let files = scanner::scan_project_dir(&self.project_dir(project_path))?;
        let total_count = files.len();
        let limit = request.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        let start = match request.cursor.as_deref() {
            Some(cursor) => files
                .iter()
                .position(|f| f.session_id == cursor)
                .map(|pos| pos + 1)
                .unwrap_or_else(|| {
                    tracing::debug!(cursor, "Stale pagination cursor, restarting from start");
                    0
                }),
            None => 0,
        };

        let end = start.saturating_add(limit).min(files.len());
        let page_files = &files[start..end];
        let has_more = end < files.len();
        let next_cursor = if has_more {
            page_files.last().map(|f| f.session_id.clone())
        } else {
            None
        };

        let sessions = self.summarize(project_path, page_files, overlay)?;

        Ok(SessionPage {
            sessions,
            has_more,
            total_count,
            next_cursor,
        })
    }

    fn summarize(
        &self,
        project_path: &str,
        files: &[TranscriptFile],
        overlay: &dyn OverlayStore,
    ) -> Result<Vec<SessionSummary>> {
        let mut sessions = Vec::with_capacity(files.len());
        for file in files {
            let labels = overlay
                .entry(project_path, &file.session_id)
                .map(RawOverlayEntry::normalize)
                .unwrap_or_default();
            match scanner::read_summary(
                file,
                project_path,
                &self.config.scan,
                &self.config.pricing,
                &labels,
            ) {
                Ok(summary) => sessions.push(summary),
                Err(e) => {
                    // A file that disappeared mid-listing degrades to a
                    // partial result, not a failed listing
                    tracing::warn!(
                        session_id = %file.session_id,
                        error = %e,
                        "Failed to summarize transcript, skipping"
                    );
                }
            }
        }
        Ok(sessions)
    }
}

/// Flatten a project path into a directory name, the same scheme agent CLIs
/// use for their per-project transcript directories.
pub fn encode_project_path(project_path: &str) -> String {
    project_path
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { '-' } else { c })
        .collect()
}
