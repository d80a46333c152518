//! Session transcript indexing
//!
//! Two layers: the scanner finds transcript files and derives bounded
//! per-session statistics; the index orders them, merges label overlays,
//! and paginates.

pub mod index;
pub mod scanner;

pub use index::{
    NoOverlay, OverlayStore, PageRequest, RawOverlayEntry, SessionIndex, SessionPage,
    DEFAULT_PAGE_LIMIT,
};
pub use scanner::{read_summary, scan_project_dir, TranscriptFile};
