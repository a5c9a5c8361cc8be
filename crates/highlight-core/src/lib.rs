#![warn(missing_docs)]
//! `highlight-core` - grammar-agnostic core of an incremental syntax highlighter.
//!
//! # Overview
//!
//! This crate holds the data model and bookkeeping shared by highlighter front ends. It never
//! parses anything: a grammar integration (such as `highlight-core-treesitter`) turns edits into
//! syntax trees and classified ranges, and uses the pieces here to keep those classifications
//! correct while the document keeps changing.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  Scheduler (dirty ranges, jobs, staleness)     │
//! ├───────────────────────────────────────────────┤
//! │  RangeIndex (byte range -> style category)     │
//! ├───────────────────────────────────────────────┤
//! │  EditLog / Edit (revisions, pending batch)     │
//! ├───────────────────────────────────────────────┤
//! │  Document / DocumentSnapshot (rope text)       │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use highlight_core::{ByteRange, Document, EditLog, RangeIndex, StyleCategory, StyleRange};
//!
//! let mut doc = Document::new("let x = 1");
//! let mut log = EditLog::new(doc.revision(), doc.len_bytes());
//! let mut index = RangeIndex::new();
//!
//! index
//!     .replace(ByteRange::new(0, 3), &[StyleRange::styled(0..3, 1)])
//!     .unwrap();
//!
//! let edit = doc.insert(0, "// hi\n").unwrap();
//! index.apply_edit(edit.range, edit.replacement_len());
//! log.record(edit).unwrap();
//!
//! assert_eq!(index.style_at(6), StyleCategory::Styled(1));
//! assert_eq!(log.revision(), doc.revision());
//! ```
//!
//! # Module Description
//!
//! - [`range`] - byte ranges and normalized range sets
//! - [`style`] - style ids, categories and styled ranges
//! - [`edit`] - edits and the edit log
//! - [`document`] - rope-backed text storage and snapshots
//! - [`range_index`] - the style range index
//! - [`scheduler`] - invalidation scheduling and job bookkeeping
//! - [`listeners`] - style change listeners

pub mod document;
pub mod edit;
pub mod error;
pub mod listeners;
pub mod range;
pub mod range_index;
pub mod scheduler;
pub mod style;

pub use document::{Document, DocumentSnapshot, EditCallback, TextPoint};
pub use edit::{Edit, EditLog, Revision, edited_spans};
pub use error::{EditError, RangeIndexError};
pub use listeners::{ListenerId, StyleListener, StyleListeners};
pub use range::{ByteRange, RangeSet};
pub use range_index::RangeIndex;
pub use scheduler::{Completion, Epoch, JobId, Phase, Plan, QueryJob, Scheduler, SchedulerConfig};
pub use style::{StyleCategory, StyleId, StyleRange};

/// Re-export of the rope type used by [`DocumentSnapshot`].
pub use ropey::Rope;
