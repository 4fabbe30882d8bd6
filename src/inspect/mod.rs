//! Leaf inspectors: each submodule answers exactly one question about a
//! document, and none depends on another.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ filetype      (magic sniff, no tools)
//!   │
//!   ├────▶ structure      (pdfinfo scalars + object-token scan)
//!   ├────▶ text           (pdftotext plain text)
//!   │        └──▶ ocr     (artifact-pattern heuristic over the text)
//!   └────▶ images         (pdfimages -list fixed-column table)
//! ```
//!
//! The orchestrator in [`crate::validate`] sequences these and folds their
//! answers into one [`crate::report::ValidationReport`]; the verifier in
//! [`crate::verify`] reuses [`images`] alone. Inspectors return
//! [`crate::error::StageError`] when their tool is missing or broken — the
//! caller decides whether that degrades a check or fails a stage.

pub mod filetype;
pub mod images;
pub mod ocr;
pub mod structure;
pub mod text;
