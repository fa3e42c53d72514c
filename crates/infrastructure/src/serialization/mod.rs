//! Deterministic JSON serialization for workbook files.
//!
//! Keeps diffs of checked-in workbooks small by:
//! - Keeping key order stable (struct field order, `BTreeMap` in domain types)
//! - Using 2-space indentation
//! - Adding trailing newline

mod json;

pub use json::*;
