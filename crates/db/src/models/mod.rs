//! Database row structs.
//!
//! Each submodule holds a `FromRow` struct matching one table's columns and
//! the conversion into the matching crawlq-core record.

pub mod project;
pub mod task;
pub mod task_result;
