//! Command implementations for the pacs-tools CLI
//!
//! Batch commands turn their arguments into an operation request and return
//! the [`Report`](crate::orchestrator::Report); printing and the exit code are
//! left to `main`.

pub mod completions;
pub mod docs_table;
pub mod generate;
pub mod publish;
pub mod tag;
