//! Structured results extraction for sailing regatta web pages.
//!
//! [`extract::Extractor`] turns one page of HTML into an
//! [`ExtractionOutput`]; the surrounding modules fetch pages, persist
//! output to SQLite and export it as CSV or JSON.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod runner;
pub mod storage;
pub mod types;

pub use error::{ExtractionError, FetchError};
pub use extract::{ExtractionConfig, Extractor};
pub use types::{Diagnostic, Diagnostics, ExtractionOutput, ResultRecord};
