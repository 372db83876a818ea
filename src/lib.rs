//! findex: a local file indexer with multi-signal lexical search
//!
//! - [`scan`] walks watch roots with directory, name and extension filters
//! - [`queue`] runs chunked work with duration-learning concurrency
//! - [`index`] turns items into full-text documents and weighted keywords
//! - [`worker`] extracts file content on a background actor
//! - [`indexer`] drives cleanup, full scans and reconciliation
//! - [`search`] and [`rank`] answer and order free-text queries
//!
//! Everything is persisted in one SQLite database through [`meta::MetaDb`].

pub mod commands;
pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod meta;
pub mod parse;
pub mod progress;
pub mod queue;
pub mod rank;
pub mod scan;
pub mod search;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};
