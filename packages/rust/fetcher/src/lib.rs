//! Catalog listing and concurrent page download.
//!
//! This crate provides:
//! - [`catalog`]: parses the catalog overview into [`ModuleRef`]s
//! - [`engine`]: the bounded-concurrency [`Fetcher`] that stores raw pages
//!   and writes `module_index.json`

pub mod catalog;
pub mod engine;

pub use catalog::parse_catalog;
pub use engine::Fetcher;
pub use modulsync_shared::ModuleRef;
