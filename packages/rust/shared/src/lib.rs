//! Shared types, error model, and configuration for modulsync.
//!
//! This crate is the foundation depended on by all other modulsync crates.
//! It provides:
//! - [`ModulsyncError`]: the unified error type
//! - The dataset model ([`MasterDataset`], [`MasterRecord`], [`VersionRecord`], [`Meta`])
//! - The fetch index ([`FetchIndex`]) written by the fetcher, read by the extractor
//! - Configuration ([`AppConfig`], [`PathsConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod fsutil;
pub mod index;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, PathsConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{ModulsyncError, Result};
pub use fsutil::{write_atomic, write_json};
pub use index::{FetchFailure, FetchIndex, FetchSummary, INDEX_FILE_NAME, IndexEntry};
pub use text::normalize_text;
pub use types::{
    Beruf, DEFAULT_SOURCE_URL, Handlungsziel, MasterDataset, MasterRecord, Meta, MetaCounters,
    ModuleRef, VersionRecord, version_key,
};
