//! comfyprov core library.
//!
//! This crate provides the building blocks for provisioning a ComfyUI
//! install: settings, node list parsing, repository synchronization over
//! the git CLI, model list parsing and editing, the downloader wrapper, and
//! GPU detection for picking a PyTorch build.

pub mod config;
pub mod downloader;
pub mod editor;
pub mod errors;
pub mod git;
pub mod gpu;
pub mod models;
pub mod node_list;
pub mod signals;
pub mod sync_engine;

// Re-exports for convenience.
pub use config::ProvisionConfig;
pub use downloader::ModelDownloader;
pub use node_list::NodeList;
pub use sync_engine::{RepoSynchronizer, SyncOutcome, SyncReport};
