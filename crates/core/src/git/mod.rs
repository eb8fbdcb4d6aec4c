//! Git operations for comfyprov.

pub mod client;
pub mod remote_url;

pub use client::GitClient;
pub use remote_url::{repository_name, RepositoryName};
