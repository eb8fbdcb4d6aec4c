//! Subcommand implementations.
//!
//! Each module prints human-facing status with [`style`] and leaves the
//! real work to `comfyprov_core`.

pub mod doctor;
pub mod gpu;
pub mod models;
pub mod nodes;
pub mod style;
