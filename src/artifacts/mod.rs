//! Data structures and algorithms the areas are built from
//!
//! - `config`: configuration file layers and well-known keys
//! - `core`: errors, lock files, progress and log capabilities
//! - `database`: database entry types
//! - `index`: index file entries and framing
//! - `objects`: object types (blob, tree, commit)
//! - `staging`: path sets, index and commit builders

pub mod config;
pub mod core;
pub mod database;
pub mod index;
pub mod objects;
pub mod staging;
