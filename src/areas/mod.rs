//! Repository areas
//!
//! Each area owns one part of the `.git` directory or the working tree:
//!
//! - `config`: layered configuration files (repository, user, system)
//! - `database`: object database for blobs, trees and commits
//! - `index`: staging area file
//! - `refs`: `HEAD` and branch references
//! - `repository`: the handle tying the areas together
//! - `workspace`: working tree file access

pub mod config;
pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
