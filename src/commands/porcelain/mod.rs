//! Porcelain commands
//!
//! - `init`: create the `.git` layout
//! - `add`, `rm`, `mv`: register paths and write the index
//! - `commit`: stage, build trees and commit on the current branch
//! - `config`: read and edit the layered configuration

pub mod add;
pub mod commit;
pub mod config;
pub mod init;
pub mod mv;
pub mod rm;
