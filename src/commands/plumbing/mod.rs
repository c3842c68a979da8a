//! Plumbing commands
//!
//! - `cat-file`: print a stored object
//! - `hash-object`: compute a blob id, optionally storing the blob
//! - `write-tree`: store the trees of the current index

pub mod cat_file;
pub mod hash_object;
pub mod write_tree;
