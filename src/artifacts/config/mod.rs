//! Git configuration file model
//!
//! - `config_layer`: one parsed configuration file, an ordered section/key/value map
//! - `config_key`: the well-known properties the IDE reads and writes

pub mod config_key;
pub mod config_layer;

/// Section holding the commit identity
pub const USER_SECTION: &str = "user";

/// Section holding the IDE extension toggles
pub const EXTENSIONS_SECTION: &str = "extensions";

/// Section holding the default pull/push URL
pub const ORIGIN_SECTION: &str = "remote \"origin\"";
