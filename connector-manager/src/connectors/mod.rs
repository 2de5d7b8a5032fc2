//! Tracker integrations, one module per service.
//!
//! Each module follows the same layout: `config` (section schema), `api`
//! (typed HTTP client), `transformer` (record mapping and UDA table) and the
//! service itself in `mod.rs`.

pub mod gerrit;
pub mod phabricator;
pub mod pivotal;
pub mod redmine;
