// Normalized record model and the Issue contract
pub mod record;

// Description and annotation text
pub mod description;

// Date, duration and slug coercions
pub mod convert;

// Config file loading and validation
pub mod config;

// Credential oracles and secret stores
pub mod credentials;

pub use record::{FieldType, FieldValue, Issue, NormalizedRecord, Priority, UdaSpec};
