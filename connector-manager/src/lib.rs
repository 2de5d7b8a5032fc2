//! tasksync connector manager - tracker services and the pull pipeline.
//!
//! Every tracker integration implements [`Service`]. The registry builds a
//! service from a validated target section, and the collector drains its
//! issue stream into normalized records.
//!
//! # Architecture
//!
//! ```text
//! Config file ([general] + one section per target)
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Registry                          │
//! │  - Validate the section schema          │
//! │  - Resolve credentials, open session    │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Service (implements trait)        │
//! │  - Query the tracker API lazily         │
//! │  - Map records, build annotations       │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Collector                         │
//! │  - Default description, add_tags        │
//! │  - Write JSON lines, report failures    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Core Types
//!
//! - [`Service`] - Trait that all tracker services implement
//! - [`ServiceKind`] - Supported trackers with their UDA tables
//! - [`ServiceContext`] - General settings plus the credential resolver
//! - [`collector::SyncReport`] - Outcome of a pull
//!
//! # Pulling one target
//!
//! ```no_run
//! use connector_manager::{build_service, ServiceContext};
//! use futures::TryStreamExt;
//! use std::sync::Arc;
//! use tasksync::config::Config;
//! use tasksync::credentials::{CredentialResolver, EnvSecretStore};
//!
//! # async fn demo(config: Config) -> anyhow::Result<()> {
//! let ctx = ServiceContext {
//!     general: config.general.clone(),
//!     credentials: CredentialResolver::new(Arc::new(EnvSecretStore::new()), false),
//! };
//! let section = config.target("my_redmine")?;
//! let service = build_service(&section, &ctx).await?;
//! let issues: Vec<_> = service.issues().try_collect().await?;
//! for issue in &issues {
//!     println!("{}", issue.default_description());
//! }
//! # Ok(())
//! # }
//! ```

mod connector;
pub mod cli;
pub mod collector;
pub mod connectors;
pub mod http;
pub mod registry;

// Re-export public types
pub use collector::{collect, JsonLinesSink, RecordSink, SyncReport, TaskRecord};
pub use connector::{IssueStream, Service};
pub use registry::{build_service, validate_target, ServiceContext, ServiceKind};
