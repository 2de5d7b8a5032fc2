//! Service registry - maps a target's `service` key to its connector.
//!
//! UDA tables and unique keys are static per kind, so listing them never
//! builds a service or touches the network.

use crate::connectors::gerrit::{self, config::GerritConfig, GerritService};
use crate::connectors::phabricator::{self, config::PhabricatorConfig, PhabricatorService};
use crate::connectors::pivotal::{self, config::PivotalConfig, PivotalService};
use crate::connectors::redmine::{self, config::RedmineConfig, RedmineService};
use crate::Service;
use anyhow::Result;
use tasksync::config::{ConfigError, GeneralConfig, TargetSection};
use tasksync::credentials::CredentialResolver;
use tasksync::UdaSpec;

/// Supported trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Gerrit,
    Phabricator,
    Redmine,
    PivotalTracker,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Gerrit,
        ServiceKind::Phabricator,
        ServiceKind::Redmine,
        ServiceKind::PivotalTracker,
    ];

    /// The `service = "..."` value naming this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Gerrit => "gerrit",
            ServiceKind::Phabricator => "phabricator",
            ServiceKind::Redmine => "redmine",
            ServiceKind::PivotalTracker => "pivotaltracker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn udas(&self) -> &'static [UdaSpec] {
        match self {
            ServiceKind::Gerrit => gerrit::transformer::UDAS,
            ServiceKind::Phabricator => phabricator::transformer::UDAS,
            ServiceKind::Redmine => redmine::transformer::UDAS,
            ServiceKind::PivotalTracker => pivotal::transformer::UDAS,
        }
    }

    /// Attributes identifying a record across pulls.
    pub fn unique_key(&self) -> &'static [&'static str] {
        match self {
            ServiceKind::Gerrit => gerrit::transformer::UNIQUE_KEY,
            ServiceKind::Phabricator => phabricator::transformer::UNIQUE_KEY,
            ServiceKind::Redmine => redmine::transformer::UNIQUE_KEY,
            ServiceKind::PivotalTracker => pivotal::transformer::UNIQUE_KEY,
        }
    }
}

/// Everything a service needs besides its own section.
#[derive(Clone)]
pub struct ServiceContext {
    pub general: GeneralConfig,
    pub credentials: CredentialResolver,
}

/// Resolves the section's service kind and checks it against that kind's schema.
pub fn validate_target(section: &TargetSection) -> Result<ServiceKind, ConfigError> {
    let kind = ServiceKind::from_name(&section.service).ok_or_else(|| {
        ConfigError::unexpected(&section.name, "service", section.service.clone())
    })?;
    match kind {
        ServiceKind::Gerrit => GerritConfig::from_section(section).map(drop)?,
        ServiceKind::Phabricator => PhabricatorConfig::from_section(section).map(drop)?,
        ServiceKind::Redmine => RedmineConfig::from_section(section).map(drop)?,
        ServiceKind::PivotalTracker => PivotalConfig::from_section(section).map(drop)?,
    }
    Ok(kind)
}

/// Builds the service for one target, resolving credentials on the way.
pub async fn build_service(
    section: &TargetSection,
    ctx: &ServiceContext,
) -> Result<Box<dyn Service>> {
    let service: Box<dyn Service> = match validate_target(section)? {
        ServiceKind::Gerrit => Box::new(GerritService::connect(section, ctx).await?),
        ServiceKind::Phabricator => Box::new(PhabricatorService::new(section, ctx)?),
        ServiceKind::Redmine => Box::new(RedmineService::connect(section, ctx).await?),
        ServiceKind::PivotalTracker => Box::new(PivotalService::connect(section, ctx).await?),
    };
    Ok(service)
}
