pub mod api;
pub mod auth;
pub mod config;
pub mod transformer;

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use tasksync::config::TargetSection;
use tasksync::description::Formatter;
use tasksync::Issue;

use self::api::GerritClient;
use self::config::GerritConfig;
use self::transformer::GerritIssue;
use crate::http::{build_client, TlsOptions};
use crate::registry::{ServiceContext, ServiceKind};
use crate::{IssueStream, Service};

/// Gerrit service: one authenticated change query per pass, one issue per change.
pub struct GerritService {
    target: String,
    config: GerritConfig,
    client: GerritClient,
    formatter: Formatter,
}

impl GerritService {
    /// Validates the section, resolves the password and probes the auth scheme.
    pub async fn connect(section: &TargetSection, ctx: &ServiceContext) -> Result<Self> {
        let config = GerritConfig::from_section(section)?;
        let password = ctx
            .credentials
            .resolve(&config.password, &config.keyring_service(), &config.username)
            .await?;

        let ca_path = config.ssl_ca_path();
        let http_client = build_client(TlsOptions {
            ca_path: ca_path.as_deref(),
            accept_invalid_certs: false,
        })?;
        let client = GerritClient::connect(
            http_client,
            config.base_uri.clone(),
            config.username.clone(),
            password,
        )
        .await?;

        Ok(Self {
            target: section.name.clone(),
            formatter: ctx.general.formatter(&config.common),
            config,
            client,
        })
    }

    fn issue(&self, change: api::Change) -> Box<dyn Issue> {
        Box::new(GerritIssue::new(
            change,
            &self.config.base_uri,
            self.config.common.default_priority,
            self.formatter.clone(),
        ))
    }
}

impl Service for GerritService {
    fn target(&self) -> &str {
        &self.target
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Gerrit
    }

    fn issues(&self) -> IssueStream<'_> {
        let query = self.config.query_string();
        stream::once(async move { self.client.fetch_changes(&query).await })
            .map_ok(move |changes| {
                tracing::info!("Found {} Gerrit changes for {}", changes.len(), self.target);
                stream::iter(
                    changes
                        .into_iter()
                        .map(move |change| Ok::<_, anyhow::Error>(self.issue(change))),
                )
            })
            .try_flatten()
            .boxed()
    }
}
