pub mod api;
pub mod config;
pub mod transformer;

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use tasksync::config::TargetSection;
use tasksync::description::Formatter;
use tasksync::Issue;

use self::api::{RedmineClient, RedmineIssue};
use self::config::{RedmineConfig, KEY_USERNAME};
use self::transformer::RedmineTaskIssue;
use crate::http::{build_client, TlsOptions};
use crate::registry::{ServiceContext, ServiceKind};
use crate::{IssueStream, Service};

/// Redmine service: a single page of `/issues.json`.
pub struct RedmineService {
    target: String,
    config: RedmineConfig,
    client: RedmineClient,
    formatter: Formatter,
}

impl RedmineService {
    /// Validates the section and resolves the API key and optional basic-auth password.
    pub async fn connect(section: &TargetSection, ctx: &ServiceContext) -> Result<Self> {
        let config = RedmineConfig::from_section(section)?;
        let keyring_service = config.keyring_service();
        let key = ctx
            .credentials
            .resolve(&config.key, &keyring_service, KEY_USERNAME)
            .await?;

        let basic_auth = if config.login.is_empty() {
            None
        } else {
            let password = ctx
                .credentials
                .resolve(&config.password, &keyring_service, &config.login)
                .await?;
            (!password.is_empty()).then(|| (config.login.clone(), password))
        };

        let http_client = build_client(TlsOptions {
            ca_path: None,
            accept_invalid_certs: !config.verify_ssl,
        })?;
        let client = RedmineClient::new(http_client, config.url.clone(), key, basic_auth);

        Ok(Self {
            target: section.name.clone(),
            formatter: ctx.general.formatter(&config.common),
            config,
            client,
        })
    }

    fn issue(&self, issue: RedmineIssue) -> Result<Box<dyn Issue>> {
        let mapped = RedmineTaskIssue::new(
            issue,
            &self.config.url,
            &self.config.project_name,
            self.config.common.default_priority,
            self.formatter.clone(),
        )?;
        Ok(Box::new(mapped))
    }
}

impl Service for RedmineService {
    fn target(&self) -> &str {
        &self.target
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Redmine
    }

    fn issues(&self) -> IssueStream<'_> {
        let fetch = self.client.find_issues(
            &self.config.query,
            self.config.issue_limit,
            self.config.common.only_if_assigned,
        );
        stream::once(fetch)
            .map_ok(move |issues| {
                tracing::debug!("Found {} total.", issues.len());
                stream::iter(issues.into_iter().map(move |issue| self.issue(issue)))
            })
            .try_flatten()
            .boxed()
    }
}
