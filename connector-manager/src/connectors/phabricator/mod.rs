pub mod api;
pub mod config;
pub mod filter;
pub mod transformer;

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;
use tasksync::config::TargetSection;
use tasksync::description::Formatter;
use tasksync::Issue;

use self::api::{open_query, Arcrc, ConduitClient, ConduitError, Revision, Task};
use self::config::PhabricatorConfig;
use self::filter::MembershipFilter;
use self::transformer::PhabricatorIssue;
use crate::http::{build_client, TlsOptions};
use crate::registry::{ServiceContext, ServiceKind};
use crate::{IssueStream, Service};

/// Phabricator service: open Maniphest tasks, then open Differential revisions.
///
/// Conduit and transport errors are logged and end the affected half of the
/// stream. A response that does not decode fails the stream.
pub struct PhabricatorService {
    target: String,
    config: PhabricatorConfig,
    client: ConduitClient,
    filter: MembershipFilter,
    formatter: Formatter,
}

impl PhabricatorService {
    /// Validates the section and reads the Conduit token from the arcanist rc file.
    pub fn new(section: &TargetSection, ctx: &ServiceContext) -> Result<Self> {
        let config = PhabricatorConfig::from_section(section)?;
        let arcrc = Arcrc::load(&config.arcrc_path())?;
        let (api_url, token) = arcrc.credentials(config.host.as_deref())?;
        let client = ConduitClient::new(build_client(TlsOptions::default())?, api_url, token);

        Ok(Self {
            target: section.name.clone(),
            filter: MembershipFilter::from_config(&config),
            formatter: ctx.general.formatter(&config.common),
            config,
            client,
        })
    }

    /// Server-side task query.
    ///
    /// With both user and project PHIDs configured, the project query
    /// replaces the user results instead of adding to them.
    async fn query_tasks(&self) -> Result<Vec<Task>> {
        let user_phids = &self.config.user_phids;
        let project_phids = &self.config.project_phids;
        let mut tasks = Vec::new();

        if !user_phids.is_empty() {
            for role in ["ownerPHIDs", "ccPHIDs", "authorPHIDs"] {
                let found = self
                    .client
                    .maniphest_query(open_query(Some((role, user_phids))))
                    .await?;
                tasks.extend(found);
            }
            let mut seen = HashSet::new();
            tasks.retain(|task: &Task| seen.insert(task.phid.clone()));
        }
        if !project_phids.is_empty() {
            tasks = self
                .client
                .maniphest_query(open_query(Some(("projectPHIDs", project_phids))))
                .await?;
        }
        if user_phids.is_empty() && project_phids.is_empty() {
            tasks = self.client.maniphest_query(open_query(None)).await?;
        }
        Ok(tasks)
    }

    async fn fetch_tasks(&self) -> Result<Vec<Task>> {
        let tasks = tolerate_conduit_error(self.query_tasks().await, "tasks from Maniphest")?;
        tracing::info!("Found {} tasks", tasks.len());
        Ok(tasks)
    }

    async fn fetch_revisions(&self) -> Result<Vec<Revision>> {
        let revisions = tolerate_conduit_error(
            self.client.differential_query(open_query(None)).await,
            "revisions from Differential",
        )?;
        tracing::info!("Found {} differentials", revisions.len());
        Ok(revisions)
    }

    pub fn tasks(&self) -> IssueStream<'_> {
        stream::once(self.fetch_tasks())
            .map_ok(move |tasks| {
                stream::iter(tasks.into_iter().filter(move |t| self.filter.matches_task(t)).map(
                    move |task| {
                        Ok::<_, anyhow::Error>(Box::new(PhabricatorIssue::from_task(
                            task,
                            &self.target,
                            self.config.common.default_priority,
                            self.formatter.clone(),
                        )) as Box<dyn Issue>)
                    },
                ))
            })
            .try_flatten()
            .boxed()
    }

    pub fn revisions(&self) -> IssueStream<'_> {
        stream::once(self.fetch_revisions())
            .map_ok(move |revisions| {
                stream::iter(
                    revisions
                        .into_iter()
                        .filter(move |r| self.filter.matches_revision(r))
                        .map(move |revision| {
                            Ok::<_, anyhow::Error>(Box::new(PhabricatorIssue::from_revision(
                                revision,
                                &self.target,
                                self.config.common.default_priority,
                                self.formatter.clone(),
                            )) as Box<dyn Issue>)
                        }),
                )
            })
            .try_flatten()
            .boxed()
    }
}

/// Conduit and transport failures become an empty result; decode failures propagate.
fn tolerate_conduit_error<T>(result: Result<Vec<T>>, what: &str) -> Result<Vec<T>> {
    match result {
        Err(e) if e.downcast_ref::<ConduitError>().is_some() => {
            tracing::warn!("Could not read {}: {:#}", what, e);
            Ok(Vec::new())
        }
        other => other,
    }
}

impl Service for PhabricatorService {
    fn target(&self) -> &str {
        &self.target
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Phabricator
    }

    fn issues(&self) -> IssueStream<'_> {
        self.tasks().chain(self.revisions()).boxed()
    }
}
