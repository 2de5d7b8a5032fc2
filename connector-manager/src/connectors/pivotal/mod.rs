pub mod api;
pub mod config;
pub mod transformer;

use anyhow::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tasksync::config::TargetSection;
use tasksync::convert::replace_non_alphanumeric;
use tasksync::description::Formatter;
use tasksync::Issue;
use tracing::debug;

use self::api::{PivotalClient, Project, Story};
use self::config::PivotalConfig;
use self::transformer::{format_blockers, task_entries, usernames, PivotalIssue, StoryExtra};
use crate::http::{build_client, TlsOptions};
use crate::registry::{ServiceContext, ServiceKind};
use crate::{IssueStream, Service};

/// Project plus its member directory, shared by every story in it.
struct ProjectScope {
    project: Project,
    people: HashMap<u64, String>,
}

/// Pivotal Tracker service: projects → search → per-story tasks and blockers.
pub struct PivotalService {
    target: String,
    config: PivotalConfig,
    client: PivotalClient,
    formatter: Formatter,
}

impl PivotalService {
    /// Validates the section and resolves the API token.
    pub async fn connect(section: &TargetSection, ctx: &ServiceContext) -> Result<Self> {
        let config = PivotalConfig::from_section(section)?;
        let token = ctx
            .credentials
            .resolve(
                &config.token,
                &config.keyring_service(),
                &config.user_id.to_string(),
            )
            .await?;

        let http_client = build_client(TlsOptions::default())?;
        let client = PivotalClient::new(http_client, config.api_base(), token);

        Ok(Self {
            target: section.name.clone(),
            formatter: ctx.general.formatter(&config.common),
            config,
            client,
        })
    }

    fn includes_project(&self, project: &Project) -> bool {
        let id = project.id.to_string();
        !self
            .config
            .exclude_projects
            .iter()
            .any(|excluded| *excluded == id || *excluded == project.name)
    }

    fn includes_story(&self, story: &Story) -> bool {
        let id = story.id.to_string();
        if self.config.exclude_stories.contains(&id) {
            return false;
        }
        !story
            .labels
            .iter()
            .any(|label| self.config.exclude_tags.contains(&label.name))
    }

    async fn scope(&self, project: Project) -> Result<(Arc<ProjectScope>, Vec<Story>)> {
        let stories = self
            .client
            .search_stories(project.id, &self.config.query())
            .await?;
        debug!("Found {} stories in project {}", stories.len(), project.name);
        let people = self.client.fetch_usernames(project.id).await?;
        Ok((Arc::new(ProjectScope { project, people }), stories))
    }

    async fn issue(&self, scope: Arc<ProjectScope>, story: Story) -> Result<Box<dyn Issue>> {
        let project_id = scope.project.id;
        let tasks = self.client.fetch_tasks(project_id, story.id).await?;
        let blockers = if self.config.import_blockers {
            let blockers = self.client.fetch_blockers(project_id, story.id).await?;
            Some(format_blockers(&blockers))
        } else {
            None
        };

        let tags = if self.config.import_labels_as_tags {
            story
                .labels
                .iter()
                .map(|label| replace_non_alphanumeric(&label.name, '_'))
                .collect()
        } else {
            Vec::new()
        };
        let requester: Vec<u64> = story.requested_by_id.into_iter().collect();
        let extra = StoryExtra {
            annotations: self
                .formatter
                .annotations(task_entries(&tasks), Some(story.url.as_str())),
            blockers,
            owners: usernames(&story.owner_ids, &scope.people),
            requesters: usernames(&requester, &scope.people),
            tags,
        };

        let issue = PivotalIssue::new(
            story,
            &scope.project,
            extra,
            self.config.common.default_priority,
            self.formatter.clone(),
        )?;
        Ok(Box::new(issue))
    }
}

impl Service for PivotalService {
    fn target(&self) -> &str {
        &self.target
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::PivotalTracker
    }

    fn issues(&self) -> IssueStream<'_> {
        stream::once(self.client.fetch_projects(&self.config.account_ids))
            .map_ok(move |projects| {
                stream::iter(
                    projects
                        .into_iter()
                        .filter(move |p| self.includes_project(p))
                        .map(Ok::<_, anyhow::Error>),
                )
            })
            .try_flatten()
            .and_then(move |project| self.scope(project))
            .map_ok(move |(scope, stories)| {
                stream::iter(
                    stories
                        .into_iter()
                        .filter(move |s| self.includes_story(s))
                        .map(move |story| Ok::<_, anyhow::Error>((scope.clone(), story))),
                )
            })
            .try_flatten()
            .and_then(move |(scope, story)| self.issue(scope, story))
            .boxed()
    }
}
