//! Client-side relevance filter: Conduit cannot ask for "everything I am
//! involved in", so records are fetched broadly and matched here.

use super::api::{Revision, Task};
use super::config::PhabricatorConfig;

/// User/project membership test for tasks and revisions.
#[derive(Debug, Clone, Default)]
pub struct MembershipFilter {
    pub user_phids: Vec<String>,
    pub project_phids: Vec<String>,
    pub ignore_cc: bool,
    pub ignore_author: bool,
    pub ignore_owner: bool,
    pub ignore_reviewers: bool,
}

impl MembershipFilter {
    pub fn from_config(config: &PhabricatorConfig) -> Self {
        Self {
            user_phids: config.user_phids.clone(),
            project_phids: config.project_phids.clone(),
            ignore_cc: config.ignore_cc(),
            ignore_author: config.ignore_author(),
            ignore_owner: config.ignore_owner,
            ignore_reviewers: config.ignore_reviewers,
        }
    }

    fn matches_all(&self) -> bool {
        self.user_phids.is_empty() && self.project_phids.is_empty()
    }

    fn any_user<'a>(&self, mut phids: impl Iterator<Item = &'a String>) -> bool {
        phids.any(|phid| self.user_phids.contains(phid))
    }

    fn any_project<'a>(&self, mut phids: impl Iterator<Item = &'a String>) -> bool {
        phids.any(|phid| self.project_phids.contains(phid))
    }

    pub fn matches_task(&self, task: &Task) -> bool {
        if self.matches_all() {
            return true;
        }

        let mut roles: Vec<&String> = Vec::new();
        if !self.ignore_cc {
            roles.extend(&task.cc_phids);
        }
        if !self.ignore_owner {
            roles.extend(&task.owner_phid);
        }
        if !self.ignore_author {
            roles.extend(&task.author_phid);
        }

        self.any_user(roles.into_iter()) || self.any_project(task.project_phids.iter())
    }

    pub fn matches_revision(&self, revision: &Revision) -> bool {
        if self.matches_all() {
            return true;
        }

        let mut roles: Vec<&String> = Vec::new();
        if !self.ignore_reviewers {
            roles.extend(&revision.reviewers);
        }
        if !self.ignore_cc {
            roles.extend(&revision.ccs);
        }
        if !self.ignore_author {
            roles.extend(&revision.author_phid);
        }

        let projects = revision
            .projects
            .iter()
            .flatten()
            .chain(&revision.repository_phid);
        self.any_user(roles.into_iter()) || self.any_project(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(owner: Option<&str>, ccs: &[&str], author: Option<&str>, projects: &[&str]) -> Task {
        Task {
            phid: "PHID-TASK-1".into(),
            title: "t".into(),
            uri: "https://phab/T1".into(),
            priority: None,
            owner_phid: owner.map(String::from),
            cc_phids: ccs.iter().map(|s| s.to_string()).collect(),
            author_phid: author.map(String::from),
            project_phids: projects.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn revision(reviewers: &[&str], ccs: &[&str], author: &str) -> Revision {
        Revision {
            title: "r".into(),
            uri: "https://phab/D1".into(),
            author_phid: Some(author.into()),
            reviewers: reviewers.iter().map(|s| s.to_string()).collect(),
            ccs: ccs.iter().map(|s| s.to_string()).collect(),
            repository_phid: Some("PHID-REPO-1".into()),
            projects: None,
        }
    }

    fn users(phids: &[&str]) -> MembershipFilter {
        MembershipFilter {
            user_phids: phids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = MembershipFilter::default();
        assert!(filter.matches_task(&task(None, &[], None, &[])));
        assert!(filter.matches_revision(&revision(&[], &[], "U9")));
    }

    #[test]
    fn test_owner_scenario() {
        let t = task(Some("U1"), &[], Some("U2"), &[]);
        assert!(users(&["U1"]).matches_task(&t));

        let ignoring_owner = MembershipFilter {
            ignore_owner: true,
            ..users(&["U1"])
        };
        assert!(!ignoring_owner.matches_task(&t));
    }

    #[test]
    fn test_ignore_cc_drops_cc_only_matches() {
        let t = task(Some("U3"), &["U1"], Some("U4"), &[]);
        assert!(users(&["U1"]).matches_task(&t));

        let ignoring_cc = MembershipFilter {
            ignore_cc: true,
            ..users(&["U1"])
        };
        assert!(!ignoring_cc.matches_task(&t));

        let r = revision(&[], &["U1"], "U4");
        assert!(users(&["U1"]).matches_revision(&r));
        assert!(!ignoring_cc.matches_revision(&r));
    }

    #[test]
    fn test_ignore_author_and_reviewers() {
        let r = revision(&["U1"], &[], "U2");
        assert!(users(&["U1"]).matches_revision(&r));
        let ignoring_reviewers = MembershipFilter {
            ignore_reviewers: true,
            ..users(&["U1"])
        };
        assert!(!ignoring_reviewers.matches_revision(&r));

        let t = task(None, &[], Some("U2"), &[]);
        assert!(users(&["U2"]).matches_task(&t));
        let ignoring_author = MembershipFilter {
            ignore_author: true,
            ..users(&["U2"])
        };
        assert!(!ignoring_author.matches_task(&t));
    }

    #[test]
    fn test_project_membership() {
        let filter = MembershipFilter {
            project_phids: vec!["PHID-PROJ-1".into()],
            ..Default::default()
        };
        assert!(filter.matches_task(&task(None, &[], None, &["PHID-PROJ-1"])));
        assert!(!filter.matches_task(&task(Some("U1"), &[], None, &["PHID-PROJ-2"])));

        let mut r = revision(&[], &[], "U1");
        assert!(!filter.matches_revision(&r));
        r.projects = Some(vec!["PHID-PROJ-1".into()]);
        assert!(filter.matches_revision(&r));

        let by_repo = MembershipFilter {
            project_phids: vec!["PHID-REPO-1".into()],
            ..Default::default()
        };
        assert!(by_repo.matches_revision(&revision(&[], &[], "U1")));
    }

    #[test]
    fn test_user_or_project_either_matches() {
        let filter = MembershipFilter {
            user_phids: vec!["U1".into()],
            project_phids: vec!["PHID-PROJ-1".into()],
            ..Default::default()
        };
        assert!(filter.matches_task(&task(Some("U1"), &[], None, &[])));
        assert!(filter.matches_task(&task(None, &[], None, &["PHID-PROJ-1"])));
        assert!(!filter.matches_task(&task(Some("U2"), &[], None, &["PHID-PROJ-2"])));
    }
}
