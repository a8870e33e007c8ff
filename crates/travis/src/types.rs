//! Travis API v3 wire types.
//!
//! Only the fields this adapter reads are declared; serde ignores the rest, so
//! new fields added by Travis never break decoding.

use chrono::{DateTime, Utc};
use monitor::{
    BranchName, BuildStatus, CommitSha, ProviderRepository, ProviderUser, ProviderUserId,
    PullRequestBuild, PullRequestNumber, RepositoryName, RepositoryOwner, RepositorySlug,
    Timestamp,
};
use serde::{Deserialize, Deserializer};

/// Travis returns ids as JSON numbers; older endpoints used strings.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    Ok(match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n.to_string(),
        NumberOrString::String(s) => s,
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of a Travis error response (`"@type": "error"`).
#[derive(Debug, Deserialize)]
pub(crate) struct TravisErrorBody {
    #[serde(rename = "@type")]
    pub kind: Option<String>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl TravisErrorBody {
    pub fn is_error(&self) -> bool {
        self.kind.as_deref() == Some("error")
    }

    pub fn message(&self) -> String {
        match (&self.error_type, &self.error_message) {
            (_, Some(message)) => message.clone(),
            (Some(kind), None) => kind.clone(),
            (None, None) => "unspecified error".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct TravisUser {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_syncing: bool,
    #[serde(default)]
    pub github_id: Option<u64>,
}

impl TravisUser {
    pub fn into_provider_user(self) -> Option<ProviderUser> {
        Some(ProviderUser {
            id: ProviderUserId::new(self.id)?,
            login: self.login,
            name: self.name.unwrap_or_default(),
            is_syncing: self.is_syncing,
            identity_id: self.github_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct TravisRepository {
    pub id: u64,
    pub slug: String,
    #[serde(default)]
    pub active: bool,
}

impl TravisRepository {
    /// Falls back to `requested` when Travis returns a slug that does not parse.
    pub fn into_provider_repository(self, requested: &RepositorySlug) -> ProviderRepository {
        ProviderRepository {
            id: self.id,
            slug: RepositorySlug::parse(&self.slug).unwrap_or_else(|| requested.clone()),
            active: self.active,
        }
    }
}

// ---------------------------------------------------------------------------
// Builds
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct TravisBuilds {
    #[serde(default)]
    pub builds: Vec<TravisBuild>,
    #[serde(rename = "@pagination")]
    pub pagination: Option<TravisPagination>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TravisPagination {
    pub next: Option<TravisPageLink>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TravisPageLink {
    #[serde(rename = "@href")]
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TravisBuild {
    pub id: u64,
    pub state: String,
    pub pull_request_number: Option<u64>,
    pub finished_at: Option<DateTime<Utc>>,
    pub repository: TravisBuildRepository,
    pub branch: Option<TravisBranch>,
    pub commit: Option<TravisCommit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TravisBuildRepository {
    pub name: String,
    pub slug: Option<String>,
    pub owner: Option<TravisOwner>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TravisOwner {
    pub login: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TravisBranch {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TravisCommit {
    pub sha: String,
}

impl TravisBuild {
    /// Converts into the canonical model.
    ///
    /// Returns `None` for builds that are not pull-request builds or lack the
    /// owner, branch, or commit needed to identify them.
    pub fn into_pull_request_build(self) -> Option<PullRequestBuild> {
        let number = self.pull_request_number?;
        let owner = self
            .repository
            .owner
            .and_then(|o| o.login.or(o.name))
            .or_else(|| {
                self.repository
                    .slug
                    .as_deref()
                    .and_then(RepositorySlug::parse)
                    .map(|slug| slug.owner().to_string())
            })?;

        Some(PullRequestBuild::new(
            RepositoryOwner::new(owner)?,
            RepositoryName::new(self.repository.name)?,
            PullRequestNumber::new(number),
            BuildStatus::from_provider(&self.state),
            BranchName::new(self.branch?.name)?,
            CommitSha::new(self.commit?.sha)?,
            self.finished_at.map(Timestamp::from_utc),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_numbers_and_strings() {
        let numeric: TravisUser =
            serde_json::from_str(r#"{"id": 4242, "login": "alice", "is_syncing": true}"#).unwrap();
        let textual: TravisUser =
            serde_json::from_str(r#"{"id": "4242", "login": "alice"}"#).unwrap();

        assert_eq!(numeric.id, "4242");
        assert_eq!(textual.id, "4242");
        assert!(numeric.is_syncing);
        assert!(!textual.is_syncing);
    }

    #[test]
    fn null_user_name_becomes_empty() {
        let user: TravisUser =
            serde_json::from_str(r#"{"id": 1, "login": "bob", "name": null}"#).unwrap();
        let user = user.into_provider_user().unwrap();
        assert_eq!(user.name, "");
    }

    #[test]
    fn error_body_prefers_message_over_type() {
        let body: TravisErrorBody = serde_json::from_str(
            r#"{"@type": "error", "error_type": "not_found", "error_message": "repository not found (or insufficient access)"}"#,
        )
        .unwrap();
        assert!(body.is_error());
        assert_eq!(body.message(), "repository not found (or insufficient access)");
    }

    #[test]
    fn build_owner_falls_back_to_slug_prefix() {
        let build: TravisBuild = serde_json::from_str(
            r#"{
                "id": 10, "state": "failed", "pull_request_number": 4,
                "finished_at": "2024-03-01T10:00:00Z",
                "repository": {"name": "course", "slug": "octocat/course"},
                "branch": {"name": "task-2"}, "commit": {"sha": "deadbeef"}
            }"#,
        )
        .unwrap();

        let build = build.into_pull_request_build().unwrap();
        assert_eq!(build.repository_owner().as_str(), "octocat");
        assert_eq!(build.status(), BuildStatus::Failed);
        assert!(build.finished_at().is_some());
    }

    #[test]
    fn push_builds_are_not_pull_request_builds() {
        let build: TravisBuild = serde_json::from_str(
            r#"{
                "id": 11, "state": "passed", "pull_request_number": null,
                "repository": {"name": "course", "slug": "octocat/course"},
                "branch": {"name": "main"}, "commit": {"sha": "deadbeef"}
            }"#,
        )
        .unwrap();

        assert!(build.into_pull_request_build().is_none());
    }
}
