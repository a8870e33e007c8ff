//! Canonical, provider-independent build events.
//!
//! Webhook payloads and API build listings are both normalised into
//! [`BuildEvent`]. Downstream consumers (persistence, statistics) depend only
//! on these types, never on a provider's wire format.

use serde::{Deserialize, Serialize};

use crate::{BranchName, CommitSha, PullRequestNumber, RepositoryName, RepositoryOwner, Timestamp};

// ---------------------------------------------------------------------------
// Build status
// ---------------------------------------------------------------------------

/// Lifecycle state of a build.
///
/// Closed set. Provider strings that match none of the known states map to
/// [`BuildStatus::Unknown`] instead of failing the parse, so a provider adding
/// a new state never breaks ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Build was registered but has not started.
    Created,
    /// Build is running.
    Started,
    /// Build finished and every job passed.
    Passed,
    /// Build finished and at least one job failed its tests.
    Failed,
    /// Build finished abnormally (infrastructure or configuration error).
    Errored,
    /// Build was cancelled before finishing.
    Canceled,
    /// Provider reported a state this system does not recognise.
    Unknown,
}

impl BuildStatus {
    /// Maps a provider status string, case-insensitively.
    pub fn from_provider(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "created" | "received" | "queued" => Self::Created,
            "started" | "running" => Self::Started,
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            "errored" => Self::Errored,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` if the build reached a terminal state.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Failed | Self::Errored | Self::Canceled
        )
    }

    /// Returns `true` only for [`BuildStatus::Passed`].
    pub fn is_success(self) -> bool {
        self == Self::Passed
    }

    /// Returns the canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pull request build
// ---------------------------------------------------------------------------

/// One build of a pull request's head commit.
///
/// Immutable once constructed: fields are private and exposed through
/// accessors only. The repository, branch, and commit are held by value;
/// joining them to internal entities is the consumer's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestBuild {
    repository_owner: RepositoryOwner,
    repository_name: RepositoryName,
    pull_request_number: PullRequestNumber,
    status: BuildStatus,
    branch: BranchName,
    commit_sha: CommitSha,
    finished_at: Option<Timestamp>,
}

impl PullRequestBuild {
    pub fn new(
        repository_owner: RepositoryOwner,
        repository_name: RepositoryName,
        pull_request_number: PullRequestNumber,
        status: BuildStatus,
        branch: BranchName,
        commit_sha: CommitSha,
        finished_at: Option<Timestamp>,
    ) -> Self {
        Self {
            repository_owner,
            repository_name,
            pull_request_number,
            status,
            branch,
            commit_sha,
            finished_at,
        }
    }

    pub fn repository_owner(&self) -> &RepositoryOwner {
        &self.repository_owner
    }

    pub fn repository_name(&self) -> &RepositoryName {
        &self.repository_name
    }

    pub fn pull_request_number(&self) -> PullRequestNumber {
        self.pull_request_number
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    pub fn commit_sha(&self) -> &CommitSha {
        &self.commit_sha
    }

    /// `None` while the build is still running or when the provider omitted it.
    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }
}

// ---------------------------------------------------------------------------
// Build event
// ---------------------------------------------------------------------------

/// A normalised build notification.
///
/// Only pull-request builds are modelled. Other provider event types (pushes,
/// cron and API-triggered builds) are recognised at the decoding boundary and
/// deliberately dropped there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildEvent {
    /// Build of a pull request.
    PullRequest(PullRequestBuild),
}
