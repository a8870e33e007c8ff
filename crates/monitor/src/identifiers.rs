//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a local [`UserName`] with an upstream [`IdentityUserId`] even though both are
//! strings under the hood.
//!
//! Secrets ([`AccessToken`], [`IdentityToken`]) live here too. They are never
//! printed: their `Debug` output is redacted and they deliberately do not
//! implement `Display`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A string that does not form a valid identifier of the named kind.
///
/// Returned when deserialising, so malformed data cannot bypass the checks
/// the `new` and `parse` constructors apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct InvalidIdentifier {
    pub kind: &'static str,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, and a
// TryFrom<String> that serde routes deserialisation through.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidIdentifier;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                if value.is_empty() {
                    return Err(InvalidIdentifier { kind: stringify!($name), value });
                }
                Ok(Self(value))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for secret String-wrapped newtypes.
// Generates: struct, new() rejecting blank values, expose(), redacted Debug.
// ---------------------------------------------------------------------------
macro_rules! secret {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            /// Wraps a secret value, returning `None` if it is empty or whitespace.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the raw secret. Only transport code should call this.
            pub fn expose(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(concat!(stringify!($name), "(<redacted>)"))
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: provider-integer-backed
// ---------------------------------------------------------------------------

/// Number of a pull request on the repository-hosting provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PullRequestNumber(u64);

impl PullRequestNumber {
    /// Creates a new pull request number from a raw integer.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PullRequestNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Correlates all log output of a single activation or deactivation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationId(Uuid);

impl ActivationId {
    /// Generates a new random activation identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ActivationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Nickname of a user of this application (the local account).
    UserName
}

string_id! {
    /// Names a CI provider for token scoping (e.g. `"travis"`).
    ProviderName
}

string_id! {
    /// Identifier the CI provider assigns to its own user record.
    ///
    /// Some providers return this as a number; adapters store its decimal form.
    ProviderUserId
}

string_id! {
    /// Login of the user on the upstream identity provider (the repository host).
    ///
    /// Doubles as the owner segment of the repositories being activated.
    IdentityUserId
}

string_id! {
    /// Bare repository name without its owner (e.g. `"algorithms-course"`).
    RepositoryName
}

string_id! {
    /// Owner segment of a repository (user or organisation login).
    RepositoryOwner
}

string_id! {
    /// A Git branch name (e.g. `"main"`, `"student/task-3"`).
    BranchName
}

string_id! {
    /// A Git commit SHA.
    CommitSha
}

// ---------------------------------------------------------------------------
// Repository slug
// ---------------------------------------------------------------------------

/// Identifies a repository in `"owner/name"` format.
///
/// Both segments are guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct RepositorySlug(String);

impl RepositorySlug {
    /// Builds a slug from an owner login and a repository name.
    pub fn from_parts(owner: &IdentityUserId, name: &RepositoryName) -> Self {
        Self(format!("{}/{}", owner.as_str(), name.as_str()))
    }

    /// Parses an `"owner/name"` string.
    ///
    /// Returns `None` if there is no `/` or either side of the first `/` is empty.
    pub fn parse(value: &str) -> Option<Self> {
        let (owner, name) = value.split_once('/')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self(value.to_string()))
    }

    /// Returns the owner segment.
    pub fn owner(&self) -> &str {
        self.0.split_once('/').map_or("", |(owner, _)| owner)
    }

    /// Returns the repository name segment.
    pub fn name(&self) -> &str {
        self.0.split_once('/').map_or("", |(_, name)| name)
    }

    /// Returns the slug as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepositorySlug {
    type Error = InvalidIdentifier;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(InvalidIdentifier {
            kind: "RepositorySlug",
            value,
        })
    }
}

impl std::fmt::Display for RepositorySlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

secret! {
    /// Opaque CI-provider access token scoped to one (local user, provider) pair.
    AccessToken
}

secret! {
    /// Proof-of-identity token for the upstream identity provider (an OAuth
    /// access token for the repository host).
    IdentityToken
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_reject_empty_values() {
        assert!(UserName::new("").is_none());
        assert_eq!(UserName::new("alice").map(|u| u.to_string()), Some("alice".to_string()));
    }

    #[test]
    fn slug_from_parts_joins_owner_and_name() {
        let owner = IdentityUserId::new("octocat").expect("owner");
        let name = RepositoryName::new("course").expect("name");
        let slug = RepositorySlug::from_parts(&owner, &name);

        assert_eq!(slug.as_str(), "octocat/course");
        assert_eq!(slug.owner(), "octocat");
        assert_eq!(slug.name(), "course");
    }

    #[test]
    fn slug_parse_requires_both_segments() {
        assert!(RepositorySlug::parse("octocat").is_none());
        assert!(RepositorySlug::parse("/course").is_none());
        assert!(RepositorySlug::parse("octocat/").is_none());
        assert!(RepositorySlug::parse("octocat/course").is_some());
    }

    #[test]
    fn deserialising_an_empty_string_id_fails() {
        let err = serde_json::from_str::<BranchName>(r#""""#).unwrap_err();
        assert!(err.to_string().contains("invalid BranchName"));

        let branch: BranchName = serde_json::from_str(r#""main""#).expect("branch");
        assert_eq!(branch.as_str(), "main");
    }

    #[test]
    fn deserialising_a_malformed_slug_fails() {
        assert!(serde_json::from_str::<RepositorySlug>(r#""octocat""#).is_err());
        assert!(serde_json::from_str::<RepositorySlug>(r#""octocat/""#).is_err());

        let slug: RepositorySlug = serde_json::from_str(r#""octocat/course""#).expect("slug");
        assert_eq!(slug.name(), "course");
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let token = AccessToken::new("s3cr3t").expect("token");
        let rendered = format!("{token:?}");

        assert_eq!(rendered, "AccessToken(<redacted>)");
        assert!(!rendered.contains("s3cr3t"));
        assert_eq!(token.expose(), "s3cr3t");
    }

    #[test]
    fn secrets_reject_blank_values() {
        assert!(IdentityToken::new("   ").is_none());
        assert!(AccessToken::new("").is_none());
    }
}
