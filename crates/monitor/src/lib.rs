//! Core domain for the CI monitor.
//!
//! This crate contains every domain concept, newtype identifier, build-event
//! type, and error type shared by the workspace. Infrastructure crates
//! implement the port traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Domain model + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers and secrets (`UserName`, `RepositorySlug`, `AccessToken`, etc.) |
//! | [`types`] | Activation input and provider-side records (`ActivationRequest`, `ProviderUser`, etc.) |
//! | [`events`] | Canonical build events (`BuildEvent`, `PullRequestBuild`, `BuildStatus`) |
//! | [`errors`] | Provider, credential, and activation error types |
//! | [`ports`] | `ProviderClient`, `TokenStore`, `LoginExchange` |

pub mod errors;
pub mod events;
pub mod identifiers;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ActivationError, CredentialError, ProviderError};
pub use events::{BuildEvent, BuildStatus, PullRequestBuild};
pub use identifiers::{
    AccessToken, ActivationId, BranchName, CommitSha, IdentityToken, IdentityUserId,
    InvalidIdentifier, ProviderName, ProviderUserId, PullRequestNumber, RepositoryName,
    RepositoryOwner, RepositorySlug, UserName,
};
pub use ports::{LoginExchange, ProviderClient, TokenStore};
pub use types::{ActivationRequest, ProviderRepository, ProviderUser, Timestamp};
