//! Travis CI adapter for the CI monitor.
//!
//! Implements [`monitor::ProviderClient`] against the Travis CI API v3 and
//! [`monitor::LoginExchange`] through either the `travis` CLI or the
//! `/auth/github` endpoint.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP goes through the [`HttpTransport`] seam so the
//! client is unit tested against an in-memory transport.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`http`] | `HttpTransport` trait, request/response types, `ReqwestTransport` |
//! | [`client`] | `TravisClient` |
//! | [`login`] | `CliLoginExchange`, `ApiLoginExchange` |
//! | `types` | Travis wire types (crate-private) |

pub mod client;
pub mod http;
pub mod login;
mod types;

pub use client::{TravisClient, API_VERSION, DEFAULT_BASE_URL, DEFAULT_MAX_BUILD_PAGES};
pub use http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use login::{parse_token_output, ApiLoginExchange, CliLoginExchange, DEFAULT_CLI_TIMEOUT};
