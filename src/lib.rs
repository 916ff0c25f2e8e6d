//! Singer tap for the SparkThink GraphQL API.
//!
//! ```text
//!             ┌──────────────┐
//!             │ Authenticator│  cached bearer token, refreshed on expiry
//!             └──────┬───────┘
//!                    │ TokenProvider
//! ┌──────────┐  ┌────▼─────────┐  ┌───────────┐  ┌──────────────┐
//! │ streams  │─▶│ GraphqlClient│◀─│ Paginator │◀─│ FanOut       │
//! │ (data)   │  │ (PageSource) │  │ (cursors) │  │ (project ids)│
//! └──────────┘  └──────────────┘  └───────────┘  └──────┬───────┘
//!                                                       │ post_process
//!                                                ┌──────▼───────┐
//!                                                │ Tap          │──▶ Singer on stdout
//!                                                └──────────────┘
//! ```
//!
//! Streams are declared as data in [`streams`]. The [`Tap`] walks them in
//! order; each stream's partitions are extracted one after another and every
//! page is a single GraphQL round trip.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod graphql;
pub mod jsonpath;
pub mod pagination;
pub mod partition;
pub mod post_process;
pub mod retry;
pub mod singer;
pub mod streams;
pub mod tap;

#[cfg(test)]
mod testing;

pub use auth::{Authenticator, Token, TokenProvider};
pub use catalog::Catalog;
pub use client::GraphqlClient;
pub use config::{load_config, FailurePolicy, TapConfig};
pub use error::{Result, TapError};
pub use pagination::{PageSource, Paginator};
pub use partition::Partition;
pub use singer::SingerWriter;
pub use tap::{SyncSummary, Tap};
