//! # lib_mediation
//!
//! Per (country, ad-type) priority lists of third-party ad networks.
//!
//! The `priority` module holds the two engines that matter: the replacement
//! upsert that makes a stored list match a request exactly, and the
//! selection engine that turns a stored list into the sequence served to a
//! given client. Both talk to storage only through the
//! [`priority::store::PriorityStore`] capability, so they run the same over
//! PostgreSQL (`connections` feature) and the in-memory store.
//!
//! Optional features follow the folder layout:
//! - `configs`: CLI/env configuration.
//! - `connections`: pooled PostgreSQL store.
//! - `loggers`: tracing subscriber setup.

pub mod priority;

#[cfg(feature = "configs")]
pub mod configs;

#[cfg(feature = "connections")]
pub mod connections;

#[cfg(feature = "loggers")]
pub mod loggers;

pub use priority::error::{ErrorKind, MediationError};
pub use priority::memory::InMemoryPriorityStore;
pub use priority::models::{
    NetworkScore, PriorityListSummary, SelectionRequest, UpdateNetworksRequest, UpsertOutcome,
};
pub use priority::service::MediationService;
pub use priority::store::{PriorityStore, PriorityTransaction};
