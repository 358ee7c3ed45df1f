//! # Priority Store Capability
//!
//! The only shared resource of the system. Engines receive an implementation
//! explicitly (usually as `Arc<S>`) instead of reaching for a global handle.
//!
//! Writes go through a [`PriorityTransaction`]: nothing it does is visible to
//! readers until [`PriorityTransaction::commit`], and dropping it without a
//! commit discards everything.

use std::collections::BTreeSet;
use std::future::Future;

use super::error::Result;
use super::models::{ListId, NetworkScore, PriorityListRow};

/// Storage operations for priority lists.
///
/// Implementations must be thread-safe (`Send + Sync`); every returned
/// future is `Send` so engines can run inside spawned tasks and axum handlers.
pub trait PriorityStore: Send + Sync {
    type Transaction: PriorityTransaction;

    /// Opens a read-committed transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;

    /// Committed networks of one list by descending score, ties by name.
    /// An unknown key yields an empty vector.
    fn list_networks_ordered_by_score_desc(
        &self,
        country_code: &str,
        ad_type: &str,
    ) -> impl Future<Output = Result<Vec<NetworkScore>>> + Send;

    /// Every list joined to its networks, ordered by country code, ad type
    /// and descending score.
    fn list_priority_rows(&self) -> impl Future<Output = Result<Vec<PriorityListRow>>> + Send;
}

/// Write steps of a replacement upsert.
pub trait PriorityTransaction: Send {
    /// Inserts the list for the key or refreshes its `last_updated`.
    /// Concurrent calls with the same key never create a second list.
    fn find_or_create_list(
        &mut self,
        country_code: &str,
        ad_type: &str,
    ) -> impl Future<Output = Result<ListId>> + Send;

    /// Inserts the network or overwrites its score, keyed by (list, name).
    fn upsert_network(
        &mut self,
        list_id: ListId,
        network_name: &str,
        score: f32,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Deletes every network of the list whose name is not in `keep_names`.
    /// Returns the number of deleted networks.
    fn delete_networks_not_in(
        &mut self,
        list_id: ListId,
        keep_names: &BTreeSet<String>,
    ) -> impl Future<Output = Result<u64>> + Send;

    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}
