//! # In-Memory Priority Store
//!
//! A [`PriorityStore`] backed by process memory. Transactions stage their
//! writes per list and publish them in one step on commit, which gives the
//! same visibility rules as a read-committed database transaction: readers
//! see either the list before the commit or after it, never in between.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::{MediationError, Result};
use super::models::{ListId, ListKey, NetworkScore, PriorityListRow};
use super::store::{PriorityStore, PriorityTransaction};

#[derive(Debug, Clone)]
struct StoredList {
    id: ListId,
    last_updated: DateTime<Utc>,
    networks: HashMap<String, f32>,
}

impl StoredList {
    fn ordered_networks(&self) -> Vec<NetworkScore> {
        let mut networks: Vec<NetworkScore> = self
            .networks
            .iter()
            .map(|(name, score)| NetworkScore::new(name, *score))
            .collect();
        networks.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.network_name.cmp(&b.network_name))
        });
        networks
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    lists: BTreeMap<ListKey, StoredList>,
    /// Id of every key ever opened, committed or not. Transactions racing
    /// on a new key share one id, as they would through a unique index.
    ids: HashMap<ListKey, ListId>,
    last_id: ListId,
}

impl MemoryState {
    fn list_id(&mut self, key: &ListKey) -> ListId {
        if let Some(id) = self.ids.get(key) {
            return *id;
        }
        self.last_id += 1;
        self.ids.insert(key.clone(), self.last_id);
        self.last_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPriorityStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryPriorityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed `last_updated` of a list, if the list exists.
    pub async fn last_updated(&self, country_code: &str, ad_type: &str) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state
            .lists
            .get(&ListKey::new(country_code, ad_type))
            .map(|list| list.last_updated)
    }

    /// Number of committed lists.
    pub async fn list_count(&self) -> usize {
        self.state.lock().await.lists.len()
    }
}

impl PriorityStore for InMemoryPriorityStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            staged: BTreeMap::new(),
        })
    }

    async fn list_networks_ordered_by_score_desc(
        &self,
        country_code: &str,
        ad_type: &str,
    ) -> Result<Vec<NetworkScore>> {
        let state = self.state.lock().await;
        Ok(state
            .lists
            .get(&ListKey::new(country_code, ad_type))
            .map(StoredList::ordered_networks)
            .unwrap_or_default())
    }

    async fn list_priority_rows(&self) -> Result<Vec<PriorityListRow>> {
        let state = self.state.lock().await;
        let mut rows = Vec::new();
        for (key, list) in &state.lists {
            let networks = list.ordered_networks();
            if networks.is_empty() {
                rows.push(PriorityListRow {
                    country_code: key.country_code.clone(),
                    ad_type: key.ad_type.clone(),
                    last_updated: list.last_updated,
                    network: None,
                });
            }
            for network in networks {
                rows.push(PriorityListRow {
                    country_code: key.country_code.clone(),
                    ad_type: key.ad_type.clone(),
                    last_updated: list.last_updated,
                    network: Some(network),
                });
            }
        }
        Ok(rows)
    }
}

/// Staged writes of one in-memory transaction, keyed by list id.
pub struct InMemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    staged: BTreeMap<ListId, (ListKey, StoredList)>,
}

impl InMemoryTransaction {
    fn staged_list(&mut self, operation: &'static str, list_id: ListId) -> Result<&mut StoredList> {
        self.staged
            .get_mut(&list_id)
            .map(|(_, list)| list)
            .ok_or_else(|| {
                MediationError::storage(
                    operation,
                    format!("list {} was not opened in this transaction", list_id),
                )
            })
    }
}

impl PriorityTransaction for InMemoryTransaction {
    async fn find_or_create_list(&mut self, country_code: &str, ad_type: &str) -> Result<ListId> {
        let key = ListKey::new(country_code, ad_type);
        let now = Utc::now();

        if let Some((_, list)) = self.staged.values_mut().find(|(k, _)| *k == key) {
            list.last_updated = now;
            return Ok(list.id);
        }

        let list = {
            let mut state = self.state.lock().await;
            match state.lists.get(&key).cloned() {
                Some(mut list) => {
                    list.last_updated = now;
                    list
                }
                None => StoredList {
                    id: state.list_id(&key),
                    last_updated: now,
                    networks: HashMap::new(),
                },
            }
        };
        let id = list.id;
        self.staged.insert(id, (key, list));
        Ok(id)
    }

    async fn upsert_network(&mut self, list_id: ListId, network_name: &str, score: f32) -> Result<()> {
        let list = self.staged_list("upsert_network", list_id)?;
        list.networks.insert(network_name.to_string(), score);
        Ok(())
    }

    async fn delete_networks_not_in(
        &mut self,
        list_id: ListId,
        keep_names: &BTreeSet<String>,
    ) -> Result<u64> {
        let list = self.staged_list("delete_networks_not_in", list_id)?;
        let before = list.networks.len();
        list.networks.retain(|name, _| keep_names.contains(name));
        Ok((before - list.networks.len()) as u64)
    }

    async fn commit(self) -> Result<()> {
        let mut state = self.state.lock().await;
        for (_, (key, staged)) in self.staged {
            // A concurrent transaction may have committed the key first; its
            // row has the same id and takes this transaction's contents.
            match state.lists.entry(key) {
                Entry::Occupied(mut entry) => {
                    let current = entry.get_mut();
                    current.last_updated = staged.last_updated;
                    current.networks = staged.networks;
                }
                Entry::Vacant(entry) => {
                    entry.insert(staged);
                }
            }
        }
        debug!(lists = state.lists.len(), "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        debug!(staged = self.staged.len(), "in-memory transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keep(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = InMemoryPriorityStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.find_or_create_list("SI", "banner").await.unwrap();
        tx.upsert_network(id, "AdMob", 3.0).await.unwrap();

        assert!(store
            .list_networks_ordered_by_score_desc("SI", "banner")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.list_count().await, 0);

        tx.commit().await.unwrap();
        assert_eq!(
            store
                .list_networks_ordered_by_score_desc("SI", "banner")
                .await
                .unwrap(),
            vec![NetworkScore::new("AdMob", 3.0)]
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_writes() {
        let store = InMemoryPriorityStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.find_or_create_list("SI", "banner").await.unwrap();
        tx.upsert_network(id, "AdMob", 3.0).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.list_count().await, 0);
    }

    #[tokio::test]
    async fn test_find_or_create_reuses_committed_id() {
        let store = InMemoryPriorityStore::new();

        let mut tx = store.begin().await.unwrap();
        let first = tx.find_or_create_list("SI", "banner").await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let second = tx.find_or_create_list("SI", "banner").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(tx.find_or_create_list("SI", "banner").await.unwrap(), first);
        let other = tx.find_or_create_list("si", "banner").await.unwrap();
        assert_ne!(other, first);
    }

    #[tokio::test]
    async fn test_concurrent_creation_keeps_single_list() {
        let store = InMemoryPriorityStore::new();

        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        let id_a = a.find_or_create_list("SI", "banner").await.unwrap();
        let id_b = b.find_or_create_list("SI", "banner").await.unwrap();
        assert_eq!(id_a, id_b);
        a.upsert_network(id_a, "AdMob", 1.0).await.unwrap();
        b.upsert_network(id_b, "Facebook", 2.0).await.unwrap();
        a.commit().await.unwrap();
        b.commit().await.unwrap();

        assert_eq!(store.list_count().await, 1);
        assert_eq!(
            store
                .list_networks_ordered_by_score_desc("SI", "banner")
                .await
                .unwrap(),
            vec![NetworkScore::new("Facebook", 2.0)]
        );
    }

    #[tokio::test]
    async fn test_delete_not_in_counts_removed() {
        let store = InMemoryPriorityStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.find_or_create_list("SI", "banner").await.unwrap();
        for (name, score) in [("A", 1.0), ("B", 2.0), ("C", 3.0)] {
            tx.upsert_network(id, name, score).await.unwrap();
        }
        assert_eq!(tx.delete_networks_not_in(id, &keep(&["B"])).await.unwrap(), 2);
        assert_eq!(tx.delete_networks_not_in(id, &keep(&[])).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_list_id_is_storage_error() {
        let store = InMemoryPriorityStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.upsert_network(42, "AdMob", 1.0).await.unwrap_err();
        assert!(matches!(
            err,
            MediationError::Storage { operation: "upsert_network", .. }
        ));
    }

    #[tokio::test]
    async fn test_ordering_breaks_ties_by_name() {
        let store = InMemoryPriorityStore::new();
        let mut tx = store.begin().await.unwrap();
        let id = tx.find_or_create_list("SI", "banner").await.unwrap();
        tx.upsert_network(id, "Zeta", 5.0).await.unwrap();
        tx.upsert_network(id, "Alpha", 5.0).await.unwrap();
        tx.upsert_network(id, "Top", 9.0).await.unwrap();
        tx.commit().await.unwrap();

        let names: Vec<String> = store
            .list_networks_ordered_by_score_desc("SI", "banner")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.network_name)
            .collect();
        assert_eq!(names, vec!["Top", "Alpha", "Zeta"]);
    }
}
