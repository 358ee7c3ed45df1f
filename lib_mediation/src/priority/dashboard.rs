use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::error::{bounded, Result};
use super::models::{ListKey, PriorityListRow, PriorityListSummary};
use super::store::PriorityStore;

/// Read-only view of every priority list for the dashboard.
pub struct DashboardAggregator<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S: PriorityStore> DashboardAggregator<S> {
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn priority_lists(&self) -> Result<Vec<PriorityListSummary>> {
        let rows = bounded("dashboard", self.timeout, self.store.list_priority_rows()).await?;
        Ok(group_priority_rows(rows))
    }
}

/// Groups join rows by (country code, ad type).
///
/// Output is sorted by key; networks keep the row order, which the store
/// returns by descending score.
pub fn group_priority_rows(rows: Vec<PriorityListRow>) -> Vec<PriorityListSummary> {
    let mut groups: BTreeMap<ListKey, PriorityListSummary> = BTreeMap::new();

    for row in rows {
        let key = ListKey::new(&row.country_code, &row.ad_type);
        let group = groups.entry(key).or_insert_with(|| PriorityListSummary {
            country_code: row.country_code,
            ad_type: row.ad_type,
            last_updated: row.last_updated,
            networks: Vec::new(),
        });
        if let Some(network) = row.network {
            group.networks.push(network);
        }
    }

    groups.into_values().collect()
}
