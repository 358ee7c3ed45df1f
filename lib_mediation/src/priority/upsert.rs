//! # Upsert Engine
//!
//! Replaces the membership and scores of one priority list in a single
//! transaction. After a successful call the stored networks of the list are
//! exactly the distinct names of the request, each with the request's score
//! (the last one given when a name repeats).
//!
//! Steps, all inside one read-committed transaction:
//! 1. insert the list or refresh its `last_updated`;
//! 2. insert or update every requested network;
//! 3. delete the list's networks the request does not name;
//! 4. commit. Any failure rolls everything back before it is surfaced.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{bounded, MediationError, Result};
use super::models::{NetworkScore, UpsertOutcome};
use super::store::{PriorityStore, PriorityTransaction};

pub struct UpsertEngine<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S: PriorityStore> UpsertEngine<S> {
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Makes the list for (`country_code`, `ad_type`) equal to `networks`.
    ///
    /// # Errors
    /// * `Validation` for an empty key part, an empty `networks` slice or an
    ///   empty network name. Nothing is written.
    /// * `Storage` when any step fails; the transaction is rolled back first.
    /// * `Timeout` when the whole operation exceeds the configured wait.
    pub async fn upsert(
        &self,
        country_code: &str,
        ad_type: &str,
        networks: &[NetworkScore],
    ) -> Result<UpsertOutcome> {
        validate_upsert(country_code, ad_type, networks)?;

        let outcome = bounded(
            "upsert",
            self.timeout,
            self.replace_list(country_code, ad_type, networks),
        )
        .await?;

        info!(
            country_code,
            ad_type,
            list_id = outcome.list_id,
            updated = outcome.num_updated_networks,
            removed = outcome.num_removed_networks,
            "priority list replaced"
        );
        Ok(outcome)
    }

    async fn replace_list(
        &self,
        country_code: &str,
        ad_type: &str,
        networks: &[NetworkScore],
    ) -> Result<UpsertOutcome> {
        let mut tx = self.store.begin().await?;

        match apply_replacement(&mut tx, country_code, ad_type, networks).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(country_code, ad_type, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

fn validate_upsert(country_code: &str, ad_type: &str, networks: &[NetworkScore]) -> Result<()> {
    if country_code.is_empty() {
        return Err(MediationError::validation("countryCode", "must not be empty"));
    }
    if ad_type.is_empty() {
        return Err(MediationError::validation("adType", "must not be empty"));
    }
    if networks.is_empty() {
        return Err(MediationError::validation(
            "networks",
            "at least one network with its score is required",
        ));
    }
    if networks.iter().any(|n| n.network_name.is_empty()) {
        return Err(MediationError::validation("networkName", "must not be empty"));
    }
    Ok(())
}

async fn apply_replacement<T: PriorityTransaction>(
    tx: &mut T,
    country_code: &str,
    ad_type: &str,
    networks: &[NetworkScore],
) -> Result<UpsertOutcome> {
    let list_id = tx.find_or_create_list(country_code, ad_type).await?;

    let mut keep_names = BTreeSet::new();
    for network in networks {
        tx.upsert_network(list_id, &network.network_name, network.score)
            .await?;
        keep_names.insert(network.network_name.clone());
    }

    let removed = tx.delete_networks_not_in(list_id, &keep_names).await?;
    debug!(list_id, kept = keep_names.len(), removed, "stale networks deleted");

    Ok(UpsertOutcome {
        list_id,
        num_updated_networks: networks.len(),
        num_removed_networks: removed,
    })
}
