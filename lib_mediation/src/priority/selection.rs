//! # Selection Engine
//!
//! Reads a stored list in descending score order and applies the contextual
//! rules for the requesting client. The rule set is fixed:
//!
//! - `AdMob` is dropped on Android with OS major version 9.
//! - `Facebook` is dropped when the country code is `CN` (any case).
//! - `AdMob-OptOut` is only served as the last entry, and only when it is
//!   stored for the list and `AdMob` did not make it into the output.
//!
//! Survivors keep their stored order.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::error::{bounded, MediationError, Result};
use super::models::SelectionRequest;
use super::store::PriorityStore;

pub const ADMOB: &str = "AdMob";
pub const ADMOB_OPT_OUT: &str = "AdMob-OptOut";
pub const FACEBOOK: &str = "Facebook";

const ANDROID: &str = "android";
const ADMOB_BLOCKED_OS_MAJOR: &str = "9";
const FACEBOOK_BLOCKED_COUNTRY: &str = "CN";

pub struct SelectionEngine<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S: PriorityStore> SelectionEngine<S> {
    pub fn new(store: Arc<S>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Network names to serve for `request`, best first.
    ///
    /// A key with no stored list yields an empty vector.
    pub async fn select(&self, request: &SelectionRequest) -> Result<Vec<String>> {
        if request.country_code.is_empty() {
            return Err(MediationError::validation("countryCode", "must not be empty"));
        }
        if request.ad_type.is_empty() {
            return Err(MediationError::validation("adType", "must not be empty"));
        }

        let stored = bounded(
            "select",
            self.timeout,
            self.store
                .list_networks_ordered_by_score_desc(&request.country_code, &request.ad_type),
        )
        .await?;

        let names: Vec<String> = stored.into_iter().map(|n| n.network_name).collect();
        let stored_count = names.len();
        let served = apply_context_filters(names, request);

        debug!(
            country_code = %request.country_code,
            ad_type = %request.ad_type,
            platform = %request.platform,
            os_version = %request.os_version,
            app_name = %request.app_name,
            stored = stored_count,
            served = served.len(),
            "networks selected"
        );
        Ok(served)
    }
}

/// Applies the contextual rules to `networks`, which must already be in
/// descending score order.
pub fn apply_context_filters(networks: Vec<String>, request: &SelectionRequest) -> Vec<String> {
    let os_major = extract_major_version(&request.os_version);
    let admob_blocked =
        request.platform.eq_ignore_ascii_case(ANDROID) && os_major == ADMOB_BLOCKED_OS_MAJOR;
    let facebook_blocked = request
        .country_code
        .eq_ignore_ascii_case(FACEBOOK_BLOCKED_COUNTRY);

    let mut filtered = Vec::with_capacity(networks.len());
    let mut admob_served = false;
    let mut opt_out_stored = false;

    for network in networks {
        match network.as_str() {
            ADMOB if admob_blocked => continue,
            ADMOB => admob_served = true,
            ADMOB_OPT_OUT => {
                opt_out_stored = true;
                continue;
            }
            FACEBOOK if facebook_blocked => continue,
            _ => {}
        }
        filtered.push(network);
    }

    if opt_out_stored && !admob_served {
        filtered.push(ADMOB_OPT_OUT.to_string());
    }
    filtered
}

/// Part of `version` before the first `.`, or all of it.
pub fn extract_major_version(version: &str) -> &str {
    match version.find('.') {
        Some(i) => &version[..i],
        None => version,
    }
}
