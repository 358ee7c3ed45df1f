use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of a priority list in the store.
pub type ListId = i32;

/// Identity of a priority list. Both parts are opaque and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListKey {
    pub country_code: String,
    pub ad_type: String,
}

impl ListKey {
    pub fn new(country_code: &str, ad_type: &str) -> Self {
        Self {
            country_code: country_code.to_string(),
            ad_type: ad_type.to_string(),
        }
    }
}

/// # Network Score
///
/// One member of a priority list. Used both as an upsert request entry and
/// as a stored row read back in score order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkScore {
    pub network_name: String,
    pub score: f32,
}

impl NetworkScore {
    pub fn new(network_name: &str, score: f32) -> Self {
        Self {
            network_name: network_name.to_string(),
            score,
        }
    }
}

/// Body of the update route: the complete replacement set for one list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNetworksRequest {
    pub networks: Vec<NetworkScore>,
}

/// # Selection Request
///
/// `country_code` and `ad_type` are required; the rest only drive the
/// contextual filter. Missing fields deserialize to empty strings so the
/// engine reports them as validation errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionRequest {
    pub country_code: String,
    pub ad_type: String,
    pub platform: String,
    pub os_version: String,
    pub app_name: String,
    pub app_version: String,
}

impl SelectionRequest {
    pub fn new(country_code: &str, ad_type: &str) -> Self {
        Self {
            country_code: country_code.to_string(),
            ad_type: ad_type.to_string(),
            ..Default::default()
        }
    }

    pub fn with_platform(mut self, platform: &str, os_version: &str) -> Self {
        self.platform = platform.to_string();
        self.os_version = os_version.to_string();
        self
    }

    pub fn with_app(mut self, app_name: &str, app_version: &str) -> Self {
        self.app_name = app_name.to_string();
        self.app_version = app_version.to_string();
        self
    }
}

/// Result of a successful replacement upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub list_id: ListId,
    /// Entries received in the request, duplicates included.
    pub num_updated_networks: usize,
    /// Stored networks dropped because the request no longer names them.
    pub num_removed_networks: u64,
}

/// Flat row of the list/network join read by the dashboard.
/// `network` is `None` for a list that has no members.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityListRow {
    pub country_code: String,
    pub ad_type: String,
    pub last_updated: DateTime<Utc>,
    pub network: Option<NetworkScore>,
}

/// One list as shown on the dashboard, networks by descending score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityListSummary {
    pub country_code: String,
    pub ad_type: String,
    pub last_updated: DateTime<Utc>,
    pub networks: Vec<NetworkScore>,
}
