use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use lib_mediation::{
    MediationService, PriorityListSummary, PriorityStore, SelectionRequest, UpdateNetworksRequest,
};
use serde_json::json;
use tracing::info;

use super::error::AppError;

/// Shared handler state: the engines over one store.
pub type SharedService<S> = Arc<MediationService<S>>;

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "message": "Still breathing!" })))
}

/// # Select Networks Handler
///
/// `GET /api/v1/ad-networks?countryCode=..&adType=..&platform=..&osVersion=..&appName=..&appVersion=..`
///
/// Returns the filtered, score-ordered network names for the client context.
/// An unknown (country, ad type) pair returns an empty list.
pub async fn select_networks<S: PriorityStore + 'static>(
    State(service): State<SharedService<S>>,
    query: Result<Query<SelectionRequest>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(request) = query.map_err(AppError::InvalidQuery)?;
    let networks = service.selection.select(&request).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "countryCode": request.country_code,
            "adType": request.ad_type,
            "networks": networks
        })),
    ))
}

/// # Update Networks Handler
///
/// `POST /api/v1/ad-networks/{country_code}/{ad_type}`
///
/// The body is the complete replacement set for the list. Networks left out
/// of it are removed.
pub async fn update_networks<S: PriorityStore + 'static>(
    State(service): State<SharedService<S>>,
    Path((country_code, ad_type)): Path<(String, String)>,
    body: Result<Json<UpdateNetworksRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(body) = body.map_err(AppError::InvalidBody)?;
    info!(
        "Received update for {}/{} with {} networks",
        country_code,
        ad_type,
        body.networks.len()
    );

    let outcome = service
        .upsert
        .upsert(&country_code, &ad_type, &body.networks)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "countryCode": country_code,
            "adType": ad_type,
            "numUpdatedNetworks": outcome.num_updated_networks
        })),
    ))
}

/// `GET /api/v1/dashboard`
pub async fn dashboard<S: PriorityStore + 'static>(
    State(service): State<SharedService<S>>,
) -> Result<Json<Vec<PriorityListSummary>>, AppError> {
    let lists = service.dashboard.priority_lists().await?;
    Ok(Json(lists))
}
