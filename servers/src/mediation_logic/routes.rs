use axum::{
    Router,
    routing::{get, post},
};
use lib_mediation::PriorityStore;
use tower_http::trace::TraceLayer;

use super::handlers::{self, SharedService};

/// Builds the application router over any store.
pub fn router<S: PriorityStore + 'static>(service: SharedService<S>) -> Router {
    Router::new()
        // health route (similar to ping in other applications)
        .route("/health", get(handlers::health))
        // sorted, filtered priority list for mobile apps
        .route("/api/v1/ad-networks", get(handlers::select_networks::<S>))
        // batch replacement of one priority list
        .route(
            "/api/v1/ad-networks/{country_code}/{ad_type}",
            post(handlers::update_networks::<S>),
        )
        // every list, grouped for the dashboard
        .route("/api/v1/dashboard", get(handlers::dashboard::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use lib_mediation::{InMemoryPriorityStore, MediationService};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = Arc::new(InMemoryPriorityStore::new());
        router(Arc::new(MediationService::new(store, Duration::from_secs(5))))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn networks(entries: &[(&str, f32)]) -> Value {
        json!({
            "networks": entries
                .iter()
                .map(|(name, score)| json!({ "networkName": name, "score": score }))
                .collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Still breathing!" }));
    }

    #[tokio::test]
    async fn test_update_echoes_count() {
        let (status, body) = send(
            &app(),
            post_json(
                "/api/v1/ad-networks/SI/banner",
                networks(&[("AdMob", 10.0), ("Facebook", 5.0)]),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "ok",
                "countryCode": "SI",
                "adType": "banner",
                "numUpdatedNetworks": 2
            })
        );
    }

    #[tokio::test]
    async fn test_update_then_select_applies_context() {
        let app = app();
        send(
            &app,
            post_json(
                "/api/v1/ad-networks/SI/banner",
                networks(&[("AdMob", 10.0), ("AdMob-OptOut", 1.0), ("Facebook", 5.0)]),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            get_request("/api/v1/ad-networks?countryCode=SI&adType=banner&platform=Android&osVersion=9.0&appName=Talking%20Tom&appVersion=1.2"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["networks"], json!(["Facebook", "AdMob-OptOut"]));

        let (_, body) = send(
            &app,
            get_request("/api/v1/ad-networks?countryCode=SI&adType=banner&platform=iOS&osVersion=9.0"),
        )
        .await;
        assert_eq!(body["networks"], json!(["AdMob", "Facebook"]));
    }

    #[tokio::test]
    async fn test_select_unknown_key_is_empty() {
        let (status, body) = send(
            &app(),
            get_request("/api/v1/ad-networks?countryCode=XX&adType=banner"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["networks"], json!([]));
    }

    #[tokio::test]
    async fn test_select_without_country_is_bad_request() {
        let (status, body) = send(&app(), get_request("/api/v1/ad-networks?adType=banner")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_type"], "ValidationError");
    }

    #[tokio::test]
    async fn test_update_with_no_networks_is_bad_request() {
        let (status, body) = send(
            &app(),
            post_json("/api/v1/ad-networks/SI/banner", json!({ "networks": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_type"], "ValidationError");
    }

    #[tokio::test]
    async fn test_update_with_malformed_body_is_bad_request() {
        let (status, body) = send(
            &app(),
            post_json(
                "/api/v1/ad-networks/SI/banner",
                json!({ "networks": [{ "networkName": "AdMob" }] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_type"], "InvalidRequestBody");
    }

    #[tokio::test]
    async fn test_dashboard_groups_lists() {
        let app = app();
        send(
            &app,
            post_json("/api/v1/ad-networks/US/video", networks(&[("Unity", 3.0)])),
        )
        .await;
        send(
            &app,
            post_json(
                "/api/v1/ad-networks/SI/banner",
                networks(&[("AdColony", 1.0), ("AdMob", 4.0)]),
            ),
        )
        .await;

        let (status, body) = send(&app, get_request("/api/v1/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        let lists = body.as_array().unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0]["countryCode"], "SI");
        assert_eq!(
            lists[0]["networks"],
            json!([
                { "networkName": "AdMob", "score": 4.0 },
                { "networkName": "AdColony", "score": 1.0 }
            ])
        );
        assert_eq!(lists[1]["countryCode"], "US");
        assert!(lists[1]["lastUpdated"].is_string());
    }
}
