//! End-to-end behaviour of the upsert and selection engines over the
//! in-memory store, driven through `MediationService` the way the server does.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use lib_mediation::{
    ErrorKind, InMemoryPriorityStore, MediationService, NetworkScore, SelectionRequest,
};
use project_tests::{in_memory_service as service, scores};

async fn stored(
    service: &MediationService<InMemoryPriorityStore>,
    country_code: &str,
    ad_type: &str,
) -> Vec<NetworkScore> {
    let lists = service.dashboard.priority_lists().await.unwrap();
    lists
        .into_iter()
        .find(|list| list.country_code == country_code && list.ad_type == ad_type)
        .map(|list| list.networks)
        .unwrap_or_default()
}

#[tokio::test]
async fn test_repeated_upsert_is_idempotent() {
    let (store, service) = service();
    let networks = scores(&[("AdMob", 10.0), ("Unity", 4.5)]);

    service.upsert.upsert("SI", "banner", &networks).await.unwrap();
    let first_state = stored(&service, "SI", "banner").await;
    let first_update = store.last_updated("SI", "banner").await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    service.upsert.upsert("SI", "banner", &networks).await.unwrap();

    assert_eq!(stored(&service, "SI", "banner").await, first_state);
    assert!(store.last_updated("SI", "banner").await.unwrap() > first_update);
    assert_eq!(store.list_count().await, 1);
}

#[tokio::test]
async fn test_upsert_replaces_membership() {
    let (_, service) = service();
    service
        .upsert
        .upsert("SI", "banner", &scores(&[("A", 1.0), ("B", 2.0)]))
        .await
        .unwrap();
    let outcome = service
        .upsert
        .upsert("SI", "banner", &scores(&[("B", 2.0), ("C", 3.0)]))
        .await
        .unwrap();

    assert_eq!(outcome.num_updated_networks, 2);
    assert_eq!(outcome.num_removed_networks, 1);
    assert_eq!(
        stored(&service, "SI", "banner").await,
        scores(&[("C", 3.0), ("B", 2.0)])
    );
}

#[tokio::test]
async fn test_select_preserves_score_order() {
    let (_, service) = service();
    service
        .upsert
        .upsert("SI", "banner", &scores(&[("A", 5.0), ("B", 9.0), ("C", 1.0)]))
        .await
        .unwrap();

    let selected = service
        .selection
        .select(&SelectionRequest::new("SI", "banner").with_platform("iOS", "17.1"))
        .await
        .unwrap();
    assert_eq!(selected, vec!["B", "A", "C"]);
}

#[tokio::test]
async fn test_select_drops_admob_on_android_9() {
    let (_, service) = service();
    service
        .upsert
        .upsert("SI", "banner", &scores(&[("AdMob", 10.0), ("Facebook", 5.0)]))
        .await
        .unwrap();

    let request = SelectionRequest::new("SI", "banner").with_platform("Android", "9.0");
    assert_eq!(
        service.selection.select(&request).await.unwrap(),
        vec!["Facebook"]
    );
}

#[tokio::test]
async fn test_select_appends_optout_when_admob_dropped() {
    let (_, service) = service();
    service
        .upsert
        .upsert(
            "SI",
            "banner",
            &scores(&[("AdMob", 10.0), ("AdMob-OptOut", 1.0), ("Facebook", 5.0)]),
        )
        .await
        .unwrap();

    let request = SelectionRequest::new("SI", "banner").with_platform("Android", "9.0");
    assert_eq!(
        service.selection.select(&request).await.unwrap(),
        vec!["Facebook", "AdMob-OptOut"]
    );
}

#[tokio::test]
async fn test_select_suppresses_optout_when_admob_served() {
    let (_, service) = service();
    service
        .upsert
        .upsert("SI", "banner", &scores(&[("AdMob", 10.0), ("AdMob-OptOut", 1.0)]))
        .await
        .unwrap();

    for os_version in ["9.0", "16", ""] {
        let request = SelectionRequest::new("SI", "banner").with_platform("iOS", os_version);
        assert_eq!(
            service.selection.select(&request).await.unwrap(),
            vec!["AdMob"],
            "os version {:?}",
            os_version
        );
    }
}

#[tokio::test]
async fn test_select_drops_facebook_in_china() {
    let (_, service) = service();
    service
        .upsert
        .upsert("CN", "video", &scores(&[("Facebook", 9.0), ("AdColony", 3.0)]))
        .await
        .unwrap();

    let request = SelectionRequest::new("CN", "video")
        .with_platform("Android", "9.0")
        .with_app("Talking Tom", "5.2");
    assert_eq!(
        service.selection.select(&request).await.unwrap(),
        vec!["AdColony"]
    );
}

#[tokio::test]
async fn test_empty_inputs_are_validation_errors() {
    let (store, service) = service();

    let err = service.upsert.upsert("SI", "banner", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.list_count().await, 0);

    let err = service
        .selection
        .select(&SelectionRequest::new("", "banner"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_select_unknown_key_is_empty() {
    let (_, service) = service();
    let selected = service
        .selection
        .select(&SelectionRequest::new("XX", "rewarded"))
        .await
        .unwrap();
    assert!(selected.is_empty());
}

#[tokio::test]
async fn test_concurrent_upserts_leave_one_whole_request() {
    let (store, service) = service();
    let service = Arc::new(service);
    let requests: Vec<Vec<NetworkScore>> = (0..8)
        .map(|i| {
            scores(&[
                (format!("Network{}", i).as_str(), i as f32),
                ("Shared", 100.0 + i as f32),
            ])
        })
        .collect();

    let handles = requests.iter().cloned().map(|networks| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.upsert.upsert("US", "interstitial", &networks).await })
    });
    let list_ids: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|result| result.unwrap().unwrap().list_id)
        .collect();

    assert_eq!(store.list_count().await, 1);
    assert!(list_ids.iter().all(|id| *id == list_ids[0]), "ids: {:?}", list_ids);

    let mut final_state = stored(&service, "US", "interstitial").await;
    final_state.sort_by(|a, b| a.network_name.cmp(&b.network_name));
    let matches_a_request = requests.iter().any(|request| {
        let mut expected = request.clone();
        expected.sort_by(|a, b| a.network_name.cmp(&b.network_name));
        expected == final_state
    });
    assert!(matches_a_request, "mixed state: {:?}", final_state);
}
