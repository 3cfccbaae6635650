//! HTTP API Tests
//!
//! Serves the router on an ephemeral port and drives it with a real HTTP client.

#[cfg(test)]
mod tests {
    use crate::api::protocol::*;
    use crate::api::router;
    use crate::config::CoordinatorConfig;
    use crate::coordinator::Coordinator;
    use crate::registry::memory::MemoryStore;
    use crate::registry::store::UnitStore;
    use crate::registry::types::*;
    use serde_json::json;
    use std::sync::Arc;

    async fn serve(store: Arc<MemoryStore>) -> String {
        let coordinator = Arc::new(Coordinator::new(store, CoordinatorConfig::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, router(coordinator)).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn store_with_unit() -> (Arc<MemoryStore>, UnitId) {
        let store = Arc::new(MemoryStore::new());
        let id = store
            .insert_unit(NewUnit {
                base: 3,
                range_start: 47,
                range_end: 57,
                range_size: None,
            })
            .unwrap();
        (store, id)
    }

    // ============================================================
    // TEST 1: /claim
    // ============================================================

    #[tokio::test]
    async fn test_claim_returns_lease() {
        let (store, id) = store_with_unit();
        let base_url = serve(store).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{}{}", base_url, ENDPOINT_CLAIM))
            .query(&[("username", "alice")])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let claim: ClaimResponse = response.json().await.unwrap();
        assert_eq!(claim.search_id, id.0);
        assert_eq!(claim.base, 3);
        assert_eq!((claim.search_start, claim.search_end), (47, 57));
        assert_eq!(claim.claimed_by, "alice");
        assert_eq!(claim.expiration_time, claim.claimed_time + 12 * 60 * 60 * 1000);

        // Nothing else to hand out
        let exhausted = client
            .get(format!("{}{}", base_url, ENDPOINT_CLAIM))
            .send()
            .await
            .unwrap();
        assert_eq!(exhausted.status(), reqwest::StatusCode::NOT_FOUND);
        let body: ErrorResponse = exhausted.json().await.unwrap();
        assert!(!body.error.is_empty());
        assert!(body.retryable);
    }

    // ============================================================
    // TEST 2: /submit
    // ============================================================

    #[tokio::test]
    async fn test_submit_status_codes() {
        // ARRANGE
        let (store, id) = store_with_unit();
        let base_url = serve(store.clone()).await;
        let client = reqwest::Client::new();
        let submit_url = format!("{}{}", base_url, ENDPOINT_SUBMIT);

        client
            .get(format!("{}{}", base_url, ENDPOINT_CLAIM))
            .query(&[("username", "alice")])
            .send()
            .await
            .unwrap();

        // ACT / ASSERT: unknown unit
        let missing = client
            .post(&submit_url)
            .json(&json!({
                "search_id": 404,
                "username": "alice",
                "unique_count": {"1": 3, "2": 3, "3": 4}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let body: ErrorResponse = missing.json().await.unwrap();
        assert!(body.error.contains("404"));
        assert!(!body.retryable);

        // Wrong total
        let short = client
            .post(&submit_url)
            .json(&json!({
                "search_id": id.0,
                "username": "alice",
                "unique_count": {"1": 3, "2": 3, "3": 3}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(short.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: ErrorResponse = short.json().await.unwrap();
        assert!(body.error.starts_with("Missing one or more counts"));
        assert!(!body.retryable);

        // Valid
        let ok = client
            .post(&submit_url)
            .json(&json!({
                "search_id": id.0,
                "username": "alice",
                "client_version": "3.1.0",
                "unique_count": {"1": 3, "2": 3, "3": 4},
                "near_misses": {"50": 2}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status(), reqwest::StatusCode::OK);
        let body: SubmitResponse = ok.json().await.unwrap();
        assert!(body.accepted);

        // Already completed
        let again = client
            .post(&submit_url)
            .json(&json!({
                "search_id": id.0,
                "unique_count": {"1": 3, "2": 3, "3": 4}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: ErrorResponse = again.json().await.unwrap();
        assert_eq!(body.error, "This field has already been completed.");

        let unit = store.get_unit(id).unwrap().unwrap();
        assert_eq!(unit.completed_by.as_deref(), Some("alice"));
        assert_eq!(store.near_misses(id).unwrap()[0].number, 50);
    }

    #[tokio::test]
    async fn test_submit_without_id_is_bad_request() {
        let (store, _) = store_with_unit();
        let base_url = serve(store).await;

        let response = reqwest::Client::new()
            .post(format!("{}{}", base_url, ENDPOINT_SUBMIT))
            .json(&json!({ "username": "alice" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json().await.unwrap();
        assert_eq!(body.error, "Missing one or more required fields.");
    }

    #[test]
    fn test_status_mapping() {
        use crate::api::handlers::status_for;
        use crate::error::CoordinatorError;
        use axum::http::StatusCode;

        assert_eq!(status_for(&CoordinatorError::NoEligibleUnit), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&CoordinatorError::NotFound(UnitId(1))), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&CoordinatorError::NotClaimed), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&CoordinatorError::Conflict("near miss 5".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&CoordinatorError::Unavailable {
                operation: "lease_unit".to_string(),
                reason: "store busy".to_string(),
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    // ============================================================
    // TEST 3: /stats
    // ============================================================

    #[tokio::test]
    async fn test_stats_reports_progress() {
        let (store, _) = store_with_unit();
        store
            .insert_unit(NewUnit {
                base: 3,
                range_start: 57,
                range_end: 67,
                range_size: None,
            })
            .unwrap();
        let base_url = serve(store).await;
        let client = reqwest::Client::new();

        client
            .get(format!("{}{}", base_url, ENDPOINT_CLAIM))
            .send()
            .await
            .unwrap();
        let progress: Progress = client
            .get(format!("{}{}", base_url, ENDPOINT_STATS))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(
            progress,
            Progress {
                total: 2,
                leased: 1,
                completed: 0
            }
        );
    }
}
