//! End-to-end request flow through the gateway.

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{Harness, ALLOWED_ORIGIN, EXPIRED_TOKEN, GOOD_REFRESH, MOCK_UID, VALID_TOKEN};

fn session(token: &str) -> String {
    format!("session_token={}", token)
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::start().await;

    let res = common::client()
        .get(harness.url("/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok", "service": "api-gateway" }));
}

#[tokio::test]
async fn test_missing_session_never_contacts_collaborators() {
    let harness = Harness::start().await;
    let client = common::client();

    for (method, path) in [
        (reqwest::Method::GET, "/api/tenants"),
        (reqwest::Method::POST, "/api/tenants"),
        (reqwest::Method::DELETE, "/api/tenants/7"),
        (reqwest::Method::GET, "/api/apikeys"),
        (reqwest::Method::GET, "/api/nodes/5/status"),
    ] {
        let res = client
            .request(method, harness.url(path))
            .header("cookie", "theme=dark")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 401, "{}", path);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({ "error": "unauthorized" }));
    }

    assert_eq!(harness.auth.count(), 0);
    assert_eq!(harness.backend.count(), 0);
    assert_eq!(harness.node.count(), 0);
}

#[tokio::test]
async fn test_valid_session_forwards_and_scrubs_cors() {
    let harness = Harness::start().await;

    let res = common::client()
        .get(harness.url("/api/apikeys/k1?verbose=1"))
        .header("cookie", session(VALID_TOKEN))
        .header("origin", ALLOWED_ORIGIN)
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], ALLOWED_ORIGIN);
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(
        headers["access-control-allow-methods"],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        headers["access-control-allow-headers"],
        "Content-Type, Authorization"
    );
    assert_eq!(headers.get_all("access-control-allow-origin").iter().count(), 1);
    assert_eq!(headers["x-request-id"], "trace-me");

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["service"], "backend");
    assert_eq!(body["uri"], "/api/apikeys/k1?verbose=1");

    let check = harness.auth.last();
    assert_eq!(check.uri, "/auth/me");
    assert_eq!(check.headers["cookie"], "session_token=valid");
    assert_eq!(check.headers["x-request-id"], "trace-me");

    let forwarded = harness.backend.last();
    assert_eq!(forwarded.headers["x-forwarded-for"], "127.0.0.1");
    assert_eq!(forwarded.headers["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_backend_cors_absent_without_allowed_origin() {
    let harness = Harness::start().await;

    let res = common::client()
        .get(harness.url("/api/apikeys"))
        .header("cookie", session(VALID_TOKEN))
        .header("origin", "http://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res
        .headers()
        .keys()
        .all(|name| !name.as_str().starts_with("access-control-")));
}

#[tokio::test]
async fn test_refresh_success_forwards_once_with_new_cookies() {
    let harness = Harness::start().await;
    let cookie = format!("{}; {}; theme=dark", session(EXPIRED_TOKEN), GOOD_REFRESH);

    let res = common::client()
        .get(harness.url("/api/apikeys"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let set_cookies: Vec<&str> = res
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(
        set_cookies,
        vec![
            "backend=1",
            "session_token=fresh; Path=/; HttpOnly",
            "refresh_token=rotated; Path=/; HttpOnly",
        ]
    );

    let calls = harness.auth.all();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].uri, "/auth/me");
    assert_eq!(calls[1].uri, "/auth/refresh");
    assert_eq!(calls[1].method, "POST");
    assert_eq!(calls[1].headers["cookie"], cookie.as_str());

    assert_eq!(harness.backend.count(), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_session_expired() {
    let harness = Harness::start().await;

    let res = common::client()
        .delete(harness.url("/api/tenants/7"))
        .header("cookie", format!("{}; refresh_token=stale", session(EXPIRED_TOKEN)))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 401);
    assert!(res.headers().get("set-cookie").is_none());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "session expired" }));

    assert_eq!(harness.auth.count(), 2);
    assert_eq!(harness.backend.count(), 0);
}

#[tokio::test]
async fn test_rejected_session_is_unauthorized() {
    let harness = Harness::start().await;

    let res = common::client()
        .get(harness.url("/api/apikeys"))
        .header("cookie", session(common::FORBIDDEN_TOKEN))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "unauthorized" }));
    assert_eq!(harness.auth.count(), 1);
    assert_eq!(harness.backend.count(), 0);
}

#[tokio::test]
async fn test_create_tenant_asserts_identity() {
    let harness = Harness::start().await;

    let res = common::client()
        .post(harness.url("/api/tenants"))
        .header("cookie", session(VALID_TOKEN))
        .json(&json!({ "name": "x", "firebase_uid": "attacker" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);

    let forwarded = harness.backend.last();
    assert_eq!(forwarded.method, "POST");
    assert_eq!(forwarded.uri, "/api/tenants");
    let body: Value = serde_json::from_slice(&forwarded.body).unwrap();
    assert_eq!(body, json!({ "name": "x", "firebase_uid": MOCK_UID }));
    let length: usize = forwarded.headers["content-length"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(length, forwarded.body.len());

    // validate, then resolve identity
    assert_eq!(harness.auth.count(), 2);
}

#[tokio::test]
async fn test_create_tenant_rejects_non_json() {
    let harness = Harness::start().await;

    let res = common::client()
        .post(harness.url("/api/tenants"))
        .header("cookie", session(VALID_TOKEN))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "invalid payload" }));
    assert_eq!(harness.backend.count(), 0);
}

#[tokio::test]
async fn test_refresh_cookies_survive_identity_failure() {
    let harness = Harness::start().await;

    // The refreshed session only applies from the next request, so the
    // identity lookup still carries the stale token and is refused.
    let res = common::client()
        .post(harness.url("/api/tenants"))
        .header("cookie", format!("{}; {}", session(EXPIRED_TOKEN), GOOD_REFRESH))
        .json(&json!({ "name": "x" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 401);
    assert_eq!(res.headers().get_all("set-cookie").iter().count(), 2);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "failed to get user id" }));
    assert_eq!(harness.backend.count(), 0);
}

#[tokio::test]
async fn test_list_tenants_scoped_to_identity() {
    let harness = Harness::start().await;

    let res = common::client()
        .get(harness.url("/api/tenants?page=2"))
        .header("cookie", session(VALID_TOKEN))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(
        harness.backend.last().uri,
        format!("/api/user/{}/tenants?page=2", MOCK_UID)
    );
}

#[tokio::test]
async fn test_tenant_by_id_passes_through() {
    let harness = Harness::start().await;

    let res = common::client()
        .put(harness.url("/api/tenants/42"))
        .header("cookie", session(VALID_TOKEN))
        .body("opaque bytes")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let forwarded = harness.backend.last();
    assert_eq!(forwarded.uri, "/api/tenants/42");
    assert_eq!(&forwarded.body[..], b"opaque bytes");
    assert_eq!(harness.auth.count(), 1);
}

#[tokio::test]
async fn test_nodes_prefix_rewritten() {
    let harness = Harness::start().await;

    let res = common::client()
        .get(harness.url("/api/nodes/5/status"))
        .header("cookie", session(VALID_TOKEN))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["service"], "node");
    assert_eq!(harness.node.last().uri, "/node/5/status");
    assert_eq!(harness.backend.count(), 0);
}

#[tokio::test]
async fn test_auth_routes_proxied_without_session() {
    let harness = Harness::start().await;

    let res = common::client()
        .post(harness.url("/auth/login"))
        .json(&json!({ "email": "a@b.c" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let seen = harness.auth.last();
    assert_eq!(seen.uri, "/auth/login");
    assert_eq!(seen.method, "POST");
}

#[tokio::test]
async fn test_preflight_short_circuits() {
    let harness = Harness::start().await;
    let client = common::client();

    let allowed = client
        .request(reqwest::Method::OPTIONS, harness.url("/api/tenants"))
        .header("origin", ALLOWED_ORIGIN)
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::NO_CONTENT.as_u16());
    assert_eq!(allowed.headers()["access-control-allow-origin"], ALLOWED_ORIGIN);
    assert_eq!(allowed.headers()["access-control-allow-credentials"], "true");

    let denied = client
        .request(reqwest::Method::OPTIONS, harness.url("/not/a/route"))
        .header("origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 204);
    assert!(denied.headers().get("access-control-allow-origin").is_none());

    assert_eq!(harness.auth.count(), 0);
    assert_eq!(harness.backend.count(), 0);
}

#[tokio::test]
async fn test_unmatched_paths_and_methods() {
    let harness = Harness::start().await;
    let client = common::client();

    let missing = client
        .get(harness.url("/api/unknown"))
        .header("origin", ALLOWED_ORIGIN)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    assert_eq!(missing.headers()["access-control-allow-origin"], ALLOWED_ORIGIN);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body, json!({ "error": "not found" }));

    let wrong_method = client
        .post(harness.url("/api/monitoring/nodes"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_method.status(), 405);
    let body: Value = wrong_method.json().await.unwrap();
    assert_eq!(body, json!({ "error": "method not allowed" }));

    assert_eq!(harness.monitoring.count(), 0);
}

#[tokio::test]
async fn test_monitoring_nodes_relayed() {
    let harness = Harness::start().await;

    let res = common::client()
        .get(harness.url("/api/monitoring/nodes"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert!(res.headers().get("access-control-allow-origin").is_none());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["service"], "monitoring");

    let seen = harness.monitoring.last();
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.uri, "/monitoring/nodes");
    assert_eq!(harness.auth.count(), 0);
}
