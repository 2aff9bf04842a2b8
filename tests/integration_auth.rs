use serde_json::{Value, json};
use synkronus::domain::user::Role;

mod common;

#[tokio::test]
async fn login_issues_rotating_token_pair() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (username, _) = server.user_token(Role::ReadWrite).await;

    let resp = server
        .client
        .post(format!("{}/auth/login", server.url))
        .json(&json!({"username": username, "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let refresh_token = body["refresh_token"].as_str().unwrap().to_string();
    assert!(body["expires_at"].as_i64().unwrap() > 0);

    let resp = server
        .client
        .post(format!("{}/auth/refresh", server.url))
        .json(&json!({"refresh_token": refresh_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let rotated: Value = resp.json().await.unwrap();
    assert!(rotated["token"].as_str().is_some());
    assert!(rotated["refresh_token"].as_str().is_some());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (username, _) = server.user_token(Role::ReadOnly).await;

    let wrong_password = server
        .client
        .post(format!("{}/auth/login", server.url))
        .json(&json!({"username": username, "password": "not-the-password"}))
        .send()
        .await
        .unwrap();
    let unknown_user = server
        .client
        .post(format!("{}/auth/login", server.url))
        .json(&json!({"username": "nobody-here", "password": "whatever123"}))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), 401);
    assert_eq!(unknown_user.status(), 401);
    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a, b, "401 bodies must not leak which part was wrong");
}

#[tokio::test]
async fn token_types_are_not_interchangeable() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (username, access_token) = server.user_token(Role::ReadWrite).await;

    let resp = server
        .client
        .post(format!("{}/auth/login", server.url))
        .json(&json!({"username": username, "password": "password123"}))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let refresh_token = body["refresh_token"].as_str().unwrap();

    // An access token cannot refresh.
    let resp = server
        .client
        .post(format!("{}/auth/refresh", server.url))
        .json(&json!({"refresh_token": access_token}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // A refresh token cannot authenticate a request.
    let resp = server
        .client
        .post(format!("{}/sync/pull", server.url))
        .bearer_auth(refresh_token)
        .json(&json!({"client_id": "c", "since": {"version": 0}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn role_gates_enforce_the_hierarchy() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, ro_token) = server.user_token(Role::ReadOnly).await;
    let (_, admin_token) = server.user_token(Role::Admin).await;

    // read-only cannot push.
    let resp = server
        .client
        .post(format!("{}/sync/push", server.url))
        .bearer_auth(&ro_token)
        .json(&json!({"client_id": "c", "transmission_id": uuid::Uuid::new_v4(), "records": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // read-only cannot manage users; admin can.
    let resp = server.client.get(format!("{}/users", server.url)).bearer_auth(&ro_token).send().await.unwrap();
    assert_eq!(resp.status(), 403);
    let resp = server.client.get(format!("{}/users", server.url)).bearer_auth(&admin_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    // admin satisfies a read-only gate.
    let resp = server
        .client
        .post(format!("{}/sync/pull", server.url))
        .bearer_auth(&admin_token)
        .json(&json!({"client_id": "c", "since": {"version": 0}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn public_endpoints_need_no_token_and_versions_are_negotiated() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;

    let resp = server.client.get(format!("{}/health", server.url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server.client.get(format!("{}/version", server.url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "synkronus");

    // Unknown API version is rejected up front.
    let resp = server
        .client
        .get(format!("{}/version", server.url))
        .header("x-api-version", "9")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = server
        .client
        .get(format!("{}/version", server.url))
        .header("x-api-version", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Missing bearer on a protected endpoint is 401, not 403.
    let resp = server
        .client
        .post(format!("{}/sync/pull", server.url))
        .json(&json!({"client_id": "c", "since": {"version": 0}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
