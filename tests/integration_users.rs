use serde_json::{Value, json};
use synkronus::domain::user::Role;
use uuid::Uuid;

mod common;

fn unique_name(prefix: &str, run_id: &str) -> String {
    format!("{prefix}_{run_id}_{}", &Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn admin_creates_lists_and_deletes_users() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, admin_token) = server.user_token(Role::Admin).await;

    let username = unique_name("fieldworker", &server.run_id);
    let resp = server
        .client
        .post(format!("{}/users/create", server.url))
        .bearer_auth(&admin_token)
        .json(&json!({"username": username, "password": "longenough", "role": "read-write"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["role"], "read-write");

    // Duplicate username conflicts.
    let resp = server
        .client
        .post(format!("{}/users/create", server.url))
        .bearer_auth(&admin_token)
        .json(&json!({"username": username, "password": "longenough", "role": "read-only"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "USERNAME_EXISTS");

    let resp = server.client.get(format!("{}/users", server.url)).bearer_auth(&admin_token).send().await.unwrap();
    let listing: Value = resp.json().await.unwrap();
    assert!(listing["users"].as_array().unwrap().iter().any(|u| u["username"] == json!(username)));

    let resp = server
        .client
        .delete(format!("{}/users/{username}", server.url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // The deleted account can no longer log in.
    assert!(server.login(&username, "longenough").await.is_none());

    // Deleting a missing user is a 404.
    let resp = server
        .client
        .delete(format!("{}/users/{username}", server.url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn self_service_password_change_requires_current_password() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (username, token) = server.user_token(Role::ReadOnly).await;

    let resp = server
        .client
        .post(format!("{}/users/change-password", server.url))
        .bearer_auth(&token)
        .json(&json!({"current_password": "wrong-guess", "new_password": "newpassword1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .client
        .post(format!("{}/users/change-password", server.url))
        .bearer_auth(&token)
        .json(&json!({"current_password": "password123", "new_password": "newpassword1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    assert!(server.login(&username, "password123").await.is_none());
    assert!(server.login(&username, "newpassword1").await.is_some());
}

#[tokio::test]
async fn admin_resets_passwords_without_knowing_them() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, admin_token) = server.user_token(Role::Admin).await;
    let (username, _) = server.user_token(Role::ReadWrite).await;

    let resp = server
        .client
        .post(format!("{}/users/reset-password", server.url))
        .bearer_auth(&admin_token)
        .json(&json!({"username": username, "new_password": "issued-by-admin"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    assert!(server.login(&username, "issued-by-admin").await.is_some());

    // Short passwords are rejected with a stable code.
    let resp = server
        .client
        .post(format!("{}/users/reset-password", server.url))
        .bearer_auth(&admin_token)
        .json(&json!({"username": username, "new_password": "short"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "PASSWORD_TOO_SHORT");
}
