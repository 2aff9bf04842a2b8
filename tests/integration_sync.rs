use serde_json::{Value, json};
use synkronus::domain::user::Role;
use uuid::Uuid;

mod common;

fn record(observation_id: &str, form_type: &str) -> Value {
    json!({
        "observation_id": observation_id,
        "form_type": form_type,
        "form_version": "1.0",
        "data": {"answer": 42},
    })
}

async fn push(
    server: &common::TestServer,
    token: &str,
    client_id: &str,
    transmission_id: Uuid,
    records: Value,
) -> (reqwest::StatusCode, Value) {
    let resp = server
        .client
        .post(format!("{}/sync/push", server.url))
        .bearer_auth(token)
        .json(&json!({
            "client_id": client_id,
            "transmission_id": transmission_id,
            "records": records,
        }))
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

async fn pull(server: &common::TestServer, token: &str, since: i64, query: &[(&str, String)]) -> Value {
    let resp = server
        .client
        .post(format!("{}/sync/pull", server.url))
        .bearer_auth(token)
        .query(query)
        .json(&json!({"client_id": "puller", "since": {"version": since}}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success(), "pull failed: {}", resp.status());
    resp.json().await.unwrap()
}

#[tokio::test]
async fn push_assigns_monotonic_versions_and_pull_returns_them() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadWrite).await;

    let form_type = format!("survey_{}", server.run_id);
    let obs_id = format!("obs-{}", server.run_id);
    let before = server.current_version(&token).await;

    let (status, body) =
        push(&server, &token, "client-1", Uuid::new_v4(), json!([record(&obs_id, &form_type)])).await;
    assert_eq!(status, 200);
    assert_eq!(body["success_count"], 1);
    assert!(body["failed_records"].as_array().unwrap().is_empty());
    let current = body["current_version"].as_i64().unwrap();
    assert!(current > before, "counter must advance past {before}, got {current}");

    let pulled = pull(&server, &token, before, &[("schema_types", form_type.clone())]).await;
    let records = pulled["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    let pulled_record = &records[0];
    assert_eq!(pulled_record["observation_id"], json!(obs_id));
    assert_eq!(pulled_record["deleted"], json!(false));
    let version = pulled_record["version"].as_i64().unwrap();
    assert!(version > before && version <= current);
    assert_eq!(pulled["change_cutoff"].as_i64().unwrap(), version);
    assert_eq!(pulled["has_more"], json!(false));
}

#[tokio::test]
async fn push_reports_partial_failure_per_record() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadWrite).await;

    let form_type = format!("survey_{}", server.run_id);
    let valid_id = format!("valid-{}", server.run_id);

    let (status, body) = push(
        &server,
        &token,
        "client-1",
        Uuid::new_v4(),
        json!([record(&valid_id, &form_type), record("", &form_type)]),
    )
    .await;

    assert_eq!(status, 200, "partial failure is not an error status");
    assert_eq!(body["success_count"], 1);
    let failed = body["failed_records"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["index"], 1);
    assert_eq!(failed[0]["code"], "MISSING_OBSERVATION_ID");
}

#[tokio::test]
async fn pull_filters_by_schema_type() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadWrite).await;

    let survey = format!("survey_{}", server.run_id);
    let checklist = format!("checklist_{}", server.run_id);
    let before = server.current_version(&token).await;

    let (_, body) = push(
        &server,
        &token,
        "client-1",
        Uuid::new_v4(),
        json!([
            record(&format!("s-{}", server.run_id), &survey),
            record(&format!("c-{}", server.run_id), &checklist),
        ]),
    )
    .await;
    assert_eq!(body["success_count"], 2);

    let pulled = pull(&server, &token, before, &[("schema_types", survey.clone())]).await;
    let records = pulled["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["form_type"], json!(survey));
}

#[tokio::test]
async fn replayed_transmission_returns_byte_equal_response() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadWrite).await;

    let form_type = format!("survey_{}", server.run_id);
    let obs_id = format!("obs-a-{}", server.run_id);
    let transmission_id = Uuid::new_v4();
    let payload = json!({
        "client_id": "client-42",
        "transmission_id": transmission_id,
        "records": [record(&obs_id, &form_type)],
    });

    let send = || async {
        server
            .client
            .post(format!("{}/sync/push", server.url))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap()
    };

    let first = send().await;
    let second = send().await;
    assert_eq!(first, second, "replay must be byte-equal");

    // No second version was created for the observation.
    let pulled = pull(&server, &token, 0, &[("schema_types", form_type.clone())]).await;
    let records = pulled["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn pagination_walks_the_window_without_duplicates() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadWrite).await;

    let form_type = format!("paged_{}", server.run_id);
    let before = server.current_version(&token).await;

    let records: Vec<Value> =
        (0..5).map(|i| record(&format!("page-{}-{}", server.run_id, i), &form_type)).collect();
    let (_, body) = push(&server, &token, "client-1", Uuid::new_v4(), json!(records)).await;
    assert_eq!(body["success_count"], 5);

    let mut seen = Vec::new();
    let mut page = pull(
        &server,
        &token,
        before,
        &[("schema_types", form_type.clone()), ("limit", "2".to_string())],
    )
    .await;

    loop {
        let records = page["records"].as_array().unwrap().clone();
        let mut last_version = seen.last().map_or(before, |(_, v): &(String, i64)| *v);
        for r in &records {
            let version = r["version"].as_i64().unwrap();
            assert!(version > last_version, "versions must ascend across pages");
            last_version = version;
            seen.push((r["observation_id"].as_str().unwrap().to_string(), version));
        }
        if !page["has_more"].as_bool().unwrap() {
            break;
        }
        let token_str = page["next_page_token"].as_str().unwrap().to_string();
        page = pull(
            &server,
            &token,
            before,
            &[("schema_types", form_type.clone()), ("page_token", token_str)],
        )
        .await;
    }

    assert_eq!(seen.len(), 5);
    let mut ids: Vec<String> = seen.iter().map(|(id, _)| id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5, "no observation may appear twice");
}

#[tokio::test]
async fn corrupted_page_token_is_rejected() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadOnly).await;

    let resp = server
        .client
        .post(format!("{}/sync/pull", server.url))
        .bearer_auth(&token)
        .query(&[("page_token", "garbage-token")])
        .json(&json!({"client_id": "c", "since": {"version": 0}}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_PAGE_TOKEN");
}

#[tokio::test]
async fn overwrite_without_base_is_warned_not_rejected() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadWrite).await;

    let form_type = format!("survey_{}", server.run_id);
    let obs_id = format!("conflicted-{}", server.run_id);

    let (_, first) = push(&server, &token, "c1", Uuid::new_v4(), json!([record(&obs_id, &form_type)])).await;
    assert_eq!(first["success_count"], 1);
    let assigned = first["current_version"].as_i64().unwrap();

    // Blind overwrite from a client that never saw the current version.
    let (_, second) = push(&server, &token, "c2", Uuid::new_v4(), json!([record(&obs_id, &form_type)])).await;
    assert_eq!(second["success_count"], 1);
    let warnings = second["warnings"].as_array().unwrap();
    assert!(warnings.iter().any(|w| w["code"] == "OVERWRITE_WITHOUT_BASE"), "expected overwrite warning");

    // An update that carries the right base version warns nothing.
    let latest = pull(&server, &token, assigned - 1, &[("schema_types", form_type.clone())]).await["records"][0]
        ["version"]
        .as_i64()
        .unwrap();
    let mut with_base = record(&obs_id, &form_type);
    with_base["version"] = json!(latest);
    let (_, third) = push(&server, &token, "c3", Uuid::new_v4(), json!([with_base])).await;
    assert_eq!(third["success_count"], 1);
    assert!(third["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn soft_delete_flows_through_pull_and_resurrection_works() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadWrite).await;

    let form_type = format!("survey_{}", server.run_id);
    let obs_id = format!("mortal-{}", server.run_id);
    let before = server.current_version(&token).await;

    push(&server, &token, "c", Uuid::new_v4(), json!([record(&obs_id, &form_type)])).await;

    let mut tombstone = record(&obs_id, &form_type);
    tombstone["deleted"] = json!(true);
    push(&server, &token, "c", Uuid::new_v4(), json!([tombstone])).await;

    let pulled = pull(&server, &token, before, &[("schema_types", form_type.clone())]).await;
    let records = pulled["records"].as_array().unwrap();
    assert_eq!(records.len(), 1, "only the latest state of an id is returned");
    assert_eq!(records[0]["deleted"], json!(true));
    let deleted_version = records[0]["version"].as_i64().unwrap();

    // A later push resurrects under a fresh version.
    push(&server, &token, "c", Uuid::new_v4(), json!([record(&obs_id, &form_type)])).await;
    let revived = pull(&server, &token, before, &[("schema_types", form_type)]).await;
    let records = revived["records"].as_array().unwrap();
    assert_eq!(records[0]["deleted"], json!(false));
    assert!(records[0]["version"].as_i64().unwrap() > deleted_version);
}

#[tokio::test]
async fn concurrent_pushes_receive_distinct_versions() {
    let Some(pool) = common::try_test_pool().await else {
        eprintln!("skipping: SYNKRONUS_TEST_DATABASE_URL not set");
        return;
    };
    let server = common::spawn_server(pool).await;
    let (_, token) = server.user_token(Role::ReadWrite).await;

    let form_type = format!("burst_{}", server.run_id);
    let before = server.current_version(&token).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let client = server.client.clone();
        let url = format!("{}/sync/push", server.url);
        let token = token.clone();
        let body = json!({
            "client_id": format!("burst-{i}"),
            "transmission_id": Uuid::new_v4(),
            "records": [record(&format!("burst-{}-{}", server.run_id, i), &form_type)],
        });
        handles.push(tokio::spawn(async move {
            let resp = client.post(url).bearer_auth(token).json(&body).send().await.unwrap();
            assert_eq!(resp.status(), 200);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let pulled = pull(
        &server,
        &token,
        before,
        &[("schema_types", form_type), ("limit", "100".to_string())],
    )
    .await;
    let versions: Vec<i64> =
        pulled["records"].as_array().unwrap().iter().map(|r| r["version"].as_i64().unwrap()).collect();
    assert_eq!(versions.len(), 10);
    let unique: std::collections::BTreeSet<i64> = versions.iter().copied().collect();
    assert_eq!(unique.len(), 10, "no two writes may share a version");
    let mut sorted = versions.clone();
    sorted.sort_unstable();
    assert_eq!(versions, sorted, "pull must order by ascending version");
}
