//! Snapshot Fetcher Integration Tests
//!
//! Exercises pagination, cross-referencing, enrichment, and the
//! partial-failure policy against a mocked upstream REST API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lookout_relay::infrastructure::snapshot::{
    SnapshotError, SnapshotFetcher, SnapshotSettings, UpstreamApi, WorldCache,
};
use lookout_relay::infrastructure::upstream::SessionToken;

fn fetcher_for(server: &MockServer, page_size: usize) -> SnapshotFetcher {
    let api = UpstreamApi::new(
        reqwest::Client::new(),
        server.uri(),
        "lookout-relay/test".to_string(),
    );
    let worlds = Arc::new(WorldCache::new(Duration::from_secs(3600)));
    SnapshotFetcher::new(
        api,
        worlds,
        SnapshotSettings {
            page_size,
            batch_size: 4,
            batch_delay: Duration::ZERO,
        },
    )
}

fn token() -> SessionToken {
    SessionToken::new("authcookie_test").unwrap()
}

fn friend_json(id: &str, location: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "displayName": format!("name-{id}"),
        "status": "active",
        "statusDescription": "",
        "userIcon": "",
        "platform": "standalonewindows",
        "location": location,
    })
}

#[tokio::test]
async fn paginates_until_short_page_and_cross_references_favorites() {
    let server = MockServer::start().await;

    // Two online friends on the first (full) page, one on the short page.
    Mock::given(method("GET"))
        .and(path("/auth/user/friends"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            friend_json("usr_1", "wrld_a:1~friends(usr_1)"),
            friend_json("usr_2", "wrld_a:1~friends(usr_1)"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/user/friends"))
        .and(query_param("offset", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([friend_json("usr_3", "private")])),
        )
        .mount(&server)
        .await;

    // usr_1 and usr_9 favorited; usr_9 is not online.
    Mock::given(method("GET"))
        .and(path("/favorites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "fvrt_1", "type": "friend", "favoriteId": "usr_1", "tags": ["group_0"] },
            { "id": "fvrt_2", "type": "friend", "favoriteId": "usr_9", "tags": ["group_1"] },
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/usr_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "usr_9",
            "displayName": "name-usr_9",
            "status": "offline",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/worlds/wrld_a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "wrld_a",
            "name": "The Garden",
            "thumbnailImageUrl": "https://img.test/garden.png",
            "capacity": 32,
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/instances/wrld_a:1~friends(usr_1)"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "nUsers": 5 })),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 2);
    let snapshot = fetcher.fetch(&token()).await.unwrap();

    assert_eq!(snapshot.friends.len(), 3);

    let usr_1 = snapshot.friends.iter().find(|f| f.id == "usr_1").unwrap();
    assert!(usr_1.is_favorite);
    assert_eq!(usr_1.favorite_group.as_deref(), Some("group_0"));
    assert_eq!(usr_1.world_name.as_deref(), Some("The Garden"));
    assert_eq!(usr_1.occupant_count, Some(5));

    let usr_2 = snapshot.friends.iter().find(|f| f.id == "usr_2").unwrap();
    assert!(!usr_2.is_favorite);
    assert_eq!(usr_2.world_name.as_deref(), Some("The Garden"));

    // Sentinel locations get no world enrichment.
    let usr_3 = snapshot.friends.iter().find(|f| f.id == "usr_3").unwrap();
    assert!(usr_3.world_name.is_none());

    assert_eq!(snapshot.offline_friends.len(), 1);
    let usr_9 = &snapshot.offline_friends[0];
    assert_eq!(usr_9.id, "usr_9");
    assert_eq!(usr_9.location, "offline");
    assert!(usr_9.is_favorite);
    assert_eq!(usr_9.favorite_group.as_deref(), Some("group_1"));
}

#[tokio::test]
async fn enrichment_failures_are_swallowed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/user/friends"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([friend_json("usr_1", "wrld_gone:7")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favorites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/worlds/wrld_gone"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/instances/wrld_gone:7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    let snapshot = fetcher.fetch(&token()).await.unwrap();

    // The friend survives; only the enrichment is missing.
    assert_eq!(snapshot.friends.len(), 1);
    assert!(snapshot.friends[0].world_name.is_none());
    assert!(snapshot.friends[0].occupant_count.is_none());
}

#[tokio::test]
async fn primary_read_failure_with_no_pages_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/user/friends"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    assert!(matches!(
        fetcher.fetch(&token()).await,
        Err(SnapshotError::NoData(_))
    ));
}

#[tokio::test]
async fn page_failure_after_success_keeps_partial_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/user/friends"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            friend_json("usr_1", "private"),
            friend_json("usr_2", "private"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/user/friends"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favorites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 2);
    let snapshot = fetcher.fetch(&token()).await.unwrap();
    assert_eq!(snapshot.friends.len(), 2);
}

#[tokio::test]
async fn rejected_credential_is_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/user/friends"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    assert!(matches!(
        fetcher.fetch(&token()).await,
        Err(SnapshotError::Unauthorized)
    ));
}

#[tokio::test]
async fn world_cache_serves_repeat_lookups() {
    let server = MockServer::start().await;

    // The mock would fail a second fetch; the cache must absorb it.
    Mock::given(method("GET"))
        .and(path("/worlds/wrld_a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "wrld_a",
            "name": "The Garden",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, 100);
    let first = fetcher.resolve_world(&token(), "wrld_a").await.unwrap();
    let second = fetcher.resolve_world(&token(), "wrld_a").await.unwrap();
    assert_eq!(first, second);
}
