use group_snapshot::graph::GraphClient;
use group_snapshot::load_config::{DirectorySettings, Secret};
use group_snapshot_core::contract::DirectoryClient;
use group_snapshot_core::error::DirectoryError;
use group_snapshot_core::query::DirectoryQuery;
use serde_json::json;
use wiremock::matchers::{
    body_string_contains, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

fn settings(server: &MockServer) -> DirectorySettings {
    DirectorySettings {
        graph_base_url: format!("{}/v1.0", server.uri()),
        authority: server.uri(),
        tenant_id: "tenant-1".into(),
        client_id: "client-1".into(),
        client_secret: Secret::new("secret-1"),
        page_size: None,
    }
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("client_secret=secret-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "graph-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn token_is_requested_once_and_reused() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(header("authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(2)
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    client.authenticate().await.expect("authenticate");
    client.list_users(&DirectoryQuery::new()).await.unwrap();
    client.list_users(&DirectoryQuery::new()).await.unwrap();
}

#[tokio::test]
async fn rejected_credentials_are_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client"
        })))
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    let err = client.authenticate().await.unwrap_err();
    match err {
        DirectoryError::Authentication { message } => assert!(message.contains("invalid_client")),
        other => panic!("expected authentication error, got {other:?}"),
    }
}

#[tokio::test]
async fn group_listing_follows_next_link() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .and(query_param_is_missing("$skiptoken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "g1", "displayName": "First" }],
            "@odata.nextLink": format!("{}/v1.0/groups?$skiptoken=page2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "g2", "displayName": "Second" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    let groups = client
        .list_groups(&DirectoryQuery::groups())
        .await
        .unwrap()
        .expect("groups present");
    let ids: Vec<_> = groups.iter().filter_map(|g| g.id.as_deref()).collect();
    assert_eq!(ids, vec!["g1", "g2"]);
}

#[tokio::test]
async fn members_are_read_with_user_cast_and_eventual_consistency() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members/microsoft.graph.user"))
        .and(query_param("$select", "id,displayName,mail"))
        .and(header("ConsistencyLevel", "eventual"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                { "id": "u1", "displayName": "Alice", "mail": "a@x.com" },
                { "id": "u2", "displayName": "Bob", "mail": null }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    let members = client
        .list_members("g1", &DirectoryQuery::user_members())
        .await
        .unwrap()
        .expect("members present");
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].display_name.as_deref(), Some("Alice"));
    assert_eq!(members[1].mail, None);
}

#[tokio::test]
async fn group_properties_are_projected() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1"))
        .and(query_param(
            "$select",
            "id,displayName,description,createdDateTime,mail,groupTypes,expirationDateTime",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "g1",
            "displayName": "Sales",
            "createdDateTime": "2021-01-01T00:00:00Z",
            "groupTypes": ["Unified"],
            "expirationDateTime": null
        })))
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    let group = client
        .get_group("g1", &DirectoryQuery::group_properties())
        .await
        .unwrap()
        .expect("group present");
    assert_eq!(group.display_name.as_deref(), Some("Sales"));
    assert_eq!(group.group_types, vec!["Unified".to_string()]);
    assert_eq!(group.expiration_date_time, None);
}

#[tokio::test]
async fn missing_resources_are_absent_payloads() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/owners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    assert!(client
        .get_group("gone", &DirectoryQuery::group_properties())
        .await
        .unwrap()
        .is_none());
    assert!(client
        .list_owners("g1", &DirectoryQuery::owners())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn server_errors_surface_status_and_body() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/memberOf"))
        .respond_with(ResponseTemplate::new(503).set_body_string("throttled"))
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    let err = client
        .list_group_memberships("g1", &DirectoryQuery::group_memberships())
        .await
        .unwrap_err();
    match err {
        DirectoryError::Status { status, body, url } => {
            assert_eq!(status, 503);
            assert_eq!(body, "throttled");
            assert!(url.contains("/groups/g1/memberOf"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

async fn mount_first_member_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members/microsoft.graph.user"))
        .and(query_param_is_missing("$skiptoken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "u1", "displayName": "Alice" }],
            "@odata.nextLink": format!(
                "{}/v1.0/groups/g1/members/microsoft.graph.user?$skiptoken=p2",
                server.uri()
            )
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn missing_later_page_discards_the_whole_collection() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_first_member_page(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members/microsoft.graph.user"))
        .and(query_param("$skiptoken", "p2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    let members = client
        .list_members("g1", &DirectoryQuery::user_members())
        .await
        .unwrap();
    assert!(members.is_none(), "truncated members returned: {members:?}");
}

#[tokio::test]
async fn later_page_without_value_discards_the_whole_collection() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_first_member_page(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups/g1/members/microsoft.graph.user"))
        .and(query_param("$skiptoken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    let members = client
        .list_members("g1", &DirectoryQuery::user_members())
        .await
        .unwrap();
    assert!(members.is_none(), "truncated members returned: {members:?}");
}

#[tokio::test]
async fn next_link_to_another_host_is_not_followed() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "g1" }],
            "@odata.nextLink": format!("{}/v1.0/groups?$skiptoken=p2", elsewhere.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(0)
        .mount(&elsewhere)
        .await;

    let client = GraphClient::new(&settings(&server)).unwrap();
    let err = client
        .list_groups(&DirectoryQuery::groups())
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Decode { .. }), "got {err:?}");
}
