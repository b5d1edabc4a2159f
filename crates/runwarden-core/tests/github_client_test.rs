// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GitHub REST client tests against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use runwarden_core::discovery::github::GitHubConnector;
use runwarden_core::discovery::{DiscoveryCache, DiscoveryError, PlatformClient, PlatformConnector};
use runwarden_core::{Credential, Domain, Scope, ScopeKey};

fn connector(server: &MockServer) -> GitHubConnector {
    GitHubConnector::new(Url::parse(&server.uri()).unwrap(), Duration::from_secs(5)).unwrap()
}

fn client(server: &MockServer) -> Arc<dyn PlatformClient> {
    connector(server)
        .connect(&Domain::hosted(), &Credential::new("ghp_test"))
        .unwrap()
}

fn runners_body(names: &[(i64, &str)]) -> serde_json::Value {
    let runners: Vec<_> = names
        .iter()
        .map(|(id, name)| {
            json!({
                "id": id,
                "name": name,
                "os": "linux",
                "status": "online",
                "busy": false,
                "labels": [{"id": 1, "name": "self-hosted", "type": "read-only"}]
            })
        })
        .collect();
    json!({ "total_count": runners.len(), "runners": runners })
}

fn quota_headers(template: ResponseTemplate, remaining: u64) -> ResponseTemplate {
    template
        .insert_header("x-ratelimit-limit", "5000")
        .insert_header("x-ratelimit-remaining", remaining.to_string().as_str())
        .insert_header("x-ratelimit-reset", "1700000000")
}

#[tokio::test]
async fn test_probe_uses_org_and_repo_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/octo"))
        .and(header("authorization", "Bearer ghp_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "octo"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "repo"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.probe_scope(&Scope::parse("octo").unwrap()).await.unwrap();
    client
        .probe_scope(&Scope::parse("octo/repo").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_listing_follows_link_header() {
    let server = MockServer::start().await;
    let next = format!(
        r#"<{}/repos/octo/repo/actions/runners?per_page=100&page=2>; rel="next""#,
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/actions/runners"))
        .and(query_param("per_page", "100"))
        .and(query_param("page", "1"))
        .respond_with(
            quota_headers(ResponseTemplate::new(200), 4999)
                .insert_header("link", next.as_str())
                .set_body_json(runners_body(&[(1, "runner-1"), (2, "runner-2")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/repo/actions/runners"))
        .and(query_param("page", "2"))
        .respond_with(
            quota_headers(ResponseTemplate::new(200), 4998)
                .set_body_json(runners_body(&[(3, "Runner-3")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = DiscoveryCache::new(Duration::from_secs(1));
    let credential = Credential::new("ghp_test");
    let platform = connector(&server)
        .connect(&Domain::hosted(), &credential)
        .unwrap();
    let discovery = cache.client(platform, &Domain::hosted(), &credential);
    let scope = Scope::parse("octo/repo").unwrap();

    let runners = cache.cached_list_runners(&discovery, &scope).await.unwrap();
    let names: Vec<_> = runners.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["runner-1", "runner-2", "Runner-3"]);
    assert_eq!(runners[0].labels, vec!["self-hosted".to_string()]);

    let quota = cache
        .quota_tracker()
        .get_quota(&ScopeKey::new(Domain::hosted(), scope.clone()))
        .unwrap();
    assert_eq!(quota.remaining, 4998);
    assert_eq!(quota.limit, Some(5000));

    // Served from cache: the mocks' expect(1) would fail otherwise.
    let runner = cache
        .runner_exists(&discovery, &scope, "runner-3")
        .await
        .unwrap();
    assert_eq!(runner.id, 3);
}

#[tokio::test]
async fn test_org_listing_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/octo/actions/runners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(runners_body(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server)
        .list_runner_page(&Scope::parse("octo").unwrap(), 1)
        .await
        .unwrap();
    assert!(page.runners.is_empty());
    assert!(page.next_page.is_none());
    assert!(page.quota.is_none());
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/unauthorized"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/limited"))
        .respond_with(quota_headers(ResponseTemplate::new(403), 0))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/forbidden"))
        .respond_with(quota_headers(ResponseTemplate::new(403), 42))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/broken"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = client(&server);
    let probe = |name: &'static str| {
        let client = client.clone();
        async move { client.probe_scope(&Scope::parse(name).unwrap()).await }
    };

    assert!(matches!(
        probe("unauthorized").await,
        Err(DiscoveryError::Unauthorized)
    ));
    assert!(matches!(
        probe("ghost").await,
        Err(DiscoveryError::ScopeNotFound { ref scope }) if scope == "ghost"
    ));
    match probe("limited").await {
        Err(DiscoveryError::RateLimited { reset_at }) => {
            assert_eq!(reset_at.map(|t| t.timestamp()), Some(1_700_000_000));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert!(matches!(
        probe("forbidden").await,
        Err(DiscoveryError::Status { status: 403, .. })
    ));
    assert!(matches!(
        probe("broken").await,
        Err(DiscoveryError::Status { status: 502, .. })
    ));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/octo/actions/runners"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .list_runner_page(&Scope::parse("octo").unwrap(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::Decode(_)));
}

#[tokio::test]
async fn test_enterprise_domain_uses_api_v3() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/octo/repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "repo"})))
        .expect(1)
        .mount(&server)
        .await;

    let hosted = Url::parse("https://api.github.invalid/").unwrap();
    let connector = GitHubConnector::new(hosted, Duration::from_secs(5)).unwrap();
    let domain = Domain::parse(Some(&server.uri())).unwrap();

    connector
        .connect(&domain, &Credential::new("ghp_test"))
        .unwrap()
        .probe_scope(&Scope::parse("octo/repo").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_blank_credential_is_unauthorized() {
    let server = MockServer::start().await;
    let result = connector(&server).connect(&Domain::hosted(), &Credential::new(" "));
    assert!(matches!(result, Err(DiscoveryError::Unauthorized)));
}
