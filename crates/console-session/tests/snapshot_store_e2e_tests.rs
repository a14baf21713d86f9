//! End-to-end tests for the snapshot store against a mock console API.
//!
//! wiremock stands in for the permission endpoint; the store, resolver,
//! route guard and upload gate are exercised together the way the console
//! shell wires them.

use console_rbac::{Decision, Resolver, UploadContext, UploadGate};
use console_routes::{AllowReason, DenialReason, GuardState, RouteGuard};
use console_session::{
    AuthorizationMutation, CachePolicy, ServiceEndpoint, SessionConfig, SnapshotStore, StoreError,
    StoreStatus,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PERMISSIONS_PATH: &str = "/api/admin/auth/permissions";

/// Test fixture providing a mock console API.
struct TestFixture {
    /// Mock console server.
    server: MockServer,
    /// Session configuration pointing at the mock.
    config: SessionConfig,
}

impl TestFixture {
    async fn new() -> Self {
        let server = MockServer::start().await;
        let config = SessionConfig {
            endpoint: ServiceEndpoint {
                base_url: server.uri(),
                api_token: Some("test-token".to_string()),
            },
            permissions_path: PERMISSIONS_PATH.to_string(),
            timeout_secs: 5,
            max_retries: 1,
            cache_policy: CachePolicy::UntilInvalidated,
        };
        Self { server, config }
    }

    fn store(&self) -> SnapshotStore<console_session::HttpSnapshotFetcher> {
        SnapshotStore::from_config(&self.config).unwrap()
    }
}

fn editor_body() -> serde_json::Value {
    json!({
        "user_permissions": ["blog.read", "blog.create", "media.image.upload", "roles.read"],
        "is_superadmin": false,
        "all_permissions": {
            "blog": ["blog.read", "blog.create", "blog.update", "blog.delete"],
            "media": ["media.upload", "media.image.upload"],
            "roles": ["roles.read", "roles.update"]
        },
        "base_permissions": ["dashboard.read"]
    })
}

#[tokio::test]
async fn test_load_sends_bearer_token_and_decodes() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path(PERMISSIONS_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(editor_body()))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let store = fixture.store();
    let snapshot = store.load().await.unwrap();

    assert!(snapshot.is_granted("blog.create"));
    assert!(!snapshot.is_superadmin());
    assert!(snapshot.is_known("roles.update"));
    assert!(snapshot.base().contains("dashboard.read"));
    assert!(matches!(store.status(), StoreStatus::Ready { version: 1, .. }));

    // served from cache
    store.load().await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let mut fixture = TestFixture::new().await;
    fixture.config.max_retries = 3;

    Mock::given(method("GET"))
        .and(path(PERMISSIONS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let store = fixture.store();
    let err = store.load().await.unwrap_err();

    assert!(matches!(err, StoreError::Auth { status: 401 }));
    assert!(matches!(store.status(), StoreStatus::Failed { code: "AUTH_ERROR", .. }));
    assert!(store.current().is_none());
}

#[tokio::test]
async fn test_server_errors_are_retried_then_surfaced() {
    let mut fixture = TestFixture::new().await;
    fixture.config.max_retries = 2;

    Mock::given(method("GET"))
        .and(path(PERMISSIONS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(2)
        .mount(&fixture.server)
        .await;

    let store = fixture.store();
    let err = store.load().await.unwrap_err();

    match err {
        StoreError::Server { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("Expected server error, got {:?}", other),
    }
    assert_eq!(store.fetch_count(), 2);
}

#[tokio::test]
async fn test_malformed_body_fails_closed() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path(PERMISSIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&fixture.server)
        .await;

    let store = fixture.store();
    let err = store.load().await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_RESPONSE");

    let resolver = Resolver::new(store.clone());
    assert_eq!(resolver.check("blog.read"), Decision::Indeterminate);

    let guard = RouteGuard::admin_console(store.clone()).unwrap();
    assert_eq!(guard.route_decision("/admin/blog"), GuardState::Loading);

    assert!(store.current_or_deny_all().granted().is_empty());
}

#[tokio::test]
async fn test_mutation_triggers_refetch() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path(PERMISSIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(editor_body()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&fixture.server)
        .await;

    Mock::given(method("GET"))
        .and(path(PERMISSIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_permissions": ["blog.read"],
            "is_superadmin": false
        })))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let store = fixture.store();
    let resolver = Resolver::new(store.clone());

    store.load().await.unwrap();
    assert_eq!(resolver.check("blog.add"), Decision::Allow);

    store.notify_mutation(AuthorizationMutation::PermissionRoleLinkChanged);
    assert_eq!(resolver.check("blog.add"), Decision::Indeterminate);

    store.load().await.unwrap();
    assert_eq!(resolver.check("blog.add"), Decision::Deny);
    assert_eq!(resolver.check("blog.view"), Decision::Allow);
}

#[tokio::test]
async fn test_console_shell_flow() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path(PERMISSIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(editor_body()))
        .mount(&fixture.server)
        .await;

    let store = fixture.store();
    let guard = RouteGuard::admin_console(store.clone()).unwrap();
    let uploads = UploadGate::new(store.clone());

    // nothing loaded yet
    assert_eq!(guard.route_decision("/admin/blog/create"), GuardState::Loading);
    assert_eq!(
        uploads.can_upload_in_context(UploadContext::MediaLibrary),
        Decision::Indeterminate
    );
    assert_eq!(
        guard.route_decision("/login"),
        GuardState::Allowed { reason: AllowReason::Public }
    );

    store.load().await.unwrap();

    assert_eq!(
        guard.route_decision("/admin/blog/create"),
        GuardState::Allowed { reason: AllowReason::Permission }
    );
    assert_eq!(
        guard.route_decision("/admin"),
        GuardState::Allowed { reason: AllowReason::Authenticated }
    );

    match guard.route_decision("/admin/blog/7/edit") {
        GuardState::Denied(denial) => {
            assert_eq!(denial.rule_id, "blog-edit");
            assert_eq!(denial.missing_permission(), Some("blog.update"));
        }
        other => panic!("Expected denial, got {:?}", other),
    }
    match guard.route_decision("/admin/permissions") {
        GuardState::Denied(denial) => assert_eq!(denial.reason, DenialReason::SuperadminOnly),
        other => panic!("Expected denial, got {:?}", other),
    }

    assert_eq!(uploads.can_upload_in_context(UploadContext::MediaLibrary), Decision::Allow);
    assert_eq!(uploads.can_upload_in_context(UploadContext::Blog), Decision::Allow);
    assert_eq!(uploads.can_upload_in_context(UploadContext::Portfolio), Decision::Deny);

    // pessimistic revoke ahead of the server
    store.revoke_locally(["blog.create"]);
    assert!(guard.route_decision("/admin/blog/create").is_denied());
    assert_eq!(uploads.can_upload_in_context(UploadContext::Blog), Decision::Deny);
}
