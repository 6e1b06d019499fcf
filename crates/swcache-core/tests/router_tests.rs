//! Integration tests for the Router.
//!
//! These drive the worker through its public handler surface with an
//! in-memory store and a scripted fetcher standing in for the network.

use std::sync::Arc;
use swcache_core::{
    header, CacheStore, ClientAction, Destination, DynCacheStore, FetchOutcome, HeaderValue,
    MemoryStore, Method, MessageReply, Request, RequestKey, Response, ResponseType, Router,
    ScriptedFetcher, SqliteStore, StatusCode, SyncReport, WorkerConfig, WorkerHandlers,
    WorkerMessage, WorkerState,
};
use tempfile::TempDir;
use url::Url;

const ORIGIN: &str = "https://blog.example";

struct TestEnv {
    router: Router,
    store: Arc<MemoryStore>,
    fetcher: Arc<ScriptedFetcher>,
}

fn create_env(config: WorkerConfig) -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(ScriptedFetcher::new());
    let router = Router::new(config, store.clone(), fetcher.clone()).unwrap();
    TestEnv {
        router,
        store,
        fetcher,
    }
}

fn default_env() -> TestEnv {
    create_env(WorkerConfig::for_origin(ORIGIN))
}

fn url(path: &str) -> String {
    format!("{}{}", ORIGIN, path)
}

fn key(path: &str) -> RequestKey {
    RequestKey::get(&Url::parse(&url(path)).unwrap())
}

fn image(path: &str) -> Request {
    Request::get(&url(path))
        .unwrap()
        .with_destination(Destination::Image)
}

fn font(path: &str) -> Request {
    Request::get(&url(path))
        .unwrap()
        .with_destination(Destination::Font)
}

fn page(path: &str) -> Request {
    Request::get(&url(path))
        .unwrap()
        .with_destination(Destination::Document)
        .with_header(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        )
}

fn body_of(outcome: &FetchOutcome) -> Option<String> {
    outcome.response().map(|r| r.body_text())
}

async fn stored_body(store: &MemoryStore, namespace: &str, path: &str) -> Option<String> {
    store
        .get(namespace, &key(path))
        .await
        .unwrap()
        .map(|stored| stored.response.body_text())
}

fn script_shell(fetcher: &ScriptedFetcher) {
    fetcher
        .respond(&url("/"), Response::ok("home"))
        .respond(&url("/offline.html"), Response::ok("you are offline"));
}

// ---------------------------------------------------------------------------
// Stale-while-revalidate (images)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_image_hit_serves_stale_then_refreshes() {
    let env = default_env();
    env.store
        .put("images-v1", &key("/img/cat.png"), &Response::ok("old"))
        .await
        .unwrap();
    env.fetcher.respond(&url("/img/cat.png"), Response::ok("new"));

    let outcome = env.router.on_fetch(&image("/img/cat.png")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("old"));

    env.router.background().wait_idle().await;
    assert_eq!(env.fetcher.call_count(&url("/img/cat.png")), 1);
    assert_eq!(
        stored_body(&env.store, "images-v1", "/img/cat.png").await.as_deref(),
        Some("new")
    );
}

#[tokio::test]
async fn test_image_miss_awaits_network() {
    let env = default_env();
    env.fetcher.respond(&url("/img/dog.png"), Response::ok("dog"));

    let outcome = env.router.on_fetch(&image("/img/dog.png")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("dog"));

    env.router.background().wait_idle().await;
    assert_eq!(
        stored_body(&env.store, "images-v1", "/img/dog.png").await.as_deref(),
        Some("dog")
    );
}

#[tokio::test]
async fn test_image_revalidation_failure_keeps_cached_copy() {
    let env = default_env();
    env.store
        .put("images-v1", &key("/img/cat.png"), &Response::ok("old"))
        .await
        .unwrap();
    env.fetcher.set_offline(true);

    let outcome = env.router.on_fetch(&image("/img/cat.png")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("old"));

    env.router.background().wait_idle().await;
    assert_eq!(env.router.background().failed(), 1);
    assert_eq!(
        stored_body(&env.store, "images-v1", "/img/cat.png").await.as_deref(),
        Some("old")
    );
}

#[tokio::test]
async fn test_image_revalidation_never_stores_error_or_opaque() {
    let env = default_env();
    env.store
        .put("images-v1", &key("/img/cat.png"), &Response::ok("old"))
        .await
        .unwrap();

    env.fetcher.respond(
        &url("/img/cat.png"),
        Response::new(StatusCode::NOT_FOUND).with_body("gone"),
    );
    let outcome = env.router.on_fetch(&image("/img/cat.png")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("old"));
    env.router.background().wait_idle().await;
    assert_eq!(
        stored_body(&env.store, "images-v1", "/img/cat.png").await.as_deref(),
        Some("old")
    );

    env.fetcher.respond(
        &url("/img/cat.png"),
        Response::ok("new").with_type(ResponseType::Opaque),
    );
    let outcome = env.router.on_fetch(&image("/img/cat.png")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("old"));
    env.router.background().wait_idle().await;
    assert_eq!(
        stored_body(&env.store, "images-v1", "/img/cat.png").await.as_deref(),
        Some("old")
    );
    assert_eq!(env.fetcher.call_count(&url("/img/cat.png")), 2);
}

#[tokio::test]
async fn test_image_miss_offline_is_empty() {
    let env = default_env();
    env.fetcher.set_offline(true);

    let outcome = env.router.on_fetch(&image("/img/none.png")).await;
    assert_eq!(outcome, FetchOutcome::Respond(None));
}

// ---------------------------------------------------------------------------
// Cache-first (fonts)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_font_fetched_once_then_cached() {
    let env = default_env();
    env.fetcher
        .respond(&url("/fonts/inter.woff2"), Response::ok("font-bytes"));

    let first = env.router.on_fetch(&font("/fonts/inter.woff2")).await;
    assert_eq!(body_of(&first).as_deref(), Some("font-bytes"));
    assert_eq!(
        stored_body(&env.store, "static-v1", "/fonts/inter.woff2").await.as_deref(),
        Some("font-bytes")
    );

    env.fetcher
        .respond(&url("/fonts/inter.woff2"), Response::ok("changed"));
    let second = env.router.on_fetch(&font("/fonts/inter.woff2")).await;
    assert_eq!(body_of(&second).as_deref(), Some("font-bytes"));
    assert_eq!(env.fetcher.call_count(&url("/fonts/inter.woff2")), 1);
}

#[tokio::test]
async fn test_uncacheable_font_is_returned_not_stored() {
    let env = default_env();
    env.fetcher.respond(
        &url("/fonts/cdn.woff2"),
        Response::ok("opaque").with_type(ResponseType::Opaque),
    );

    let outcome = env.router.on_fetch(&font("/fonts/cdn.woff2")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("opaque"));
    assert!(stored_body(&env.store, "static-v1", "/fonts/cdn.woff2").await.is_none());
}

// ---------------------------------------------------------------------------
// Bypass
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_non_get_never_touches_cache_or_network() {
    let env = default_env();
    let post = Request::new(Method::POST, Url::parse(&url("/comments")).unwrap());

    let outcome = env.router.on_fetch(&post).await;
    assert!(outcome.is_bypass());
    assert!(env.fetcher.calls().is_empty());
    assert!(env.store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_http_scheme_bypasses() {
    let env = default_env();
    let request = Request::get("chrome-extension://abc/script.js").unwrap();
    assert!(env.router.on_fetch(&request).await.is_bypass());
    assert!(env.fetcher.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Network-first
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_network_first_stores_and_overwrites() {
    let env = default_env();
    env.fetcher
        .respond(&url("/posts/hello"), Response::ok("first"));

    let outcome = env.router.on_fetch(&page("/posts/hello")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("first"));

    env.router.on_fetch(&page("/posts/hello")).await;
    let stats = env.router.stats().await.unwrap();
    assert_eq!(stats.total_entries, 1);

    env.fetcher
        .respond(&url("/posts/hello"), Response::ok("second"));
    env.router.on_fetch(&page("/posts/hello")).await;
    assert_eq!(
        stored_body(&env.store, "dynamic-v1", "/posts/hello").await.as_deref(),
        Some("second")
    );
}

#[tokio::test]
async fn test_error_and_opaque_responses_are_never_cached() {
    let env = default_env();
    env.fetcher
        .respond(&url("/missing"), Response::new(StatusCode::NOT_FOUND))
        .respond(
            &url("/widget.js"),
            Response::ok("x").with_type(ResponseType::Opaque),
        );

    let missing = env.router.on_fetch(&page("/missing")).await;
    assert_eq!(missing.response().map(|r| r.status), Some(StatusCode::NOT_FOUND));
    let widget = env.router.on_fetch(&Request::get(&url("/widget.js")).unwrap()).await;
    assert_eq!(body_of(&widget).as_deref(), Some("x"));

    assert!(stored_body(&env.store, "dynamic-v1", "/missing").await.is_none());
    assert!(stored_body(&env.store, "dynamic-v1", "/widget.js").await.is_none());
}

#[tokio::test]
async fn test_network_failure_falls_back_to_cache() {
    let env = default_env();
    env.fetcher
        .respond(&url("/posts/hello"), Response::ok("cached post"));
    env.router.on_fetch(&page("/posts/hello")).await;

    env.fetcher.set_offline(true);
    let outcome = env.router.on_fetch(&page("/posts/hello")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("cached post"));
}

#[tokio::test]
async fn test_offline_document_for_html_requests() {
    let env = default_env();
    script_shell(&env.fetcher);
    env.router.on_install().await.unwrap();

    env.fetcher.set_offline(true);
    let outcome = env.router.on_fetch(&page("/posts/never-seen")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("you are offline"));

    let json = Request::get(&url("/api/data"))
        .unwrap()
        .with_header(header::ACCEPT, HeaderValue::from_static("application/json"));
    assert_eq!(env.router.on_fetch(&json).await, FetchOutcome::Respond(None));
}

// ---------------------------------------------------------------------------
// Cache-only (precached)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_precached_paths_never_hit_network() {
    let env = default_env();
    script_shell(&env.fetcher);
    env.router.on_install().await.unwrap();
    let installs = env.fetcher.calls().len();

    let outcome = env
        .router
        .on_fetch(&Request::get(&url("/?utm_source=feed")).unwrap())
        .await;
    assert_eq!(body_of(&outcome).as_deref(), Some("home"));
    env.router.background().wait_idle().await;
    assert_eq!(env.fetcher.calls().len(), installs);
}

#[tokio::test]
async fn test_precached_miss_is_empty() {
    let env = default_env();
    let outcome = env.router.on_fetch(&page("/offline.html")).await;
    assert_eq!(outcome, FetchOutcome::Respond(None));
    assert!(env.fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_precached_background_update() {
    let env = create_env(WorkerConfig::for_origin(ORIGIN).with_revalidate_precached(true));
    script_shell(&env.fetcher);
    env.router.on_install().await.unwrap();

    env.fetcher.respond(&url("/"), Response::ok("home v2"));
    let outcome = env.router.on_fetch(&page("/")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("home"));

    env.router.background().wait_idle().await;
    assert_eq!(
        stored_body(&env.store, "static-v1", "/").await.as_deref(),
        Some("home v2")
    );
}

// ---------------------------------------------------------------------------
// Install / activate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_install_precaches_and_requests_skip_waiting() {
    let env = default_env();
    script_shell(&env.fetcher);

    let report = env.router.on_install().await.unwrap();
    assert_eq!(report.precached, 2);
    assert_eq!(report.namespace, "static-v1");
    assert!(report.skip_waiting);
    assert!(env.router.skip_waiting_requested());
    assert_eq!(env.router.state(), WorkerState::Installed);
}

#[tokio::test]
async fn test_install_is_all_or_nothing() {
    let env = default_env();
    env.fetcher
        .respond(&url("/"), Response::ok("home"))
        .fail(&url("/offline.html"));

    let err = env.router.on_install().await.unwrap_err();
    assert!(err.is_install_failure());
    assert!(!env.store.has_namespace("static-v1").await.unwrap());
    assert!(stored_body(&env.store, "static-v1", "/").await.is_none());
    assert_eq!(env.router.state(), WorkerState::Redundant);
}

#[tokio::test]
async fn test_activate_deletes_only_superseded_namespaces() {
    let env = create_env(WorkerConfig::for_origin(ORIGIN).with_version("v2"));
    script_shell(&env.fetcher);
    env.store.open("static-v1").await.unwrap();
    env.router.on_install().await.unwrap();
    env.store.open("dynamic-v2").await.unwrap();

    let report = env.router.on_activate().await.unwrap();
    assert_eq!(report.deleted, vec!["static-v1".to_string()]);
    assert!(report.claimed);
    assert_eq!(
        env.store.keys().await.unwrap(),
        vec!["static-v2".to_string(), "dynamic-v2".to_string()]
    );
    assert_eq!(env.router.state(), WorkerState::Activated);
    assert!(env.router.clients_claimed());
}

#[tokio::test]
async fn test_activate_keeps_retained_namespaces() {
    let config = WorkerConfig::for_origin(ORIGIN).with_retained_namespace("offline-page-v1");
    let env = create_env(config);
    script_shell(&env.fetcher);
    env.store.open("offline-page-v1").await.unwrap();
    env.store.open("dynamic-v0").await.unwrap();
    env.router.on_install().await.unwrap();

    let report = env.router.on_activate().await.unwrap();
    assert_eq!(report.deleted, vec!["dynamic-v0".to_string()]);
    assert!(env.store.has_namespace("offline-page-v1").await.unwrap());
}

// ---------------------------------------------------------------------------
// Leaf handlers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_messages() {
    let env = create_env(WorkerConfig::for_origin(ORIGIN).with_version("v3"));

    let reply = env.router.on_message(WorkerMessage::SkipWaiting).await;
    assert_eq!(
        reply,
        MessageReply::SkipWaiting {
            state: WorkerState::Parsed
        }
    );
    assert!(env.router.skip_waiting_requested());

    assert_eq!(
        env.router.on_message(WorkerMessage::GetVersion).await,
        MessageReply::Version {
            version: "v3".to_string()
        }
    );
    assert_eq!(
        env.router.on_message(WorkerMessage::ClaimClients).await,
        MessageReply::Claimed
    );
}

#[tokio::test]
async fn test_notification_click_actions() {
    let env = default_env();
    assert_eq!(
        env.router.on_notification_click(Some("close")),
        ClientAction::Close
    );
    assert_eq!(
        env.router.on_notification_click(Some("explore")),
        ClientAction::FocusOrOpen {
            url: "/".to_string()
        }
    );
}

#[tokio::test]
async fn test_sync_stores_feed_as_json() {
    let env = default_env();
    env.fetcher
        .respond(&url("/feed.json"), Response::ok(r#"{"posts": [1, 2]}"#));

    let report = env.router.on_sync("sync-posts").await.unwrap();
    assert!(matches!(report, SyncReport::Refreshed { .. }));

    let stored = env
        .store
        .get("dynamic-v1", &key("/feed.json"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.response.header("content-type"), Some("application/json"));
    assert_eq!(stored.response.body_text(), r#"{"posts":[1,2]}"#);
}

#[tokio::test]
async fn test_sync_rejects_non_json_feed() {
    let env = default_env();
    env.fetcher
        .respond(&url("/feed.json"), Response::ok("<html>oops</html>"));

    assert!(env.router.on_sync("sync-posts").await.is_err());
    assert!(stored_body(&env.store, "dynamic-v1", "/feed.json").await.is_none());
}

#[tokio::test]
async fn test_sync_network_failure_propagates() {
    let env = default_env();
    env.fetcher.set_offline(true);
    let err = env.router.on_sync("sync-posts").await.unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn test_sync_ignores_unknown_tags() {
    let env = default_env();
    let report = env.router.on_sync("sync-comments").await.unwrap();
    assert_eq!(
        report,
        SyncReport::Ignored {
            tag: "sync-comments".to_string()
        }
    );
    assert!(env.fetcher.calls().is_empty());
}

// ---------------------------------------------------------------------------
// SQLite-backed worker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_router_over_sqlite_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("swcache.sqlite");

    let fetcher = Arc::new(ScriptedFetcher::new());
    script_shell(&fetcher);

    {
        let store: DynCacheStore = Arc::new(SqliteStore::new(&db_path).unwrap());
        let router = Router::new(WorkerConfig::for_origin(ORIGIN), store, fetcher.clone()).unwrap();
        router.on_install().await.unwrap();
        router.on_activate().await.unwrap();
    }

    // A restarted host finds the precache on disk.
    fetcher.set_offline(true);
    let store: DynCacheStore = Arc::new(SqliteStore::new(&db_path).unwrap());
    let router = Router::new(WorkerConfig::for_origin(ORIGIN), store, fetcher).unwrap();
    let outcome = router.on_fetch(&page("/posts/anything")).await;
    assert_eq!(body_of(&outcome).as_deref(), Some("you are offline"));
}
