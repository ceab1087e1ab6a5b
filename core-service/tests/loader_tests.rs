use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::Clock;
use bridge_traits::MemoryCredentialStore;
use chrono::{DateTime, TimeZone, Utc};
use core_auth::{LoginTokens, SessionInvalidationHook, SessionStatus, TimeRange};
use core_runtime::config::CoreConfig;
use core_runtime::events::{ApiEvent, CoreEvent};
use core_service::{CoreError, CoreService, SpotifyEndpoint};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }
}

/// Answers by URL path; unknown paths get a 404.
#[derive(Default)]
struct StubApi {
    routes: HashMap<&'static str, (u16, String)>,
    seen: Mutex<Vec<String>>,
}

impl StubApi {
    fn route(mut self, path: &'static str, status: u16, body: serde_json::Value) -> Self {
        self.routes.insert(path, (status, body.to_string()));
        self
    }
}

#[async_trait]
impl HttpClient for StubApi {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let path = url::Url::parse(&request.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(request.url.clone());

        Ok(match self.routes.get(path.as_str()) {
            Some((status, body)) => HttpResponse::new(*status, body.clone()),
            None => HttpResponse::new(404, "not found"),
        })
    }
}

struct Fixture {
    service: CoreService,
    api: Arc<StubApi>,
    store: Arc<MemoryCredentialStore>,
    hook_calls: Arc<AtomicUsize>,
}

fn fixture(api: StubApi) -> Fixture {
    let store = Arc::new(MemoryCredentialStore::with_entries([
        ("token", "A1"),
        ("refreshToken", "R1"),
        ("expirationDate", "1700003600000"),
    ]));
    let api = Arc::new(api);
    let config = CoreConfig::builder()
        .client_id("client-123")
        .api_base_url("https://api.example.com/v1")
        .credential_store(store.clone())
        .http_client(api.clone())
        .clock(Arc::new(FixedClock))
        .retry_policy(RetryPolicy::no_retry())
        .build()
        .unwrap();

    let hook_calls = Arc::new(AtomicUsize::new(0));
    let seen = hook_calls.clone();
    let hook: Arc<dyn SessionInvalidationHook> = Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    Fixture {
        service: CoreService::new(config, Some(hook)),
        api,
        store,
        hook_calls,
    }
}

#[tokio::test]
async fn dashboard_loads_all_sections() {
    let f = fixture(
        StubApi::default()
            .route("/v1/me/top/tracks", 200, json!({"items": [{"name": "Song"}]}))
            .route("/v1/me/top/artists", 200, json!({"items": [{"name": "Band"}]}))
            .route("/v1/me/player/recently-played", 200, json!({"items": []})),
    );

    let dashboard = f.service.load_dashboard(TimeRange::LongTerm).await.unwrap();

    assert_eq!(dashboard.time_range, "long_term");
    assert_eq!(dashboard.top_tracks["items"][0]["name"], "Song");
    assert_eq!(dashboard.top_artists["items"][0]["name"], "Band");
    assert!(dashboard.missing.is_empty());

    let seen = f.api.seen.lock().unwrap().clone();
    assert!(seen.contains(
        &"https://api.example.com/v1/me/top/tracks?limit=10&time_range=long_term".to_string()
    ));
    assert!(seen.contains(
        &"https://api.example.com/v1/me/player/recently-played?limit=10".to_string()
    ));
}

#[tokio::test]
async fn dashboard_degrades_when_one_section_fails() {
    let f = fixture(
        StubApi::default()
            .route("/v1/me/top/tracks", 200, json!({"items": []}))
            .route("/v1/me/top/artists", 500, json!({"error": "boom"}))
            .route("/v1/me/player/recently-played", 200, json!({"items": []})),
    );
    let mut events = f.service.subscribe();

    let dashboard = f.service.load_dashboard(TimeRange::default()).await.unwrap();

    assert!(dashboard.top_artists.is_null());
    assert_eq!(dashboard.missing, vec![SpotifyEndpoint::TopArtists]);
    assert!(!f.store.is_empty().await);

    let mut degraded = false;
    while let Ok(event) = events.try_recv() {
        if event == CoreEvent::Api(ApiEvent::BatchDegraded { failed: 1, total: 3 }) {
            degraded = true;
        }
    }
    assert!(degraded);
}

#[tokio::test]
async fn revoked_session_fails_the_whole_batch_once() {
    let f = fixture(
        StubApi::default()
            .route("/v1/me/top/tracks", 401, json!({}))
            .route("/v1/me/top/artists", 401, json!({}))
            .route("/v1/me/player/recently-played", 401, json!({})),
    );

    let err = f
        .service
        .load_dashboard(TimeRange::ShortTerm)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Aggregate(_)));
    assert!(err.requires_login());
    assert!(f.store.is_empty().await);
    assert_eq!(f.hook_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn profile_loads_user_and_counters() {
    let f = fixture(
        StubApi::default()
            .route("/v1/me", 200, json!({"display_name": "Listener"}))
            .route("/v1/me/tracks", 200, json!({"total": 120}))
            .route("/v1/me/following", 200, json!({"artists": {"total": 8}}))
            .route("/v1/me/playlists", 200, json!({"total": 4})),
    );

    let profile = f.service.load_profile().await.unwrap();

    assert_eq!(profile.user["display_name"], "Listener");
    assert_eq!(profile.saved_tracks["total"], 120);
    assert_eq!(profile.followed_artists["artists"]["total"], 8);
    assert_eq!(profile.playlists["total"], 4);
    assert!(profile.missing.is_empty());

    assert!(f
        .api
        .seen
        .lock()
        .unwrap()
        .contains(&"https://api.example.com/v1/me/following?type=artist&limit=1".to_string()));
}

#[tokio::test]
async fn sign_out_then_sign_in() {
    let f = fixture(StubApi::default().route("/v1/me", 200, json!({"id": "u"})));

    f.service.sign_out().await.unwrap();
    assert_eq!(
        f.service.session_status().await.unwrap(),
        SessionStatus::NoSession
    );

    let err = f
        .service
        .call("/me", Default::default())
        .await
        .unwrap_err();
    assert!(err.requires_login());

    f.service
        .sign_in(LoginTokens::new("B1", Some("R2".to_string()), 3600))
        .await
        .unwrap();
    let me = f.service.call("/me", Default::default()).await.unwrap();
    assert_eq!(me["id"], "u");
}
