use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::shared_wheel_game::*;
use shared::{PlaySource, RecordingWheel, RuleSource, SpinErrorKind, SpinSession, WheelConfig};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::playbasis::PlaybasisClient;

const SESSION_EXPIRY: Duration = Duration::from_secs(1800);

type NotificationLog = Arc<StdMutex<Vec<Notification>>>;

pub struct WheelSessionEntry {
    pub session: SpinSession,
    notifications: NotificationLog,
    expires_at: Instant,
}

impl WheelSessionEntry {
    fn new(mut session: SpinSession) -> Self {
        let notifications = collect_notifications(&mut session);
        Self {
            session,
            notifications,
            expires_at: Instant::now() + SESSION_EXPIRY,
        }
    }

    fn drain_notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .map(|mut log| std::mem::take(&mut *log))
            .unwrap_or_default()
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

pub struct WheelGameState {
    pub sessions: Mutex<HashMap<String, WheelSessionEntry>>,
    pub client: PlaybasisClient,
    pub config: WheelConfig,
}

impl WheelGameState {
    pub fn new(client: PlaybasisClient, config: WheelConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            client,
            config,
        }
    }

    /// Drops every session past its expiry. Returns how many went.
    async fn cleanup_expired_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired());
        before - sessions.len()
    }
}

fn push(log: &NotificationLog, notification: Notification) {
    if let Ok(mut log) = log.lock() {
        log.push(notification);
    }
}

/// Subscribes a queue to all four channels of the session.
fn collect_notifications(session: &mut SpinSession) -> NotificationLog {
    let log: NotificationLog = Arc::new(StdMutex::new(Vec::new()));
    let events = session.events_mut();

    let ready = log.clone();
    events
        .on_ready
        .subscribe(move |pool| push(&ready, Notification::Ready { pool: pool.clone() }));
    let error = log.clone();
    events
        .on_error
        .subscribe(move |err| push(&error, Notification::from(err.clone())));
    let success = log.clone();
    events
        .on_success
        .subscribe(move |grant| push(&success, Notification::Success { grant: grant.clone() }));
    let known = log.clone();
    events
        .on_known_result_reward
        .subscribe(move |reward| push(&known, Notification::KnownResultReward { reward: reward.clone() }));

    log
}

/// Looks a session up, dropping it if it has outlived its expiry.
fn live_session<'a>(
    sessions: &'a mut HashMap<String, WheelSessionEntry>,
    session_id: &str,
) -> Result<&'a mut WheelSessionEntry, AppError> {
    let expired = match sessions.get(session_id) {
        None => return Err(AppError::SessionNotFound),
        Some(entry) => entry.is_expired(),
    };
    if expired {
        sessions.remove(session_id);
        info!("🎡 Wheel session {} expired", session_id);
        return Err(AppError::SessionExpired);
    }
    sessions.get_mut(session_id).ok_or(AppError::SessionNotFound)
}

fn session_response(session_id: &str, entry: &WheelSessionEntry) -> WheelSessionResponse {
    WheelSessionResponse {
        session_id: session_id.to_string(),
        snapshot: entry.session.snapshot(),
        notifications: entry.drain_notifications(),
    }
}

pub fn create_router() -> Router<Arc<WheelGameState>> {
    Router::new()
        .route("/session", post(new_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/spin", post(spin))
        .route("/session/:id/settled", post(animation_settled))
        .route("/session/:id/reload", post(reload))
}

async fn new_session(
    State(state): State<Arc<WheelGameState>>,
    body: Option<Json<NewWheelSessionRequest>>,
) -> Result<Json<WheelSessionResponse>, AppError> {
    let dropped = state.cleanup_expired_sessions().await;
    if dropped > 0 {
        info!("🎡 Dropped {} expired wheel sessions", dropped);
    }

    let mut config = state.config.clone();
    if let Some(player_id) = body.and_then(|Json(request)| request.player_id) {
        config.player_id = Some(player_id);
    }

    let mut entry = WheelSessionEntry::new(SpinSession::new(config));
    if let Err(err) = entry.session.activate(&state.client).await {
        if matches!(err.kind, SpinErrorKind::ConfigurationMissing | SpinErrorKind::InvalidConfiguration) {
            warn!("🎡 Wheel session refused: {}", err);
            return Err(err.into());
        }
        warn!("🎡 Wheel session created without a pool: {}", err);
    }

    let session_id = Uuid::new_v4().to_string();
    let response = session_response(&session_id, &entry);
    info!("🎡 WHEEL SESSION: {} ({:?})", session_id, response.snapshot.phase);
    state.sessions.lock().await.insert(session_id, entry);
    Ok(Json(response))
}

async fn get_session(
    State(state): State<Arc<WheelGameState>>,
    Path(session_id): Path<String>,
) -> Result<Json<WheelSessionResponse>, AppError> {
    let mut sessions = state.sessions.lock().await;
    let entry = live_session(&mut sessions, &session_id)?;
    Ok(Json(session_response(&session_id, entry)))
}

#[axum::debug_handler]
async fn spin(
    State(state): State<Arc<WheelGameState>>,
    Path(session_id): Path<String>,
) -> Result<Json<WheelSpinResponse>, AppError> {
    let request = {
        let mut sessions = state.sessions.lock().await;
        live_session(&mut sessions, &session_id)?.session.begin_spin()?
    };

    // the store stays unlocked while the rewards service decides
    let result = state
        .client
        .execute_rule(&request.action, &request.player_id, &request.params)
        .await;

    let mut sessions = state.sessions.lock().await;
    let entry = sessions.get_mut(&session_id).ok_or(AppError::SessionNotFound)?;
    let mut wheel = RecordingWheel::default();
    let outcome = entry.session.complete_spin(result, &mut wheel)?;
    info!("🎡 WHEEL SPIN: {} -> {:?}", session_id, outcome);

    Ok(Json(WheelSpinResponse {
        snapshot: entry.session.snapshot(),
        rotate_to: wheel.last(),
        notifications: entry.drain_notifications(),
    }))
}

async fn animation_settled(
    State(state): State<Arc<WheelGameState>>,
    Path(session_id): Path<String>,
) -> Result<Json<WheelSessionResponse>, AppError> {
    let mut sessions = state.sessions.lock().await;
    let entry = live_session(&mut sessions, &session_id)?;
    entry.session.animation_settled()?;
    Ok(Json(session_response(&session_id, entry)))
}

async fn reload(
    State(state): State<Arc<WheelGameState>>,
    Path(session_id): Path<String>,
) -> Result<Json<WheelSessionResponse>, AppError> {
    // loading disarms the wheel, so the store can be released during the fetch
    let action = {
        let mut sessions = state.sessions.lock().await;
        live_session(&mut sessions, &session_id)?.session.begin_load()?
    };

    let fetched = state.client.fetch_rules(&action).await;

    let mut sessions = state.sessions.lock().await;
    let entry = sessions.get_mut(&session_id).ok_or(AppError::SessionNotFound)?;
    entry.session.finish_load(fetched)?;
    Ok(Json(session_response(&session_id, entry)))
}

async fn delete_session(
    State(state): State<Arc<WheelGameState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .lock()
        .await
        .remove(&session_id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(AppError::SessionNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::playbasis::mock::{failure, ok, point_grant, serve, wheel_rules, MockPlaybasis};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn wheel_config(player_id: Option<&str>) -> WheelConfig {
        WheelConfig {
            api_key: Some("key".to_string()),
            api_secret: Some("secret".to_string()),
            player_id: player_id.map(str::to_string),
            custom_param_values: vec!["home".to_string()],
            total_spin_chance: 2,
            ..WheelConfig::default()
        }
    }

    async fn app(mock: Arc<MockPlaybasis>, config: WheelConfig) -> (Router, Arc<WheelGameState>) {
        let base = serve(mock).await;
        let client = PlaybasisClient::new(&base, "key", "secret").unwrap();
        let state = Arc::new(WheelGameState::new(client, config));
        (create_router().with_state(state.clone()), state)
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn notification_types(body: &Value) -> Vec<String> {
        body["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["type"].as_str().unwrap().to_string())
            .collect()
    }

    async fn create(app: &Router, body: Option<Value>) -> (StatusCode, Value) {
        call(app, Method::POST, "/session", body).await
    }

    #[tokio::test]
    async fn test_create_session_loads_the_wheel() {
        let (app, state) = app(MockPlaybasis::new(wheel_rules(), point_grant("50")), wheel_config(Some("p1"))).await;
        let (status, body) = create(&app, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snapshot"]["phase"], "ready");
        assert_eq!(body["snapshot"]["input_armed"], true);
        assert_eq!(body["snapshot"]["sections"].as_array().unwrap().len(), 3);
        assert_eq!(body["snapshot"]["rule_id"], "r-wheel");
        assert_eq!(notification_types(&body), vec!["ready"]);
        assert_eq!(state.sessions.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_full_spin_cycle() {
        let (app, _) = app(MockPlaybasis::new(wheel_rules(), point_grant("50")), wheel_config(Some("p1"))).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        let (status, spun) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(spun["snapshot"]["phase"], "settling");
        assert_eq!(notification_types(&spun), vec!["success", "known_result_reward"]);
        assert_eq!(spun["notifications"][1]["reward"]["quantity"], "50");

        let section = spun["snapshot"]["target_section"].as_u64().unwrap() as usize;
        assert_eq!(spun["snapshot"]["sections"][section]["reward"]["quantity"], "50");
        assert!(spun["rotate_to"].as_f64().unwrap() >= 1800.0);

        let (status, settled) = call(&app, Method::POST, &format!("/session/{}/settled", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(settled["snapshot"]["phase"], "ready");
        assert_eq!(settled["snapshot"]["chances_remaining"], 1);
    }

    #[tokio::test]
    async fn test_second_spin_before_settling_conflicts() {
        let (app, _) = app(MockPlaybasis::new(wheel_rules(), point_grant("10")), wheel_config(Some("p1"))).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        let (status, body) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "SpinNotAccepted");
    }

    #[tokio::test]
    async fn test_missing_credentials_refuse_creation() {
        let config = WheelConfig { api_secret: None, ..wheel_config(Some("p1")) };
        let (app, state) = app(MockPlaybasis::new(wheel_rules(), point_grant("10")), config).await;
        let (status, body) = create(&app, None).await;
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(body["error"], "ConfigurationMissing");
        assert!(state.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_player_id_from_request_body() {
        let mock = MockPlaybasis::new(wheel_rules(), point_grant("10"));
        let (app, _) = app(mock.clone(), wheel_config(None)).await;
        let (_, created) = create(&app, Some(json!({ "player_id": "from-body" }))).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let form = mock.last_play_form.lock().unwrap().clone();
        assert_eq!(form.get("player_id").map(String::as_str), Some("from-body"));
        assert_eq!(form.get("url").map(String::as_str), Some("home"));
    }

    #[tokio::test]
    async fn test_spin_without_player_is_bad_request() {
        let (app, _) = app(MockPlaybasis::new(wheel_rules(), point_grant("10")), wheel_config(None)).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "PlayerIdMissing");

        let (_, read) = call(&app, Method::GET, &format!("/session/{}", id), None).await;
        assert_eq!(notification_types(&read), vec!["error"]);
        assert_eq!(read["snapshot"]["phase"], "ready");
    }

    #[tokio::test]
    async fn test_service_failure_rearms_the_wheel() {
        let mock = MockPlaybasis::new(wheel_rules(), failure("0999", "Engine down"));
        let (app, _) = app(mock, wheel_config(Some("p1"))).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "GrantFetchFailed");

        let (_, read) = call(&app, Method::GET, &format!("/session/{}", id), None).await;
        assert_eq!(read["snapshot"]["input_armed"], true);
        assert_eq!(read["snapshot"]["chances_remaining"], 2);
    }

    #[tokio::test]
    async fn test_unmatched_grant_spends_the_chance() {
        let mock = MockPlaybasis::new(wheel_rules(), point_grant("999"));
        let (app, _) = app(mock, wheel_config(Some("p1"))).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        let (status, spun) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(spun["rotate_to"], Value::Null);
        assert_eq!(notification_types(&spun), vec!["success", "error"]);
        assert_eq!(spun["notifications"][1]["kind"], "UnmatchedGrant");
        assert_eq!(spun["snapshot"]["chances_remaining"], 1);
    }

    #[tokio::test]
    async fn test_no_rule_still_creates_a_reloadable_session() {
        let mock = MockPlaybasis::new(json!([]), point_grant("10"));
        let (app, _) = app(mock.clone(), wheel_config(Some("p1"))).await;
        let (status, created) = create(&app, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["snapshot"]["phase"], "failed");
        assert_eq!(created["notifications"][0]["kind"], "NoApplicableRule");

        *mock.rules.lock().unwrap() = wheel_rules();
        let id = created["session_id"].as_str().unwrap().to_string();
        let (status, reloaded) = call(&app, Method::POST, &format!("/session/{}/reload", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reloaded["snapshot"]["phase"], "ready");
        assert_eq!(notification_types(&reloaded), vec!["ready"]);
    }

    #[tokio::test]
    async fn test_reload_failure_reports_the_error() {
        let mock = MockPlaybasis::new(wheel_rules(), point_grant("10"));
        let (app, _) = app(mock.clone(), wheel_config(Some("p1"))).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        *mock.rules.lock().unwrap() = json!([]);
        let (status, body) = call(&app, Method::POST, &format!("/session/{}/reload", id), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "NoApplicableRule");

        let (_, read) = call(&app, Method::GET, &format!("/session/{}", id), None).await;
        assert_eq!(read["snapshot"]["phase"], "ready");
        assert_eq!(read["snapshot"]["sections"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_session_refuses_spins() {
        let config = WheelConfig { total_spin_chance: 1, ..wheel_config(Some("p1")) };
        let (app, _) = app(MockPlaybasis::new(wheel_rules(), point_grant("10")), config).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        let (_, settled) = call(&app, Method::POST, &format!("/session/{}/settled", id), None).await;
        assert_eq!(settled["snapshot"]["phase"], "exhausted");

        let (status, _) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_null_play_response_is_bad_gateway() {
        let (app, _) = app(MockPlaybasis::new(wheel_rules(), ok(Value::Null)), wheel_config(Some("p1"))).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();
        let (status, body) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "NoRewardResult");
    }

    #[tokio::test]
    async fn test_unknown_and_deleted_sessions() {
        let (app, _) = app(MockPlaybasis::new(wheel_rules(), point_grant("10")), wheel_config(Some("p1"))).await;
        let (status, _) = call(&app, Method::GET, "/session/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();
        let (status, _) = call(&app, Method::DELETE, &format!("/session/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::POST, &format!("/session/{}/spin", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let (app, state) = app(MockPlaybasis::new(wheel_rules(), point_grant("10")), wheel_config(Some("p1"))).await;
        let (_, created) = create(&app, None).await;
        let id = created["session_id"].as_str().unwrap().to_string();

        if let Some(entry) = state.sessions.lock().await.get_mut(&id) {
            entry.expires_at = Instant::now();
        }
        let (status, body) = call(&app, Method::GET, &format!("/session/{}", id), None).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"], "SessionExpired");
        assert!(state.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_creating_a_session_sweeps_stale_ones() {
        let (app, state) = app(MockPlaybasis::new(wheel_rules(), point_grant("10")), wheel_config(Some("p1"))).await;
        let (_, stale) = create(&app, None).await;
        let stale_id = stale["session_id"].as_str().unwrap().to_string();
        let (_, live) = create(&app, None).await;
        let live_id = live["session_id"].as_str().unwrap().to_string();

        if let Some(entry) = state.sessions.lock().await.get_mut(&stale_id) {
            entry.expires_at = Instant::now();
        }
        let (status, fresh) = create(&app, None).await;
        assert_eq!(status, StatusCode::OK);

        let sessions = state.sessions.lock().await;
        assert_eq!(sessions.len(), 2);
        assert!(!sessions.contains_key(&stale_id));
        assert!(sessions.contains_key(&live_id));
        assert!(sessions.contains_key(fresh["session_id"].as_str().unwrap()));
    }
}
