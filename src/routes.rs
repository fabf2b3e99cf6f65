//! HTTP surface for the dashboard.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::access::AccessList;
use crate::agent::{
    ConfigStore, EmailAgentConfigurator, EmailAgentPatch, Reconciler, Tone, VoiceAgentConfig,
    VoiceAgentConfigurator, VoiceAgentPatch,
};
use crate::catalog::OptionCatalog;
use crate::config::StudioConfig;
use crate::error::LoadError;
use crate::host::{AgentDetailView, Navigator, ShellNavigator};
use crate::notify::{EmailDelivery, OnboardingNotifier, ToastLog, Toaster};
use crate::records::AgentRecordLoader;
use crate::render::BuildSimulator;
use crate::store::RelationalStore;

/// Header carrying the signed-in user's email.
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<OptionCatalog>,
    pub store: Arc<ConfigStore>,
    pub voice: Arc<VoiceAgentConfigurator>,
    pub email: Arc<EmailAgentConfigurator>,
    pub simulator: Arc<BuildSimulator>,
    pub records: Arc<dyn RelationalStore>,
    pub notifier: Arc<OnboardingNotifier>,
    pub navigator: Arc<ShellNavigator>,
    pub toasts: Arc<ToastLog>,
    pub access: Arc<AccessList>,
}

impl AppState {
    /// Wire every component around the given collaborators.
    pub fn new(
        config: &StudioConfig,
        catalog: OptionCatalog,
        records: Arc<dyn RelationalStore>,
        delivery: Arc<dyn EmailDelivery>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let reconciler = Reconciler::new(Arc::clone(&catalog));
        let store = ConfigStore::new(reconciler.initial_config());
        let navigator = ShellNavigator::new();
        let toasts = Arc::new(ToastLog::default());

        let simulator = BuildSimulator::new(
            Arc::clone(&store),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            catalog.stages().to_vec(),
            config.render.clone(),
        );
        let notifier = Arc::new(OnboardingNotifier::new(
            delivery,
            Arc::clone(&toasts) as Arc<dyn Toaster>,
            config.dashboard_url.clone(),
        ));

        Self {
            voice: Arc::new(VoiceAgentConfigurator::new(
                Arc::clone(&store),
                reconciler.clone(),
            )),
            email: Arc::new(EmailAgentConfigurator::new(Arc::clone(&store), reconciler)),
            catalog,
            store,
            simulator,
            records,
            notifier,
            navigator,
            toasts,
            access: Arc::new(AccessList::new(config.allowed_emails.clone())),
        }
    }

    /// A fresh detail view for one request. Each view owns its loader, so
    /// requests for different agents never supersede each other.
    pub fn detail_view(&self) -> AgentDetailView {
        let loader = AgentRecordLoader::new(
            Arc::clone(&self.records),
            Arc::clone(&self.toasts) as Arc<dyn Toaster>,
        );
        AgentDetailView::new(
            Arc::new(loader),
            Arc::clone(&self.notifier),
            Arc::clone(&self.navigator) as Arc<dyn Navigator>,
        )
    }
}

/// Build the dashboard router.
pub fn studio_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/catalog", get(get_catalog))
        .route("/api/voice-agent", get(get_voice).patch(patch_voice))
        .route("/api/voice-agent/tone", post(set_tone))
        .route("/api/voice-agent/prompt", post(generate_prompt))
        .route("/api/email-agent", get(get_email).patch(patch_email))
        .route(
            "/api/render",
            get(get_render).post(trigger_render).delete(reset_render),
        )
        .route("/api/session/reset", post(reset_session))
        .route("/api/agents/{id}", get(get_agent))
        .route("/api/agents/{id}/onboarding-email", post(send_onboarding))
        .route("/api/agents/{id}/back-to-dashboard", post(back_to_dashboard))
        .route("/api/navigation", get(get_navigation))
        .route("/api/notifications", get(get_notifications))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_allowed_email,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Reject requests whose `x-user-email` is not whitelisted. Requests without
/// the header pass through.
async fn require_allowed_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if let Some(value) = headers.get(USER_EMAIL_HEADER) {
        let email = value.to_str().unwrap_or_default();
        if !state.access.is_allowed(email) {
            warn!(email, path = %request.uri().path(), "Rejected non-whitelisted user");
            return error_response(StatusCode::FORBIDDEN, "Not on the access list");
        }
    }
    next.run(request).await
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "agent-studio"
    }))
}

async fn get_catalog(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.catalog.as_ref().clone())
}

// ── Voice agent ─────────────────────────────────────────────────────────

/// Voice config plus the option lists the form renders from it.
#[derive(Debug, Serialize)]
struct VoiceAgentView {
    config: VoiceAgentConfig,
    show_all_options: bool,
    provider_options: Vec<String>,
    model_versions: Vec<String>,
}

fn voice_view(state: &AppState, config: VoiceAgentConfig) -> VoiceAgentView {
    let reconciler = state.voice.reconciler();
    VoiceAgentView {
        show_all_options: reconciler.show_all_options(config.agent_type),
        provider_options: reconciler.provider_options(),
        model_versions: state.catalog.versions(&config.model_provider).to_vec(),
        config,
    }
}

async fn get_voice(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.store.voice().await;
    Json(voice_view(&state, config))
}

async fn patch_voice(
    State(state): State<AppState>,
    Json(patch): Json<VoiceAgentPatch>,
) -> Response {
    if let Some(Some(files)) = &patch.knowledge_files {
        if let Err(reason) = state.catalog.upload_limits().check(files) {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, reason);
        }
    }
    let config = state.voice.update(patch).await;
    Json(voice_view(&state, config)).into_response()
}

#[derive(Debug, Deserialize)]
struct ToneRequest {
    tone: Tone,
    selected: bool,
}

async fn set_tone(State(state): State<AppState>, Json(req): Json<ToneRequest>) -> impl IntoResponse {
    let config = state.voice.set_tone(req.tone, req.selected).await;
    Json(voice_view(&state, config))
}

async fn generate_prompt(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.voice.generate_prompt().await;
    Json(voice_view(&state, config))
}

// ── Email agent ─────────────────────────────────────────────────────────

async fn get_email(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.email().await)
}

async fn patch_email(
    State(state): State<AppState>,
    Json(patch): Json<EmailAgentPatch>,
) -> Response {
    if let Some(Some(files)) = &patch.knowledge_files {
        if let Err(reason) = state.catalog.upload_limits().check(files) {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, reason);
        }
    }
    Json(state.email.update(patch).await).into_response()
}

// ── Build pipeline ──────────────────────────────────────────────────────

async fn get_render(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.simulator.state().await)
}

async fn trigger_render(State(state): State<AppState>) -> Response {
    match state.simulator.trigger().await {
        Ok(()) => (StatusCode::ACCEPTED, Json(state.simulator.state().await)).into_response(),
        Err(e) => error_response(StatusCode::CONFLICT, e.to_string()),
    }
}

async fn reset_render(State(state): State<AppState>) -> impl IntoResponse {
    state.simulator.cancel().await;
    Json(state.simulator.state().await)
}

async fn reset_session(State(state): State<AppState>) -> impl IntoResponse {
    state.simulator.reset().await;
    state.store.reset().await;
    info!("Session reset via API");
    Json(state.store.snapshot().await)
}

// ── Persisted agents ────────────────────────────────────────────────────

fn load_error_response(e: &LoadError) -> Response {
    let status = match e {
        LoadError::EmptyIdentifier => StatusCode::BAD_REQUEST,
        LoadError::NotFound { .. } => StatusCode::NOT_FOUND,
        LoadError::Superseded { .. } => StatusCode::CONFLICT,
        LoadError::Backend(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e.user_message())
}

async fn get_agent(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.detail_view().loader().load(&id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => load_error_response(&e),
    }
}

async fn send_onboarding(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let actions = match state.detail_view().open(&id).await {
        Ok(actions) => actions,
        Err(e) => return load_error_response(&e),
    };
    let Some(send) = actions.take_send_onboarding() else {
        return error_response(StatusCode::CONFLICT, "Onboarding email already requested");
    };
    match send().await {
        Ok(()) => Json(serde_json::json!({ "status": "sent", "agent_id": id })).into_response(),
        Err(_) => error_response(
            StatusCode::BAD_GATEWAY,
            "Failed to send onboarding email. Please try again.",
        ),
    }
}

async fn back_to_dashboard(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let actions = match state.detail_view().open(&id).await {
        Ok(actions) => actions,
        Err(e) => return load_error_response(&e),
    };
    let Some(back) = actions.take_back_to_dashboard() else {
        return error_response(StatusCode::CONFLICT, "Already navigating");
    };
    match back().await {
        Ok(()) => Json(state.navigator.state().await).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

// ── Shell ───────────────────────────────────────────────────────────────

async fn get_navigation(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.navigator.state().await)
}

async fn get_notifications(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.toasts.recent())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::error::{DatabaseError, DeliveryError};
    use crate::notify::OutboundEmail;
    use crate::store::{Filter, Row};

    struct EmptyStore;

    #[async_trait]
    impl RelationalStore for EmptyStore {
        async fn fetch_one(&self, table: &str, filter: &Filter) -> Result<Row, DatabaseError> {
            Err(DatabaseError::NotFound {
                entity: table.into(),
                id: filter.value.clone(),
            })
        }

        async fn fetch_many(&self, _table: &str, _filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
            Ok(Vec::new())
        }
    }

    struct NoDelivery;

    #[async_trait]
    impl EmailDelivery for NoDelivery {
        async fn deliver(&self, _email: &OutboundEmail) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn app(allowed: &[&str]) -> Router {
        let config = StudioConfig {
            allowed_emails: allowed.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        let state = AppState::new(
            &config,
            OptionCatalog::default(),
            Arc::new(EmptyStore),
            Arc::new(NoDelivery),
        );
        studio_routes(state)
    }

    #[tokio::test]
    async fn non_whitelisted_user_is_forbidden() {
        let response = app(&["@acme.com"])
            .oneshot(
                Request::builder()
                    .uri("/api/voice-agent")
                    .header(USER_EMAIL_HEADER, "eve@evil.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn whitelisted_user_passes() {
        let response = app(&["@acme.com"])
            .oneshot(
                Request::builder()
                    .uri("/api/voice-agent")
                    .header(USER_EMAIL_HEADER, "ops@acme.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_agent_is_404() {
        let response = app(&["*"])
            .oneshot(
                Request::builder()
                    .uri("/api/agents/missing-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let body = serde_json::json!({
            "knowledge_files": [
                { "name": "huge.pdf", "size_bytes": 50u64 * 1024 * 1024, "content_type": "application/pdf" }
            ]
        });
        let response = app(&["*"])
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/api/voice-agent")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    /// Agents exist for every id; "slow" takes 100 ms to come back.
    struct SlowStore;

    #[async_trait]
    impl RelationalStore for SlowStore {
        async fn fetch_one(&self, _table: &str, filter: &Filter) -> Result<Row, DatabaseError> {
            if filter.value == "slow" {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            let mut agent = crate::records::AgentRow::new(filter.value.clone());
            agent.email = Some(format!("{}@acme.com", filter.value));
            Ok(serde_json::to_value(agent).unwrap().as_object().cloned().unwrap())
        }

        async fn fetch_many(&self, _table: &str, _filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingDelivery {
        sent: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl EmailDelivery for CountingDelivery {
        async fn deliver(&self, _email: &OutboundEmail) -> Result<(), DeliveryError> {
            self.sent.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn overlapping_agent_requests_do_not_supersede_each_other() {
        let delivery = Arc::new(CountingDelivery::default());
        let state = AppState::new(
            &StudioConfig::default(),
            OptionCatalog::default(),
            Arc::new(SlowStore),
            Arc::clone(&delivery) as Arc<dyn EmailDelivery>,
        );
        let router = studio_routes(state);

        let send = router.clone().oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/agents/slow/onboarding-email")
                .body(Body::empty())
                .unwrap(),
        );
        let fetch = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            router
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/api/agents/fast")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
        };

        let (send, fetch) = tokio::join!(send, fetch);
        assert_eq!(send.unwrap().status(), StatusCode::OK);
        assert_eq!(fetch.unwrap().status(), StatusCode::OK);
        assert_eq!(delivery.sent.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn back_to_dashboard_navigates() {
        let state = AppState::new(
            &StudioConfig::default(),
            OptionCatalog::default(),
            Arc::new(SlowStore),
            Arc::new(NoDelivery),
        );
        let navigator = Arc::clone(&state.navigator);
        let response = studio_routes(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/agents/fast/back-to-dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(navigator.history().await, vec!["/dashboard".to_string()]);
    }
}
