//! ==============================================================================
//! server.rs - http surface
//! ==============================================================================
//!
//! purpose:
//!     the route table, the auth gate in front of protected routes, the json
//!     api and the two sse streams (telemetry, notifications).
//!
//! routing:
//!
//! ```text
//!     public:  /  /login  /logout  /api/status  /api/session  /api/notifications
//!     gated:   /dashboard  /simulation  /settings  /admin  and the rest of /api
//!     other:   404 page
//!
//!     the gate sends pages to /login (303) and answers /api with 401.
//! ```
//!
//! relationships:
//!     - reads/writes: context.rs (behind Arc<RwLock<..>>)
//!     - renders: views.rs
//!     - mounts: telemetry.rs feeds, one per telemetry stream
//!
//! ==============================================================================

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::{
    extract::{Query, Request, State},
    http::{StatusCode, Uri},
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json, Redirect, Response,
    },
    routing::{get, post},
    Form, Router,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analytics::{admin_analytics, dashboard_analytics, region_count, PipelineStatus, RegionFilter};
use crate::context::{LoginFailure, SharedContext};
use crate::domain::ThresholdSettings;
use crate::session::{CredentialError, CredentialField};
use crate::simulation::SimulationError;
use crate::storage::StorageError;
use crate::telemetry::{now_ms, TelemetryFeed, TelemetryFrame, TelemetryGenerator};
use crate::thresholds::ThresholdError;
use crate::token::now_secs;
use crate::views;

// ==============================================================================
// state
// ==============================================================================

#[derive(Clone)]
pub struct ServerState {
    ctx: SharedContext,
    /// the 1s simulator ticker while the simulation runs
    simulation_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ServerState {
    pub fn new(ctx: SharedContext) -> Self {
        Self { ctx, simulation_task: Arc::new(Mutex::new(None)) }
    }
}

/// json error body for the api routes
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<ThresholdError> for ApiError {
    fn from(e: ThresholdError) -> Self {
        match e {
            ThresholdError::OutOfRange { .. } => ApiError(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ThresholdError::Storage(_) => ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl From<SimulationError> for ApiError {
    fn from(e: SimulationError) -> Self {
        ApiError(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

// ==============================================================================
// router
// ==============================================================================

pub fn app(ctx: SharedContext) -> Router {
    router(ServerState::new(ctx))
}

pub fn router(state: ServerState) -> Router {
    let gated = Router::new()
        .route("/dashboard", get(dashboard_page))
        .route("/simulation", get(simulation_page))
        .route("/simulation/toggle", post(simulation_toggle_form))
        .route("/simulation/reset", post(simulation_reset_form))
        .route("/simulation/population", post(simulation_population_form))
        .route("/settings", get(settings_page))
        .route("/settings/thresholds", post(settings_thresholds))
        .route("/settings/thresholds/reset", post(settings_thresholds_reset))
        .route("/settings/theme", post(settings_theme))
        .route("/admin", get(admin_page))
        .route("/api/thresholds", get(api_thresholds).put(api_update_thresholds))
        .route("/api/telemetry/stream", get(api_telemetry_stream))
        .route("/api/dashboard", get(api_dashboard))
        .route("/api/admin/analytics", get(api_admin_analytics))
        .route("/api/simulation", get(api_simulation))
        .route("/api/simulation/toggle", post(api_simulation_toggle))
        .route("/api/simulation/reset", post(api_simulation_reset))
        .route("/api/simulation/population", post(api_simulation_population))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/", get(landing_page))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", post(logout))
        .route("/api/status", get(api_status))
        .route("/api/session", get(api_session))
        .route("/api/notifications", get(api_notifications))
        .merge(gated)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// bind `bind` and serve until the process stops
pub async fn serve(ctx: SharedContext, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    serve_on(listener, ctx).await
}

/// serve on an already bound listener (tests bind port 0)
pub async fn serve_on(listener: tokio::net::TcpListener, ctx: SharedContext) -> anyhow::Result<()> {
    let period = ctx.read().await.config().status.period_seconds;
    let status_task = spawn_status_ticker(ctx.clone(), Duration::from_secs(period));

    tracing::info!("[SERVER] console live at http://{}", listener.local_addr()?);
    let result = axum::serve(listener, app(ctx)).await;
    status_task.abort();
    result.context("web server stopped")
}

/// redraw the public status badge every `period`
pub fn spawn_status_ticker(ctx: SharedContext, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let status = PipelineStatus::draw(&mut rng);
            ctx.write().await.set_public_status(status);
        }
    })
}

// ==============================================================================
// auth gate
// ==============================================================================

async fn require_auth(State(state): State<ServerState>, request: Request, next: Next) -> Response {
    let is_api = request.uri().path().starts_with("/api/");

    let live = state.ctx.read().await.has_live_session(now_secs());

    // expired or absent in memory: re-check what is persisted, fail closed
    if !live && !state.ctx.write().await.check_auth() {
        tracing::debug!(path = %request.uri().path(), "[AUTH] rejected unauthenticated request");
        return if is_api {
            ApiError(StatusCode::UNAUTHORIZED, "authentication required".into()).into_response()
        } else {
            Redirect::to("/login").into_response()
        };
    }

    next.run(request).await
}

// ==============================================================================
// public pages
// ==============================================================================

async fn landing_page(State(state): State<ServerState>) -> Html<String> {
    let ctx = state.ctx.read().await;
    Html(views::landing(ctx.public_status(), ctx.theme()))
}

async fn login_page(State(state): State<ServerState>) -> Response {
    let ctx = state.ctx.read().await;
    if ctx.has_live_session(now_secs()) {
        return Redirect::to("/dashboard").into_response();
    }
    Html(views::login(ctx.theme(), "", None)).into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    /// checkbox: present only when ticked
    remember: Option<String>,
}

async fn login_submit(State(state): State<ServerState>, Form(form): Form<LoginForm>) -> Response {
    let mut ctx = state.ctx.write().await;
    let result = ctx.login_with_credentials(&form.email, &form.password, form.remember.is_some());
    let error = match result {
        Ok(user) => {
            tracing::info!(email = %user.email, "[AUTH] signed in");
            return Redirect::to("/dashboard").into_response();
        }
        Err(LoginFailure::Credentials(e)) => e,
        Err(LoginFailure::Session(e)) => {
            tracing::warn!("[AUTH] session could not be established: {}", e);
            CredentialError { field: CredentialField::Password, message: e.to_string() }
        }
    };
    let page = views::login(ctx.theme(), &form.email, Some(&error));
    (StatusCode::UNAUTHORIZED, Html(page)).into_response()
}

async fn logout(State(state): State<ServerState>) -> Redirect {
    state.ctx.write().await.logout();
    Redirect::to("/login")
}

/// the `ACCESS-VIOLATION-<n>` number on the 404 page
fn violation_code<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(0..1000)
}

async fn not_found(State(state): State<ServerState>, uri: Uri) -> (StatusCode, Html<String>) {
    tracing::warn!(path = %uri.path(), "[HTTP] 404 for unknown route");
    let code = violation_code(&mut rand::thread_rng());
    let theme = state.ctx.read().await.theme();
    (StatusCode::NOT_FOUND, Html(views::not_found(theme, uri.path(), code)))
}

// ==============================================================================
// operator pages
// ==============================================================================

/// a freshly backfilled window for the first paint; the stream takes over after
fn initial_frame(config: &crate::config::TelemetryConfig, thresholds: ThresholdSettings) -> TelemetryFrame {
    let mut rng = StdRng::from_entropy();
    let mut generator = TelemetryGenerator::new(config, &mut rng);
    generator.backfill(&mut rng, now_ms());
    TelemetryFrame::build(&generator, thresholds)
}

async fn dashboard_page(State(state): State<ServerState>) -> Response {
    let ctx = state.ctx.read().await;
    let Some(user) = ctx.user() else {
        return Redirect::to("/login").into_response();
    };
    let frame = initial_frame(&ctx.config().telemetry, ctx.thresholds());
    Html(views::dashboard(ctx.theme(), user, &dashboard_analytics(), &frame)).into_response()
}

async fn simulation_page(State(state): State<ServerState>) -> Response {
    let ctx = state.ctx.read().await;
    let Some(user) = ctx.user() else {
        return Redirect::to("/login").into_response();
    };
    Html(views::simulation(ctx.theme(), user, &ctx.simulation().snapshot())).into_response()
}

async fn settings_response(state: &ServerState, status: StatusCode, message: Option<&str>) -> Response {
    let ctx = state.ctx.read().await;
    let Some(user) = ctx.user() else {
        return Redirect::to("/login").into_response();
    };
    let page = views::settings(ctx.theme(), user, &ctx.thresholds(), message);
    (status, Html(page)).into_response()
}

async fn settings_page(State(state): State<ServerState>) -> Response {
    settings_response(&state, StatusCode::OK, None).await
}

#[derive(Deserialize)]
struct ThresholdForm {
    pressure: f64,
    temperature: f64,
    flow_rate: f64,
}

async fn settings_thresholds(State(state): State<ServerState>, Form(form): Form<ThresholdForm>) -> Response {
    let wanted = ThresholdSettings::new(form.pressure, form.temperature, form.flow_rate);
    let result = state.ctx.write().await.update_thresholds(wanted);
    match result {
        Ok(_) => settings_response(&state, StatusCode::OK, Some("Threshold settings saved.")).await,
        Err(e @ ThresholdError::OutOfRange { .. }) => {
            settings_response(&state, StatusCode::UNPROCESSABLE_ENTITY, Some(&e.to_string())).await
        }
        Err(e) => {
            tracing::error!("[SETTINGS] {}", e);
            settings_response(&state, StatusCode::INTERNAL_SERVER_ERROR, Some(&e.to_string())).await
        }
    }
}

async fn settings_thresholds_reset(State(state): State<ServerState>) -> Response {
    let result = state.ctx.write().await.reset_thresholds();
    match result {
        Ok(_) => settings_response(&state, StatusCode::OK, Some("Thresholds reset to defaults.")).await,
        Err(e) => {
            tracing::error!("[SETTINGS] {}", e);
            settings_response(&state, StatusCode::INTERNAL_SERVER_ERROR, Some(&e.to_string())).await
        }
    }
}

#[derive(Deserialize)]
struct ThemeForm {
    theme: String,
}

async fn settings_theme(State(state): State<ServerState>, Form(form): Form<ThemeForm>) -> Response {
    let result = state.ctx.write().await.set_theme(&form.theme);
    match result {
        Ok(_) => Redirect::to("/settings").into_response(),
        Err(e) => {
            tracing::error!("[SETTINGS] {}", e);
            settings_response(&state, StatusCode::INTERNAL_SERVER_ERROR, Some(&e.to_string())).await
        }
    }
}

#[derive(Deserialize, Default)]
struct RegionQuery {
    #[serde(default)]
    region: String,
}

fn region_filter(query: &RegionQuery) -> RegionFilter {
    query.region.parse().unwrap_or_else(|e| {
        tracing::warn!("[ADMIN] {}, showing all regions", e);
        RegionFilter::All
    })
}

async fn admin_page(State(state): State<ServerState>, Query(query): Query<RegionQuery>) -> Response {
    let ctx = state.ctx.read().await;
    let Some(user) = ctx.user() else {
        return Redirect::to("/login").into_response();
    };
    let filter = region_filter(&query);
    Html(views::admin(ctx.theme(), user, &admin_analytics(filter), filter, region_count())).into_response()
}

// ==============================================================================
// simulator control
// ==============================================================================

/// start or stop the ticker to match `running`
async fn sync_simulation_task(state: &ServerState, running: bool) {
    let mut slot = state.simulation_task.lock().await;
    if running {
        if slot.as_ref().map_or(true, |task| task.is_finished()) {
            *slot = Some(spawn_simulation_ticker(state.ctx.clone()));
            tracing::info!("[SIMULATION] started");
        }
    } else if let Some(task) = slot.take() {
        task.abort();
        tracing::info!("[SIMULATION] stopped");
    }
}

fn spawn_simulation_ticker(ctx: SharedContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let period = Duration::from_secs(1);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let mut ctx = ctx.write().await;
            if !ctx.simulation().is_running() {
                break;
            }
            ctx.simulation_mut().step(&mut rng);
        }
    })
}

async fn toggle_simulation(state: &ServerState) {
    let running = state.ctx.write().await.simulation_mut().toggle();
    sync_simulation_task(state, running).await;
}

async fn reset_simulation(state: &ServerState) {
    state.ctx.write().await.simulation_mut().reset();
    sync_simulation_task(state, false).await;
}

#[derive(Deserialize)]
struct PopulationBody {
    population: f64,
}

async fn simulation_toggle_form(State(state): State<ServerState>) -> Redirect {
    toggle_simulation(&state).await;
    Redirect::to("/simulation")
}

async fn simulation_reset_form(State(state): State<ServerState>) -> Redirect {
    reset_simulation(&state).await;
    Redirect::to("/simulation")
}

async fn simulation_population_form(
    State(state): State<ServerState>,
    Form(body): Form<PopulationBody>,
) -> Response {
    match state.ctx.write().await.simulation_mut().set_population(body.population) {
        Ok(()) => Redirect::to("/simulation").into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

// ==============================================================================
// json api
// ==============================================================================

async fn api_status(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let status = state.ctx.read().await.public_status();
    Json(serde_json::json!({ "status": status, "label": status.label() }))
}

async fn api_session(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let ctx = state.ctx.read().await;
    let authenticated = ctx.has_live_session(now_secs());
    let user = if authenticated { ctx.user() } else { None };
    Json(serde_json::json!({ "authenticated": authenticated, "user": user }))
}

async fn api_thresholds(State(state): State<ServerState>) -> Json<ThresholdSettings> {
    Json(state.ctx.read().await.thresholds())
}

async fn api_update_thresholds(
    State(state): State<ServerState>,
    Json(wanted): Json<ThresholdSettings>,
) -> Result<Json<ThresholdSettings>, ApiError> {
    let saved = state.ctx.write().await.update_thresholds(wanted)?;
    Ok(Json(saved))
}

async fn api_dashboard() -> Json<crate::analytics::DashboardAnalytics> {
    Json(dashboard_analytics())
}

async fn api_admin_analytics(Query(query): Query<RegionQuery>) -> Result<Json<crate::analytics::AdminAnalytics>, ApiError> {
    let filter = query
        .region
        .parse::<RegionFilter>()
        .map_err(|e| ApiError(StatusCode::BAD_REQUEST, e))?;
    Ok(Json(admin_analytics(filter)))
}

async fn api_simulation(State(state): State<ServerState>) -> Json<crate::simulation::SimulationSnapshot> {
    Json(state.ctx.read().await.simulation().snapshot())
}

async fn api_simulation_toggle(State(state): State<ServerState>) -> Json<crate::simulation::SimulationSnapshot> {
    toggle_simulation(&state).await;
    api_simulation(State(state)).await
}

async fn api_simulation_reset(State(state): State<ServerState>) -> Json<crate::simulation::SimulationSnapshot> {
    reset_simulation(&state).await;
    api_simulation(State(state)).await
}

async fn api_simulation_population(
    State(state): State<ServerState>,
    Json(body): Json<PopulationBody>,
) -> Result<Json<crate::simulation::SimulationSnapshot>, ApiError> {
    state.ctx.write().await.simulation_mut().set_population(body.population)?;
    Ok(api_simulation(State(state)).await)
}

// ==============================================================================
// sse streams
// ==============================================================================

/// one generator per connection; dropping the stream drops the feed
async fn api_telemetry_stream(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let feed = {
        let ctx = state.ctx.read().await;
        TelemetryFeed::spawn(&ctx.config().telemetry, ctx.subscribe_thresholds())
    };
    let frames = WatchStream::new(feed.subscribe());
    let stream = frames.map(move |frame| {
        let _mounted = &feed;
        Event::default().event("telemetry").json_data(&frame)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn api_notifications(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let notices = BroadcastStream::new(state.ctx.read().await.notifier().subscribe());
    let stream = notices.filter_map(|notice| {
        let notice = notice.ok()?;
        Event::default().event("notice").json_data(&notice).ok().map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_filter_falls_back_to_all() {
        assert_eq!(region_filter(&RegionQuery { region: "bogus".into() }), RegionFilter::All);
        assert_eq!(region_filter(&RegionQuery::default()), RegionFilter::All);
        assert_ne!(region_filter(&RegionQuery { region: "warning".into() }), RegionFilter::All);
    }

    #[test]
    fn test_api_error_status() {
        let err: ApiError = SimulationError::PopulationOutOfRange(42.0).into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_violation_code_is_below_one_thousand() {
        let mut rng = StdRng::seed_from_u64(5);
        let codes: Vec<u32> = (0..5_000).map(|_| violation_code(&mut rng)).collect();
        assert!(codes.iter().all(|&c| c < 1000));
        assert!(codes.iter().any(|&c| c < 100));
    }
}
