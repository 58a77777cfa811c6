//! HTTP surface of the dashboard.
//!
//! | Route             | Purpose                                        |
//! |-------------------|------------------------------------------------|
//! | `GET /`           | the dashboard page                             |
//! | `GET /export.csv` | the filtered merged table as a download        |
//! | `POST /refresh`   | drop this session's cached snapshot            |
//! | `GET /api/view`   | the page's view model as JSON                  |
//! | `GET /health`     | liveness and session count                     |
//!
//! Sessions are keyed by the [`SESSION_COOKIE`] cookie; a request without a
//! known id gets a fresh session and a `Set-Cookie` header.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Local;
use dashboard_core::page_types::MappingConfig;
use dashboard_runtime::session::{with_session, SessionRegistry, SharedSession, SESSION_COOKIE};
use dashboard_runtime::view::ViewRequest;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::page::PageRenderer;
use crate::themes::Theme;

// ── AppState ──────────────────────────────────────────────────────────────────

/// Shared, read-only state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub mappings: Arc<MappingConfig>,
    pub renderer: Arc<PageRenderer>,
    pub theme: Arc<Theme>,
    /// Reporting timezone shown in the header.
    pub timezone: Arc<str>,
}

impl AppState {
    pub fn new(
        registry: SessionRegistry,
        mappings: MappingConfig,
        renderer: PageRenderer,
        theme: Theme,
        timezone: &str,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            mappings: Arc::new(mappings),
            renderer: Arc::new(renderer),
            theme: Arc::new(theme),
            timezone: Arc::from(timezone),
        }
    }

    /// The caller's session, and the jar carrying its id when it was just
    /// created.
    fn session(&self, jar: CookieJar) -> (SharedSession, CookieJar) {
        let known = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());
        let (id, session, created) = self.registry.get_or_create(known.as_deref());
        if !created {
            return (session, jar);
        }
        let cookie = Cookie::build((SESSION_COOKIE, id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        (session, jar.add(cookie))
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/export.csv", get(export_csv))
        .route("/refresh", post(refresh))
        .route("/api/view", get(api_view))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "dashboard listening");
    axum::serve(listener, router(state)).await
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn index(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let (session, jar) = state.session(jar);
    let (request, request_error) = match ViewRequest::from_pairs(&pairs) {
        Ok(request) => (request, None),
        Err(e) => {
            warn!(error = %e, "rejected dashboard filter");
            (ViewRequest::default(), Some(e.to_string()))
        }
    };

    let mappings = Arc::clone(&state.mappings);
    let view = match with_session(session, move |s| s.view(request, &mappings)).await {
        Ok(view) => view,
        Err(e) => return internal_error(e),
    };

    let html = match state
        .renderer
        .render_view(&view, &state.theme, &state.timezone, request_error.as_deref())
    {
        Ok(html) => html,
        Err(e) => return internal_error(e),
    };
    (jar, Html(html)).into_response()
}

async fn export_csv(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let request = match ViewRequest::from_pairs(&pairs) {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let (session, jar) = state.session(jar);

    let bytes = match with_session(session, move |s| s.export_csv(&request)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!(error = %e, "export unavailable");
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
        Err(e) => return internal_error(e),
    };

    let filename = format!("tiktok_metrics_{}.csv", Local::now().format("%Y%m%d_%H%M%S"));
    (
        jar,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response()
}

async fn refresh(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (session, jar) = state.session(jar);
    if let Err(e) = with_session(session, |s| s.refresh()).await {
        return internal_error(e);
    }
    (jar, Redirect::to("/")).into_response()
}

async fn api_view(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let request = match ViewRequest::from_pairs(&pairs) {
        Ok(request) => request,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response();
        }
    };
    let (session, jar) = state.session(jar);
    let mappings = Arc::clone(&state.mappings);
    match with_session(session, move |s| s.view(request, &mappings)).await {
        Ok(view) => (jar, Json(view)).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "sessions": state.registry.len() })),
    )
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn internal_error(e: impl std::fmt::Display) -> Response {
    error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use dashboard_core::settings::DataPaths;
    use dashboard_runtime::data_manager::LoadOptions;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const HEADER: &str = "user_id,date,view_count,like_count,comment_count,share_count,post_count,view_diff";

    fn app_state(with_data: bool) -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        if with_data {
            let paths = DataPaths::under(dir.path());
            fs::create_dir_all(&paths.metrics_dir).unwrap();
            fs::create_dir_all(paths.accounts_file.parent().unwrap()).unwrap();
            fs::create_dir_all(&paths.clicks_dir).unwrap();
            fs::write(
                paths.metrics_dir.join("redash_data_2025-07-08.csv"),
                format!("{HEADER}\nA,2025-07-07,100,1,1,1,1,10\nA,2025-07-08,200,1,1,1,1,100\nB,2025-07-08,90,1,1,1,1,50\n"),
            )
            .unwrap();
            fs::write(
                paths.accounts_file.with_extension("csv"),
                "Tiktok ID,Groups\nA,yujie_main_avatar\nB,wan_produce101\n",
            )
            .unwrap();
            fs::write(
                paths.clicks_dir.join("20250708ClicksInsnap.csv"),
                "timestamp,page_url,page_type,session_id,visitor_id\n\
                 2025-07-08 10:00:00,https://insnap.ai/videos,videos,s1,v1\n\
                 2025-07-08 11:00:00,https://insnap.ai/zh/download,download,s2,v2\n",
            )
            .unwrap();
        }
        let registry = SessionRegistry::new(LoadOptions::under(dir.path()));
        let state = AppState::new(
            registry,
            MappingConfig::default(),
            PageRenderer::new().unwrap(),
            Theme::light(),
            "UTC",
        );
        (state, dir)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_sets_session_cookie() {
        let (state, _dir) = app_state(true);
        let response = router(state.clone()).oneshot(get_req("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
        assert!(cookie.starts_with(SESSION_COOKIE));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        let body = body_string(response).await;
        assert!(body.contains("TikTok Performance Dashboard"));
        assert!(body.contains("yujie_main_avatar"));

        // the cookie is honoured on the next request
        let id = cookie.split(';').next().unwrap().to_string();
        let value = id.split_once('=').unwrap().1;
        assert_eq!(value.len(), 36);
        let req = Request::builder()
            .uri("/")
            .header(header::COOKIE, id)
            .body(Body::empty())
            .unwrap();
        let response = router(state.clone()).oneshot(req).await.unwrap();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_filter_renders_banner() {
        let (state, _dir) = app_state(true);
        let response = router(state).oneshot(get_req("/?top_n=0")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Invalid filter"));
    }

    #[tokio::test]
    async fn test_missing_inputs_still_render() {
        let (state, _dir) = app_state(false);
        let response = router(state).oneshot(get_req("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Account metrics are unavailable"));
        assert!(body.contains("Click data is unavailable"));
    }

    #[tokio::test]
    async fn test_export_csv() {
        let (state, _dir) = app_state(true);
        let response = router(state)
            .oneshot(get_req("/export.csv?groups=avatar&start=2025-07-08"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
        assert!(response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("attachment;"));
        let body = body_string(response).await;
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("2025-07-08,A,yujie_main_avatar"));
    }

    #[tokio::test]
    async fn test_export_errors() {
        let (state, _dir) = app_state(true);
        let response = router(state).oneshot(get_req("/export.csv?start=bad")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (state, _dir) = app_state(false);
        let response = router(state).oneshot(get_req("/export.csv")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_refresh_redirects() {
        let (state, _dir) = app_state(true);
        let req = Request::builder()
            .method("POST")
            .uri("/refresh")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    }

    #[tokio::test]
    async fn test_api_view_json() {
        let (state, _dir) = app_state(true);
        let response = router(state).oneshot(get_req("/api/view?metric=like_count")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["filtered_rows"], 3);
        assert_eq!(json["request"]["metric"], "like_count");
        assert_eq!(json["clicks"]["key_metrics"]["total_clicks"], 2);

        let (state, _dir) = app_state(true);
        let response = router(state).oneshot(get_req("/api/view?metric=bogus")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _dir) = app_state(false);
        let response = router(state).oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessions"], 0);
    }
}
