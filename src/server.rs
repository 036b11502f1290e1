use crate::config::Config;
use crate::engine::{Engine, EngineSettings, RenderRequest};
use crate::error::{RenderError, TemplateError};
use crate::i18n::Catalog;
use crate::pdf::PdfArtifact;
use crate::schema::{Strategy, Template};
use crate::session::{AuthoringPolicy, Session};
use crate::store;
use crate::worker::RenderWorker;
use axum::{
    extract::{Json, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

// --- 数据结构 ---

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub worker: Arc<RenderWorker>,
    pub policy: AuthoringPolicy,
    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new(config: &Config, catalog: Arc<Catalog>) -> Self {
        let engine = Arc::new(Engine::new(catalog, EngineSettings::from(config)));
        let worker = RenderWorker::new(
            Arc::clone(&engine),
            config.max_concurrent_renders,
            Duration::from_secs(config.render_timeout_secs),
        );
        Self {
            engine,
            worker: Arc::new(worker),
            policy: AuthoringPolicy {
                restrict_custom_html: config.restrict_custom_html,
            },
            output_dir: config.output_dir.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// 以 `{success: false, message}` 返回的失败
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn render(state: &AppState, locale: Option<&str>, err: &RenderError) -> Self {
        error!(error = %err, "render failed");
        let status = match err {
            RenderError::AlreadyInFlight { .. } => StatusCode::CONFLICT,
            RenderError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let locale = locale.unwrap_or(state.engine.settings().default_locale.as_str());
        Self {
            status,
            message: err.user_message(&state.engine.catalog().bundle(locale)),
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        let status = match err {
            TemplateError::CustomHtmlForbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            success: false,
            message: self.message,
            path: None,
        };
        (self.status, Json(body)).into_response()
    }
}

fn pdf_response(artifact: PdfArtifact) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        artifact.file_name.replace('"', "'")
    );
    let mut response = (
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"))],
        artifact.bytes,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// 先写同目录临时文件再重命名，写入失败不会留下残缺的 PDF
async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    if let Err(e) = tokio::fs::write(&partial, bytes).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e);
    }
    tokio::fs::rename(&partial, path).await
}

// --- 路由处理函数 ---

/// 1. 健康检查
pub async fn health_check() -> &'static str {
    "Infobook Agent is Running (Rust + Skia)"
}

/// 2. 生成 PDF 并作为下载返回
pub async fn render_pdf(
    State(state): State<AppState>,
    Json(req): Json<RenderRequest>,
) -> Result<Response, ApiError> {
    let locale = req.locale.clone();
    match state.worker.render(req).await {
        Ok(artifact) => Ok(pdf_response(artifact)),
        Err(e) => Err(ApiError::render(&state, locale.as_deref(), &e)),
    }
}

/// 3. 生成 PDF 并保存到输出目录
pub async fn render_save(
    State(state): State<AppState>,
    Json(req): Json<RenderRequest>,
) -> Result<Json<ApiResponse>, ApiError> {
    let locale = req.locale.clone();
    let result = async {
        let artifact = state.worker.render(req).await?;
        tokio::fs::create_dir_all(&state.output_dir).await?;
        let path = state.output_dir.join(&artifact.file_name);
        write_atomically(&path, &artifact.bytes).await?;
        Ok::<_, RenderError>((path, artifact.page_count))
    }
    .await;

    match result {
        Ok((path, pages)) => {
            info!(path = %path.display(), pages, "PDF saved");
            Ok(Json(ApiResponse {
                success: true,
                message: format!("PDF rendered ({pages} pages) and saved"),
                path: Some(path.to_string_lossy().to_string()),
            }))
        }
        Err(e) => Err(ApiError::render(&state, locale.as_deref(), &e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default)]
    pub page: usize,
}

/// 4. 单页 PNG 预览
pub async fn render_preview(
    State(state): State<AppState>,
    Query(q): Query<PreviewQuery>,
    Json(req): Json<RenderRequest>,
) -> Result<Response, ApiError> {
    let locale = req.locale.clone();
    match state.worker.preview(req, q.page).await {
        Ok(png) => Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response()),
        Err(e) => Err(ApiError::render(&state, locale.as_deref(), &e)),
    }
}

pub async fn import_template(
    session: Session,
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Template>, ApiError> {
    let template = store::import(&body)?;
    state.policy.check(&session, &template)?;
    info!(template = %template.id, name = %template.name, "template imported");
    Ok(Json(template))
}

pub async fn export_template(Json(template): Json<Template>) -> Result<Response, ApiError> {
    let json = store::export(&template)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json).into_response())
}

pub async fn duplicate_template(Json(template): Json<Template>) -> Json<Template> {
    Json(store::duplicate(&template))
}

#[derive(Debug, Deserialize)]
pub struct NewTemplateQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
}

fn default_strategy() -> Strategy {
    Strategy::Pages
}

pub async fn new_template(Query(q): Query<NewTemplateQuery>) -> Result<Json<Template>, ApiError> {
    Ok(Json(store::new_template(&q.name, q.strategy)?))
}

// --- 服务启动入口 ---

pub fn router(state: AppState) -> Router {
    // 允许跨域 (CORS)，否则 Web 端无法调用 localhost
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(health_check))
        .route("/render", post(render_pdf))
        .route("/render/save", post(render_save))
        .route("/render/preview", post(render_preview))
        .route("/templates/import", post(import_template))
        .route("/templates/export", post(export_template))
        .route("/templates/duplicate", post(duplicate_template))
        .route("/templates/new", get(new_template))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(config: Config, catalog: Arc<Catalog>) -> std::io::Result<()> {
    let addr = config.bind;
    let app = router(AppState::new(&config, catalog));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Infobook Agent listening on http://{}", addr);
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Property;
    use crate::schema::{Content, Element, ElementKind, Position, Styling, TemplateBody};
    use axum::body::to_bytes;
    use axum::http::HeaderMap;

    fn state(output_dir: PathBuf) -> AppState {
        let config = Config {
            output_dir,
            dpi_scale: 1.0,
            ..Config::default()
        };
        AppState::new(&config, Arc::new(Catalog::builtin().unwrap()))
    }

    fn request() -> RenderRequest {
        let mut template = store::new_template("Guide", Strategy::Pages).unwrap();
        if let TemplateBody::Pages { pages } = &mut template.body {
            pages[0].elements.push(Element {
                id: "t".into(),
                kind: ElementKind::Text,
                position: Position {
                    x: 10.0,
                    y: 10.0,
                    width: 200.0,
                    height: 30.0,
                },
                order: 0,
                content: Content {
                    text: Some("Hello {{propertyName}}".into()),
                    ..Default::default()
                },
                style: Styling::default(),
                conditions: vec![],
            });
        }
        RenderRequest {
            template,
            property: Property {
                id: "p1".into(),
                name: "Seaside Villa".into(),
                ..Default::default()
            },
            local_info: vec![],
            locale: None,
        }
    }

    #[tokio::test]
    async fn render_returns_a_pdf_download() {
        let dir = tempfile::tempdir().unwrap();
        let response = render_pdf(State(state(dir.path().into())), Json(request()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Seaside Villa-information-book.pdf\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn save_writes_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let Json(resp) = render_save(State(state(dir.path().into())), Json(request()))
            .await
            .unwrap();
        assert!(resp.success);
        let path = dir.path().join("Seaside Villa-information-book.pdf");
        assert_eq!(resp.path, Some(path.to_string_lossy().to_string()));
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
        assert!(!dir.path().join("Seaside Villa-information-book.pdf.part").exists());
    }

    #[tokio::test]
    async fn empty_pages_fail_with_generic_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request();
        req.template.body = TemplateBody::Pages { pages: vec![] };
        let err = render_pdf(State(state(dir.path().into())), Json(req))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to generate the PDF. Please try again.");
    }

    #[tokio::test]
    async fn preview_returns_png_through_the_worker() {
        let dir = tempfile::tempdir().unwrap();
        let app = state(dir.path().into());
        let response = render_preview(
            State(app.clone()),
            Query(PreviewQuery { page: 0 }),
            Json(request()),
        )
        .await
        .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"\x89PNG"));
        assert_eq!(app.worker.in_flight(), 0);

        let err = render_preview(State(app), Query(PreviewQuery { page: 5 }), Json(request()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn import_applies_policy() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{"id":"x","name":"Html","strategy":"pages","pages":[{"id":"p","name":"P",
            "elements":[{"id":"h","type":"custom-html","position":{"x":0,"y":0,"width":10,"height":10}}]}]}"#;
        let owner = Session::from_headers(&HeaderMap::new());
        let err = import_template(owner, State(state(dir.path().into())), json.to_string())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let bad = import_template(
            Session::from_headers(&HeaderMap::new()),
            State(state(dir.path().into())),
            "{".into(),
        )
        .await
        .unwrap_err();
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn new_template_requires_name() {
        let err = new_template(Query(NewTemplateQuery {
            name: " ".into(),
            strategy: Strategy::Flow,
        }))
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
