pub mod errors;
mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use dxfview_config::{AppConfig, LibraryConfig, ServerConfig, ViewerConfig};
use dxfview_engine::{DrawingLibrary, FilterOptions};
use errors::ServerError;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// 路由共享的只读状态。
#[derive(Debug, Clone)]
pub struct AppState {
    pub library: Arc<DrawingLibrary>,
    pub export_file_name: String,
    pub viewer: ViewerConfig,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            library: Arc::new(library_from_config(&config.library)),
            export_file_name: config.export.file_name.clone(),
            viewer: config.viewer,
        }
    }
}

pub fn library_from_config(config: &LibraryConfig) -> DrawingLibrary {
    DrawingLibrary::new(
        config.root.clone(),
        config.extension.clone(),
        FilterOptions::new(config.top_level_kinds.clone()),
    )
}

/// 组装全部 API 路由；静态目录存在时作为兜底服务挂载。
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/files", get(routes::list_files))
        .route("/file/*filename", get(routes::get_file))
        .route("/save-dxf", post(routes::save_dxf))
        .route("/preview/*filename", get(routes::preview));

    match &server.static_dir {
        Some(dir) if dir.is_dir() => {
            info!(dir = %dir.display(), "挂载静态资源目录");
            app = app.fallback_service(ServeDir::new(dir));
        }
        Some(dir) => warn!(dir = %dir.display(), "静态资源目录不存在，跳过挂载"),
        None => {}
    }

    let mut app = app.with_state(state).layer(TraceLayer::new_for_http());
    if server.cors {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// 绑定地址并持续提供服务。
pub async fn serve(config: AppConfig) -> Result<(), ServerError> {
    let address = config.server.bind_address();
    let state = AppState::from_config(&config);
    info!(
        root = %state.library.root().display(),
        extension = state.library.extension(),
        "图纸目录"
    );
    let app = router(state, &config.server);

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    info!(address = %address, "HTTP 服务已启动");
    axum::serve(listener, app).await.map_err(ServerError::Serve)
}

/// 在新建的多线程运行时上阻塞运行服务。
pub fn run_blocking(config: AppConfig) -> Result<(), ServerError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ServerError::Runtime)?;
    runtime.block_on(serve(config))
}
