use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use dxfview_core::document::Document;
use dxfview_core::geometry::Vector2;
use dxfview_engine::TreeNode;
use dxfview_engine::svg::SvgCanvas;
use dxfview_engine::view::{ViewTransform, render};
use serde::Deserialize;
use tokio::task;
use tracing::{debug, info};

use crate::AppState;
use crate::errors::ApiError;

/// 预览画布的尺寸上限，防止请求生成过大的 SVG。
const MAX_PREVIEW_EDGE: u32 = 8192;

pub(crate) async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<Vec<TreeNode>>, ApiError> {
    let library = Arc::clone(&state.library);
    let tree = blocking(move || library.list_files()).await??;
    Ok(Json(tree))
}

pub(crate) async fn get_file(
    State(state): State<AppState>,
    filename: Result<Path<String>, PathRejection>,
) -> Result<Json<Document>, ApiError> {
    let filename = filename_from(filename)?;
    info!(filename = %filename, "请求图纸");
    let library = Arc::clone(&state.library);
    let document = blocking(move || library.load_and_filter(&filename)).await??;
    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaveRequest {
    data: Option<Document>,
}

pub(crate) async fn save_dxf(
    State(state): State<AppState>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest {
        message: "Invalid request body",
        details: Some(rejection.body_text()),
    })?;
    let document = request.data.ok_or(ApiError::BadRequest {
        message: "No data provided",
        details: None,
    })?;

    let library = Arc::clone(&state.library);
    let bytes = blocking(move || library.export_filtered(&document)).await??;
    debug!(bytes = bytes.len(), "已生成导出文件");

    let disposition = format!("attachment; filename=\"{}\"", state.export_file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/dxf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// 预览参数，缺省尺寸取自配置。
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PreviewQuery {
    width: Option<u32>,
    height: Option<u32>,
    zoom: Option<f64>,
    pan_x: Option<f64>,
    pan_y: Option<f64>,
}

impl PreviewQuery {
    fn view(&self) -> ViewTransform {
        let pan = Vector2::new(self.pan_x.unwrap_or(0.0), self.pan_y.unwrap_or(0.0));
        ViewTransform::new(self.zoom.unwrap_or(1.0), pan)
    }
}

pub(crate) async fn preview(
    State(state): State<AppState>,
    filename: Result<Path<String>, PathRejection>,
    query: Result<Query<PreviewQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let filename = filename_from(filename)?;
    let Query(query) = query.map_err(|rejection| ApiError::BadRequest {
        message: "Invalid query",
        details: Some(rejection.body_text()),
    })?;
    let width = query.width.unwrap_or(state.viewer.width).clamp(1, MAX_PREVIEW_EDGE);
    let height = query.height.unwrap_or(state.viewer.height).clamp(1, MAX_PREVIEW_EDGE);
    let view = query.view();

    let library = Arc::clone(&state.library);
    let svg = blocking(move || {
        library.load_and_filter(&filename).map(|document| {
            let mut canvas = SvgCanvas::new(f64::from(width), f64::from(height));
            let drawn = render(&document, &view, &mut canvas);
            debug!(filename = %filename, drawn, "预览渲染完成");
            canvas.finish()
        })
    })
    .await??;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

/// 路径段无法解码（例如非 UTF-8）时同样视为非法文件名。
fn filename_from(path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    path.map(|Path(filename)| filename)
        .map_err(|rejection| ApiError::BadRequest {
            message: "Invalid filename",
            details: Some(rejection.body_text()),
        })
}

/// 在阻塞线程池中执行文件读写。
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::Task(err.to_string()))
}
