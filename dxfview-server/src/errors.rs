use std::io;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dxfview_engine::errors::LibraryError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// 启动或运行 HTTP 服务时的错误。
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("创建 tokio 运行时失败: {0}")]
    Runtime(#[source] io::Error),
    #[error("绑定监听地址 {address} 失败: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("HTTP 服务异常退出: {0}")]
    Serve(#[source] io::Error),
}

/// 返回给浏览器的错误，统一为 `{error, details?}` JSON。
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid filename")]
    InvalidFilename,
    #[error("file not found")]
    NotFound,
    #[error("error parsing DXF file: {0}")]
    Parse(String),
    #[error("error generating DXF file: {0}")]
    Export(String),
    #[error("error reading drawing directory: {0}")]
    Index(String),
    #[error("bad request: {message}")]
    BadRequest {
        message: &'static str,
        details: Option<String>,
    },
    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidFilename | ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Parse(_) | ApiError::Export(_) | ApiError::Index(_) | ApiError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody<'_> {
        let (error, details) = match self {
            ApiError::InvalidFilename => ("Invalid filename", None),
            ApiError::NotFound => ("File not found", None),
            ApiError::Parse(details) => ("Error parsing DXF file", Some(details.as_str())),
            ApiError::Export(details) => ("Error generating DXF file", Some(details.as_str())),
            ApiError::Index(details) => ("Error reading drawing directory", Some(details.as_str())),
            ApiError::BadRequest { message, details } => (*message, details.as_deref()),
            ApiError::Task(details) => ("Internal server error", Some(details.as_str())),
        };
        ErrorBody { error, details }
    }
}

impl From<LibraryError> for ApiError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::InvalidInput(name) => {
                warn!(filename = %name, "拒绝非法文件名");
                ApiError::InvalidFilename
            }
            LibraryError::NotFound(path) => {
                warn!(path = %path.display(), "请求的图纸不存在");
                ApiError::NotFound
            }
            LibraryError::Parse { path, source } => {
                error!(path = %path.display(), error = %source, "解析 DXF 文件失败");
                ApiError::Parse(source.to_string())
            }
            LibraryError::Export { source } => {
                error!(error = %source, "生成 DXF 文件失败");
                ApiError::Export(source.to_string())
            }
            LibraryError::Index(source) => {
                error!(error = %source, "扫描图纸目录失败");
                ApiError::Index(source.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
