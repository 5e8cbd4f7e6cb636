use std::fs;
use std::path::Path;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use dxfview_config::AppConfig;
use dxfview_server::{AppState, router};
use serde_json::{Value, json};
use tower::ServiceExt;

const DRAWING: &str = "  0\nSECTION\n  2\nBLOCKS\n  0\nBLOCK\n  2\nPLATE\n 10\n0\n 20\n0\n  0\nLWPOLYLINE\n 70\n1\n 10\n0\n 20\n0\n 10\n10\n 20\n0\n 10\n10\n 20\n10\n  0\nLINE\n 10\n0\n 20\n0\n 11\n1\n 21\n1\n  0\nENDBLK\n  0\nENDSEC\n  0\nSECTION\n  2\nENTITIES\n  0\nINSERT\n  2\nPLATE\n 10\n5\n 20\n5\n  0\nCIRCLE\n 10\n0\n 20\n0\n 40\n3\n  0\nENDSEC\n  0\nEOF\n";

fn app_for(root: &Path) -> Router {
    let mut config = AppConfig::default();
    config.library.root = root.to_path_buf();
    config.server.static_dir = None;
    router(AppState::from_config(&config), &config.server)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = app.oneshot(request).await.expect("request failed");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, body.to_vec(), content_type)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).expect("json body")
}

#[tokio::test]
async fn missing_file_returns_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body, _) = get(app_for(dir.path()), "/file/nope.dxf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body), json!({ "error": "File not found" }));
}

#[tokio::test]
async fn traversal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body, _) = get(app_for(dir.path()), "/file/../../etc/passwd").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body), json!({ "error": "Invalid filename" }));
}

#[tokio::test]
async fn files_lists_nested_tree() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("parts")).unwrap();
    fs::write(dir.path().join("parts/plate.dxf"), DRAWING).unwrap();
    fs::write(dir.path().join("notes.txt"), "x").unwrap();

    let (status, body, _) = get(app_for(dir.path()), "/files").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!([{
            "name": "parts",
            "type": "folder",
            "children": [{ "name": "plate.dxf", "type": "file", "path": "parts/plate.dxf" }]
        }])
    );
}

#[tokio::test]
async fn unreadable_root_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body, _) = get(app_for(&dir.path().join("absent")), "/files").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&body)["details"].is_string());
}

#[tokio::test]
async fn file_returns_filtered_document() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("parts")).unwrap();
    fs::write(dir.path().join("parts/plate.dxf"), DRAWING).unwrap();

    let (status, body, _) = get(app_for(dir.path()), "/file/parts/plate.dxf").await;
    assert_eq!(status, StatusCode::OK);
    let value = json_body(&body);

    let entities = value["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0]["type"], "INSERT");
    assert_eq!(entities[0]["name"], "PLATE");

    let block = &value["blocks"]["PLATE"]["entities"];
    assert_eq!(block.as_array().unwrap().len(), 1);
    assert_eq!(block[0]["type"], "POLYLINE");
    assert_eq!(block[0]["shape"], true);
    assert_eq!(block[0]["vertices"][2], json!({ "x": 10.0, "y": 10.0 }));
}

#[tokio::test]
async fn broken_drawing_reports_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.dxf"), "  0\nSECTION\n  2\n").unwrap();

    let (status, body, _) = get(app_for(dir.path()), "/file/broken.dxf").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let value = json_body(&body);
    assert_eq!(value["error"], "Error parsing DXF file");
    assert!(value["details"].is_string());
}

#[tokio::test]
async fn save_dxf_returns_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({
        "data": {
            "entities": [{
                "type": "POLYLINE",
                "vertices": [{ "x": 0.0, "y": 0.0 }, { "x": 10.0, "y": 0.0 }, { "x": 10.0, "y": 10.0 }],
                "shape": true
            }],
            "blocks": {}
        }
    });
    let request = Request::post("/save-dxf")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app_for(dir.path()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"filtered.dxf\""
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/dxf");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("POLYLINE"));
    assert_eq!(text.matches("VERTEX").count(), 3);
}

#[tokio::test]
async fn save_dxf_without_data_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::post("/save-dxf")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body, _) = send(app_for(dir.path()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body), json!({ "error": "No data provided" }));
}

#[tokio::test]
async fn save_dxf_with_invalid_json_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::post("/save-dxf")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body, _) = send(app_for(dir.path()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error"], "Invalid request body");
}

#[tokio::test]
async fn save_dxf_with_empty_polyline_is_export_error() {
    let dir = tempfile::tempdir().unwrap();
    let payload = json!({ "data": { "entities": [{ "type": "POLYLINE", "vertices": [] }] } });
    let request = Request::post("/save-dxf")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body, _) = send(app_for(dir.path()), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["error"], "Error generating DXF file");
}

#[tokio::test]
async fn preview_renders_svg() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("plate.dxf"), DRAWING).unwrap();

    let (status, body, content_type) =
        get(app_for(dir.path()), "/preview/plate.dxf?width=200&height=100&zoom=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/svg+xml"));
    let svg = String::from_utf8(body).unwrap();
    assert!(svg.contains(r#"width="200""#));
    assert!(svg.contains(r#"d="M55 95 L145 95 L145 5 Z""#), "{svg}");
}

#[tokio::test]
async fn preview_shares_error_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _, _) = get(app_for(dir.path()), "/preview/../secret.dxf").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = get(app_for(dir.path()), "/preview/missing.dxf").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn undecodable_filename_is_json_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    for uri in ["/file/%FF.dxf", "/preview/%FF.dxf"] {
        let (status, body, content_type) = get(app_for(dir.path()), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let value = json_body(&body);
        assert_eq!(value["error"], "Invalid filename");
        assert!(value["details"].is_string());
    }
}

#[tokio::test]
async fn malformed_preview_query_is_json_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("plate.dxf"), DRAWING).unwrap();

    let (status, body, content_type) =
        get(app_for(dir.path()), "/preview/plate.dxf?width=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let value = json_body(&body);
    assert_eq!(value["error"], "Invalid query");
    assert!(value["details"].is_string());
}
