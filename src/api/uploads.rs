//! GET /uploads/{*path}: serves stored uploads from disk.

use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Response, StatusCode, header},
    response::IntoResponse,
};

use super::ApiState;

pub(super) async fn serve(
    State(state): State<ApiState>,
    Path(path): Path<String>,
) -> axum::response::Response {
    if path.contains("..") || path.starts_with('/') || path.contains('\\') {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let file = state.config.uploads_dir.join(&path);
    match tokio::fs::read(&file).await {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime_from_extension(&file))
            .body(Body::from(bytes))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn mime_from_extension(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("wav") => "audio/wav",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_types() {
        assert_eq!(mime_from_extension(FsPath::new("a/b.PNG")), "image/png");
        assert_eq!(mime_from_extension(FsPath::new("x.webp")), "image/webp");
        assert_eq!(mime_from_extension(FsPath::new("noext")), "application/octet-stream");
    }
}
