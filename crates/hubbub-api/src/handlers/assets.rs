//! The chat page and its static assets.
//!
//! Embedded into the binary with the `embed-ui` feature. Without it the
//! relay still works; only the page is missing.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub async fn handle_index() -> Response {
    serve_asset("index.html")
}

pub async fn handle_asset(Path(path): Path<String>) -> Response {
    serve_asset(&path)
}

#[cfg(feature = "embed-ui")]
#[derive(rust_embed::RustEmbed)]
#[folder = "static/"]
struct Assets;

#[cfg(feature = "embed-ui")]
fn serve_asset(path: &str) -> Response {
    use axum::http::header;

    match <Assets as rust_embed::RustEmbed>::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], file.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

#[cfg(not(feature = "embed-ui"))]
fn serve_asset(_path: &str) -> Response {
    (StatusCode::NOT_FOUND, "UI not embedded in this build").into_response()
}
