//! Development Server for the sandbox CLI
//!
//! Serves the web build (wasm-bindgen output, v86 assets, disk images) with
//! the COOP/COEP headers v86 needs for SharedArrayBuffer.
//!
//! Environment:
//! - `PORT` (default 8080)
//! - `WEB_ROOT` (default `web`)

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use tower_http::services::ServeDir;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let web_root = std::env::var("WEB_ROOT").unwrap_or_else(|_| String::from("web"));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let serve_dir = ServeDir::new(&web_root)
        .precompressed_gzip()
        .precompressed_br();

    let app = Router::new()
        .fallback_service(serve_dir)
        .layer(axum::middleware::from_fn(add_headers));

    println!("sandbox dev server");
    println!("  root: {}", web_root);
    println!("  url:  http://localhost:{}", port);
    println!("  Ctrl+C to stop");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

/// Content type for a request path, if the extension needs one forced.
fn content_type_for(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
    let content_type = match ext {
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "wasm" => "application/wasm",
        "css" => "text/css; charset=utf-8",
        "html" => "text/html; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        // Emulator disk images and BIOS blobs
        "bin" | "img" | "iso" => "application/octet-stream",
        _ => return None,
    };
    Some(content_type)
}

/// Add cross-origin isolation headers and fix MIME types
async fn add_headers(request: Request<Body>, next: axum::middleware::Next) -> Response<Body> {
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // Required for SharedArrayBuffer
    headers.insert(
        "Cross-Origin-Opener-Policy",
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        "Cross-Origin-Embedder-Policy",
        HeaderValue::from_static("require-corp"),
    );

    if let Some(content_type) = content_type_for(&path) {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(
            content_type_for("/pkg/sbx_cli.js"),
            Some("application/javascript; charset=utf-8")
        );
        assert_eq!(content_type_for("/pkg/sbx_cli_bg.wasm"), Some("application/wasm"));
        assert_eq!(
            content_type_for("/v86/seabios.bin"),
            Some("application/octet-stream")
        );
        assert_eq!(
            content_type_for("/images/debian.img"),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn test_unknown_extensions_untouched() {
        assert_eq!(content_type_for("/data/reads.fq"), None);
        assert_eq!(content_type_for("/"), None);
        assert_eq!(content_type_for("/tutorials/intro"), None);
    }
}
