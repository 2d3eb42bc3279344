//! Local file serving
//!
//! Maps request paths onto the docroot and hands the file to
//! `tower_http`'s `ServeFile`, which owns content types and not-found.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use std::path::{Component, Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, warn};

/// Absolute path of `request_path` under `docroot`
///
/// The path is percent-decoded first. Returns `None` when decoding fails or
/// the path would escape the docroot.
pub fn local_path(docroot: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    Some(docroot.join(relative))
}

/// Whether a regular file exists at `request_path` under `docroot`
pub fn exists_locally(docroot: &Path, request_path: &str) -> bool {
    local_path(docroot, request_path)
        .map(|p| p.is_file())
        .unwrap_or(false)
}

/// Send the local file for `path`
pub async fn serve_local(docroot: &Path, path: &str) -> Response<Body> {
    let Some(file) = local_path(docroot, path) else {
        warn!("Refusing to serve {} from {}", path, docroot.display());
        return StatusCode::NOT_FOUND.into_response();
    };

    // Directories and other non-regular files are not sendable.
    match tokio::fs::metadata(&file).await {
        Ok(meta) if meta.is_file() => {}
        _ => {
            debug!("No regular file at {}", file.display());
            return StatusCode::NOT_FOUND.into_response();
        }
    }

    debug!("Serving local file {}", file.display());

    // ServeFile only answers GET/HEAD; POSTs to local files are served like GETs.
    let req = match Request::get("/").body(Body::empty()) {
        Ok(req) => req,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    match ServeFile::new(file).oneshot(req).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_local_path_decodes() {
        let root = Path::new("/srv/site");
        assert_eq!(
            local_path(root, "/docs/my%20file.txt"),
            Some(PathBuf::from("/srv/site/docs/my file.txt"))
        );
        assert_eq!(local_path(root, "plain"), Some(PathBuf::from("/srv/site/plain")));
    }

    #[test]
    fn test_local_path_rejects_traversal() {
        let root = Path::new("/srv/site");
        assert!(local_path(root, "/../etc/passwd").is_none());
        assert!(local_path(root, "/a/%2e%2e/%2e%2e/etc/passwd").is_none());
    }

    #[test]
    fn test_exists_locally() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a b.txt"), "x").unwrap();

        assert!(exists_locally(dir.path(), "/a%20b.txt"));
        assert!(!exists_locally(dir.path(), "/missing.txt"));
        assert!(!exists_locally(dir.path(), "/"));
    }

    #[tokio::test]
    async fn test_serve_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello world").unwrap();

        let res = serve_local(dir.path(), "/hello.txt").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_serve_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        for path in ["/", "/sub/", "/sub"] {
            let res = serve_local(dir.path(), path).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_serve_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let res = serve_local(dir.path(), "/gone.html").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
