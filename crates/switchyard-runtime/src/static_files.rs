//! Static directory fallback

use futures::TryStreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Response, StatusCode};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use std::path::{Component, Path, PathBuf};
use switchyard_core::{Body, Error, Result};
use tokio_util::io::ReaderStream;

/// Serves files from a directory for requests no route matches
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index_file: String,
}

impl StaticFiles {
    /// Create a static file server rooted at `root`
    pub fn new(root: impl Into<PathBuf>, index_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index_file: index_file.into(),
        }
    }

    /// Map a request path onto the root directory
    ///
    /// Returns `None` for paths that try to leave the root.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = request_path.trim_start_matches('/');
        if relative.contains('\\') || relative.contains('\0') {
            return None;
        }

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        Some(resolved)
    }

    /// Serve `request_path`, or `None` when there is no such file
    pub async fn serve(&self, request_path: &str) -> Result<Option<Response<Body>>> {
        let Some(mut path) = self.resolve(request_path) else {
            tracing::debug!(path = %request_path, "Rejected static path");
            return Ok(None);
        };

        let mut metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => return Ok(None),
        };

        if metadata.is_dir() {
            path.push(&self.index_file);
            metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(_) => return Ok(None),
            };
        }

        if !metadata.is_file() {
            return Ok(None);
        }

        // Symlinks may still point outside the root
        let root = tokio::fs::canonicalize(&self.root).await?;
        match tokio::fs::canonicalize(&path).await {
            Ok(real) if real.starts_with(&root) => {}
            _ => return Ok(None),
        }

        let file = tokio::fs::File::open(&path).await?;
        let mime = mime_guess::from_path(&path).first_or_octet_stream();

        let stream = ReaderStream::new(file)
            .map_ok(Frame::data)
            .map_err(Error::from);
        let body = StreamBody::new(stream).boxed_unsync();

        let content_type = HeaderValue::from_str(mime.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, metadata.len())
            .body(body)?;

        Ok(Some(response))
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}
