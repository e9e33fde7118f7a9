//! Static file serving for the browser client
//!
//! The set of servable paths is fixed when the server starts; anything
//! outside the map is a 404, so request paths never reach the filesystem
//! directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use mime_guess::mime;

/// Web paths served by default, relative to the static root.
pub const DEFAULT_ROUTES: &[(&str, &str)] = &[
    ("/", "index.html"),
    ("/index.html", "index.html"),
    ("/js/app.js", "js/app.js"),
    ("/styles/app.css", "styles/app.css"),
];

/// Immutable web-path to file mapping.
#[derive(Debug, Clone)]
pub struct StaticAssets {
    routes: HashMap<String, PathBuf>,
}

impl StaticAssets {
    /// Maps [`DEFAULT_ROUTES`] under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_routes(root, DEFAULT_ROUTES)
    }

    /// Maps each `(web_path, relative_file)` pair under `root`.
    pub fn with_routes(root: impl AsRef<Path>, routes: &[(&str, &str)]) -> Self {
        let root = root.as_ref();
        Self {
            routes: routes
                .iter()
                .map(|(web_path, file)| (web_path.to_string(), root.join(file)))
                .collect(),
        }
    }

    /// File backing `web_path`, if it is mapped.
    pub fn resolve(&self, web_path: &str) -> Option<&Path> {
        self.routes.get(web_path).map(PathBuf::as_path)
    }

    /// Number of mapped paths.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no path is mapped.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Serve a mapped file
    ///
    /// # Errors
    /// - `StatusCode::NOT_FOUND` - Path not mapped or file unreadable
    pub async fn serve(&self, web_path: &str) -> Result<Response, StatusCode> {
        let file = self.resolve(web_path).ok_or(StatusCode::NOT_FOUND)?;

        let body = tokio::fs::read(file).await.map_err(|err| {
            tracing::warn!(path = %file.display(), error = %err, "Static asset unreadable");
            StatusCode::NOT_FOUND
        })?;

        Ok(([(header::CONTENT_TYPE, content_type(file))], body).into_response())
    }
}

/// Content type for `file`, with a UTF-8 charset on textual types.
pub fn content_type(file: &Path) -> String {
    let guess = mime_guess::from_path(file).first_or_text_plain();
    if guess.type_() == mime::TEXT || guess.subtype() == mime::JAVASCRIPT {
        format!("{}; charset=utf-8", guess.essence_str())
    } else {
        guess.essence_str().to_string()
    }
}
