//! File serving for catch-all routes.
//!
//! [`StaticFiles`] is a [`Handler`] reading the `filepath` catch-all
//! parameter, mapping it under a root directory and sending the file.
//! Registered with [`Registrar::static_files`](crate::Registrar::static_files).

use crate::context::Context;
use crate::error::HttpError;
use crate::handler::{Handler, HandlerResult};
use http::StatusCode;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Name of the catch-all parameter static routes capture.
pub const FILEPATH_PARAM: &str = "filepath";

#[derive(Debug, Clone)]
pub struct StaticFiles {
    base_dir: Arc<PathBuf>,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self {
            base_dir: Arc::new(base.into()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.base_dir
    }

    /// Map a request path under the root. Anything but plain names
    /// (`..`, absolute paths, drive prefixes) is refused.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.as_ref().clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// MIME type from the file extension.
    #[must_use]
    pub fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" | "mjs" => "application/javascript",
            "json" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "ico" => "image/x-icon",
            "wasm" => "application/wasm",
            "pdf" => "application/pdf",
            _ => "application/octet-stream",
        }
    }

    /// Read the file for `url_path`. Directories serve their `index.html`.
    pub fn load(&self, url_path: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let mut path = self
            .map_path(url_path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "invalid path"))?;
        if path.is_dir() {
            path.push("index.html");
        }
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        }
        let bytes = fs::read(&path)?;
        Ok((bytes, Self::content_type(&path)))
    }
}

impl Handler for StaticFiles {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        let requested = ctx.param(FILEPATH_PARAM).unwrap_or_default().to_string();
        match self.load(&requested) {
            Ok((bytes, content_type)) => ctx.data(StatusCode::OK, content_type, bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %requested, root = %self.base_dir.display(), "static file not found");
                Err(HttpError::not_found("file not found").into())
            }
            Err(err) => Err(err.into()),
        }
    }
}
