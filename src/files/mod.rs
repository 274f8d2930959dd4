//! Static file mounting.
//!
//! A mounted directory becomes one GET route per regular file, recursively,
//! with the path relative to the directory appended to the mount prefix.
//! Files are either served straight from disk on every request or read once
//! at mount time and served from memory with an entity tag for conditional
//! requests.

mod fingerprint;
mod media_type;

pub use fingerprint::fingerprint;
pub use media_type::{content_type_for, FALLBACK_CONTENT_TYPE};

use crate::config::RunMode;
use crate::context::Context;
use crate::error::{ServerError, ServerResult};
use crate::handler::{Completion, Handler, SharedHandler};
use crate::http::{Method, Request, Response};
use crate::router::{Router, SPLAT};
use bytes::Bytes;
use log::{error, info, warn};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Copy)]
enum Strategy {
    Direct,
    Memoized,
}

/// Serves a file read into memory once. The buffer, content type and
/// entity tag never change after construction.
pub struct MemoizedFile {
    body: Bytes,
    content_type: String,
    etag: String,
}

impl MemoizedFile {
    /// Reads the whole file and fingerprints it. Fails when the path is not a
    /// regular file or fewer bytes were read than its size.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(ServerError::InternalError(format!(
                "not a file: {}",
                path.display()
            )));
        }

        let mut buf = Vec::with_capacity(metadata.len() as usize);
        fs::File::open(path)?.read_to_end(&mut buf)?;
        if buf.len() as u64 != metadata.len() {
            return Err(ServerError::InternalError(format!(
                "read {} of {} bytes from {}",
                buf.len(),
                metadata.len(),
                path.display()
            )));
        }

        Ok(Self::from_bytes(buf, content_type_for(path)))
    }

    pub fn from_bytes(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        let body = body.into();
        let etag = fingerprint(&body);
        Self {
            body,
            content_type: content_type.into(),
            etag,
        }
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl Handler for MemoizedFile {
    fn handle(&self, req: Arc<Request>, _ctx: Arc<Context>) -> Completion<Response> {
        let mut response = match req.get_header("if-none-match") {
            Some(tag) if tag == self.etag => Response::not_modified(),
            _ => {
                let mut response = Response::new(200);
                response.body(self.body.clone());
                response
            }
        };
        response
            .header("Content-Type", &self.content_type)
            .header("ETag", &self.etag);
        Completion::ready(response)
    }
}

/// Serves a file from disk, re-reading it on every request.
pub struct StaticFile {
    path: PathBuf,
    not_found: SharedHandler,
}

impl Handler for StaticFile {
    fn handle(&self, req: Arc<Request>, ctx: Arc<Context>) -> Completion<Response> {
        let path = self.path.clone();
        let not_found = Arc::clone(&self.not_found);
        Completion::pending(async move {
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return not_found.handle(req, ctx).resolve().await;
                }
                Err(err) => return Err(err.into()),
            };
            if !metadata.is_file() {
                return not_found.handle(req, ctx).resolve().await;
            }

            let contents = tokio::fs::read(&path).await?;
            let mut response = Response::new(200);
            response
                .header("Content-Type", content_type_for(&path))
                .body(contents);
            Ok(response)
        })
    }
}

impl Router {
    /// Mounts every file under `dir` at `prefix`, reading from disk on each
    /// request. Returns the number of routes registered.
    pub fn mount_files(&mut self, prefix: &str, dir: impl AsRef<Path>) -> ServerResult<usize> {
        let dir = dir.as_ref();
        info!("Mounting target dir: {} to mount: {prefix}", dir.display());
        self.mount(prefix, dir, Strategy::Direct)
    }

    /// Mounts every file under `dir` at `prefix`, served from memory unless
    /// the router runs in [`RunMode::Local`]. Returns the number of routes
    /// registered.
    pub fn mount_memoized_files(&mut self, prefix: &str, dir: impl AsRef<Path>) -> ServerResult<usize> {
        let dir = dir.as_ref();
        let strategy = match self.run_mode {
            RunMode::Local => Strategy::Direct,
            RunMode::Production => Strategy::Memoized,
        };
        info!("Mounting memoized target dir: {} to mount: {prefix}", dir.display());
        self.mount(prefix, dir, strategy)
    }

    fn mount(&mut self, prefix: &str, dir: &Path, strategy: Strategy) -> ServerResult<usize> {
        let mut mounted = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_symlink() {
                error!("Attempted to mount a symlink, this is not supported: {}", path.display());
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!("Skipping file with non UTF-8 name: {}", path.display());
                continue;
            };

            if is_pattern_segment(&name) {
                warn!(
                    "Mounted name {} is a route pattern and will not match literally",
                    path.display()
                );
            }
            let route = format!("{}/{name}", prefix.trim_end_matches('/'));
            if file_type.is_dir() {
                mounted += self.mount(&route, &path, strategy)?;
            } else if file_type.is_file() {
                let handler = match strategy {
                    Strategy::Direct => self.serve_file(path),
                    Strategy::Memoized => self.serve_memoized_file(&path),
                };
                self.route(&Method::GET, &route, handler);
                mounted += 1;
            }
        }
        Ok(mounted)
    }

    pub fn serve_file(&self, path: impl Into<PathBuf>) -> SharedHandler {
        let path = path.into();
        info!("Serving file directly: {}", path.display());
        Arc::new(StaticFile {
            path,
            not_found: Arc::clone(self.not_found_handler()),
        })
    }

    /// Loads `path` into memory. A file that cannot be read in full is
    /// answered by the server-error handler for as long as the process runs.
    pub fn serve_memoized_file(&self, path: &Path) -> SharedHandler {
        match MemoizedFile::load(path) {
            Ok(file) => {
                info!(
                    "Loaded memoized file path: {} bytes: {} etag: {}",
                    path.display(),
                    file.len(),
                    file.etag()
                );
                Arc::new(file)
            }
            Err(err) => {
                error!("Failed to load file {}: {err}", path.display());
                Arc::clone(self.server_error_handler())
            }
        }
    }
}

/// Whether a file name would register as a `:param` or `*` segment.
fn is_pattern_segment(name: &str) -> bool {
    name == SPLAT || (name.len() > 1 && name.starts_with(':'))
}
