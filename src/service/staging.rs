use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const MAX_STAGED_NAME_LEN: usize = 128;

/// Root directory under which each batch gets its own staging directory.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root directory. Called once at startup.
    pub fn prepare(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let area = Self::new(root);
        std::fs::create_dir_all(&area.root)
            .with_context(|| format!("failed to create storage root {:?}", area.root))?;
        Ok(area)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn begin(&self) -> AppResult<StagedBatch> {
        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|err| AppError::Staging(format!("cannot create {}: {err}", dir.display())))?;

        debug!(batch = %id, dir = %dir.display(), "staging batch opened");

        Ok(StagedBatch {
            id,
            dir,
            files: Vec::new(),
            released: false,
        })
    }
}

/// Files staged for one request. Everything is removed by [`StagedBatch::cleanup`],
/// or by `Drop` when the request is abandoned before cleanup runs.
#[derive(Debug)]
pub struct StagedBatch {
    id: Uuid,
    dir: PathBuf,
    files: Vec<PathBuf>,
    released: bool,
}

impl StagedBatch {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn stage(&mut self, index: usize, name: &str, bytes: &[u8]) -> AppResult<PathBuf> {
        let path = self
            .dir
            .join(format!("{index}-{}", sanitize_file_name(name)));

        // Tracked before writing so a partial write is still removed.
        self.files.push(path.clone());
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| AppError::Staging(format!("{name}: {err}")))?;

        debug!(batch = %self.id, file = name, bytes = bytes.len(), "staged upload");
        Ok(path)
    }

    /// Best-effort removal. Failures are logged and never returned.
    pub async fn cleanup(mut self) {
        for path in &self.files {
            if let Err(err) = tokio::fs::remove_file(path).await {
                log_cleanup_failure(self.id, path, &err);
            }
        }
        // also takes anything a failed write left behind
        if let Err(err) = tokio::fs::remove_dir_all(&self.dir).await {
            log_cleanup_failure(self.id, &self.dir, &err);
        }

        self.files.clear();
        self.released = true;
        debug!(batch = %self.id, "staging batch cleaned up");
    }
}

impl Drop for StagedBatch {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(batch = %self.id, "staging batch dropped before cleanup, removing synchronously");
        for path in &self.files {
            if let Err(err) = std::fs::remove_file(path) {
                log_cleanup_failure(self.id, path, &err);
            }
        }
        if let Err(err) = std::fs::remove_dir_all(&self.dir) {
            log_cleanup_failure(self.id, &self.dir, &err);
        }
    }
}

fn log_cleanup_failure(batch: Uuid, path: &Path, err: &io::Error) {
    if err.kind() == io::ErrorKind::NotFound {
        return;
    }
    warn!(batch = %batch, path = %path.display(), error = %err, "failed to remove staged file");
}

/// Reduce a client-supplied name to a single safe path component.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(|ch: char| ch == '/' || ch == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|ch| if ch.is_control() || ch == ':' { '_' } else { ch })
        .take(MAX_STAGED_NAME_LEN)
        .collect();

    let trimmed = cleaned.trim_matches(|ch: char| ch == '.' || ch.is_whitespace());
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
