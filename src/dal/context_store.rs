use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::domain::context::Context;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("context store io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("context store json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Json file holding the [`Context`] between runs.
///
/// Single writer only: nothing guards against another process writing the
/// same file.
#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
}

impl ContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ContextStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored context. `Ok(None)` when there is no file yet.
    pub fn try_load(&self) -> Result<Option<Context>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Like [`ContextStore::try_load`], but an absent or unreadable file is an
    /// empty context.
    pub fn load(&self) -> Context {
        match self.try_load() {
            Ok(Some(context)) => {
                log::info!(
                    "Loaded context from {} with {} scraped sources",
                    self.path.display(),
                    context.scraped_sources.values().filter(|v| **v).count()
                );
                context
            }
            Ok(None) => {
                log::info!("No context at {}, starting empty", self.path.display());
                Context::default()
            }
            Err(e) => {
                log::warn!("Ignoring unreadable context store: {}", e);
                Context::default()
            }
        }
    }

    /// Writes the whole context to a sibling temp file and renames it over
    /// the store, so a crash mid-write leaves the previous file intact. The
    /// temp file is removed again when any step fails.
    pub fn save(&self, context: &Context) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(context)?;
        let tmp_path = self.tmp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let result = self.replace_with(&tmp_path, content.as_bytes());
        if result.is_err() {
            match fs::remove_file(&tmp_path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => {
                    log::warn!("Could not remove {}: {}", tmp_path.display(), e)
                }
                _ => {}
            }
        }
        result
    }

    fn replace_with(&self, tmp_path: &Path, content: &[u8]) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io {
            path: tmp_path.to_path_buf(),
            source,
        };

        let mut file = File::create(tmp_path).map_err(io_err)?;
        file.write_all(content).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
