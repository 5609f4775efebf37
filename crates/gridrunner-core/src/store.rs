//! Content-addressable text blob store keyed by a sanitized script id.

use crate::error::{CoreError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ScriptStore {
    root: PathBuf,
}

impl ScriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn save(&self, id: &str, bytes: &str) -> Result<()> {
        let path = self.path_for(id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        debug!(id, "script saved");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<String> {
        let path = self.path_for(id)?;
        std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                debug!(id, "script not found");
                CoreError::NotFound(id.to_string())
            } else {
                warn!(id, error = %e, "script read failed");
                CoreError::Io(e)
            }
        })
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.path_for(id)?.exists())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    /// Returns stored ids in lexicographic order.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        sanitize_id(id)?;
        Ok(self.root.join(id))
    }
}

/// Rejects any id containing a path separator, `..`, or a leading dot.
fn sanitize_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.starts_with('.')
        || Path::new(id).components().count() != 1
    {
        return Err(CoreError::InvalidId(id.to_string()));
    }
    Ok(())
}
