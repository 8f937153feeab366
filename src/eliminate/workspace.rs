//! Scoped scratch copies of the analyzed module.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::trace;

use crate::analysis::Project;
use crate::error::EliminationError;

/// Module files copied next to the sources so the checker sees the same module.
const MODULE_FILES: &[&str] = &["go.mod", "go.sum", "go.work"];

/// A throwaway copy of the module. Removed from disk when dropped, on every
/// exit path including a cancelled verification.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Copy every non-ignored source file of the project, preserving its
    /// layout relative to the module root.
    pub fn create(project: &Project) -> Result<Self, EliminationError> {
        let dir = tempfile::Builder::new()
            .prefix("unused-interface-methods-")
            .tempdir()
            .map_err(EliminationError::Workspace)?;

        for name in MODULE_FILES {
            let source = project.module_root.join(name);
            if source.is_file() {
                copy_into(&source, &dir.path().join(name))?;
            }
        }
        for relative in &project.sources {
            copy_into(&project.module_root.join(relative), &dir.path().join(relative))?;
        }
        trace!(dir = %dir.path().display(), files = project.sources.len(), "workspace ready");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location of a module-relative file inside the workspace.
    pub fn file(&self, module_path: &Path) -> PathBuf {
        self.dir.path().join(module_path)
    }

    /// Replace a module-relative file's content.
    pub fn write(&self, module_path: &Path, content: &[u8]) -> Result<(), EliminationError> {
        let path = self.file(module_path);
        fs::write(&path, content).map_err(|source| EliminationError::Write { path, source })
    }
}

fn copy_into(from: &Path, to: &Path) -> Result<(), EliminationError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|source| EliminationError::Copy {
            path: from.to_path_buf(),
            source,
        })?;
    }
    fs::copy(from, to).map_err(|source| EliminationError::Copy {
        path: from.to_path_buf(),
        source,
    })?;
    Ok(())
}
