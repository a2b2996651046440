use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// File operations the cataloger and download index need. Every mutation
/// must be a no-op when the implementation is simulating.
pub trait FileSystem {
    /// All regular files below `root`, sorted. A missing root is empty.
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Direct children of `dir`, sorted. A missing directory is empty.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn exists(&self, path: &Path) -> bool;

    fn create_dir_all(&self, dir: &Path) -> Result<()>;

    /// Move `from` to `to`, replacing `to` if present.
    fn move_file(&self, from: &Path, to: &Path) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem {
    pub simulate: bool,
    pub verbose: bool,
}

impl LocalFileSystem {
    pub fn new(simulate: bool, verbose: bool) -> Self {
        Self { simulate, verbose }
    }

    fn announce(&self, action: &str, detail: String) {
        if self.simulate {
            info!(action, "[DRY RUN] {detail}");
        } else if self.verbose {
            info!(action, "{detail}");
        } else {
            debug!(action, "{detail}");
        }
    }
}

impl FileSystem for LocalFileSystem {
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                Error::fs(path, io::Error::other(e))
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::fs(dir, e)),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::fs(dir, e))?;
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, dir: &Path) -> Result<()> {
        self.announce("mkdir", format!("mkdir -p {}", dir.display()));
        if self.simulate {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| Error::fs(dir, e))
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        self.announce("move", format!("mv {} {}", from.display(), to.display()));
        if self.simulate {
            return Ok(());
        }
        if fs::rename(from, to).is_ok() {
            return Ok(());
        }
        // Cross-filesystem: copy then delete
        fs::copy(from, to).map_err(|e| Error::fs(from, e))?;
        fs::remove_file(from).map_err(|e| Error::fs(from, e))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.announce("remove", format!("rm {}", path.display()));
        if self.simulate {
            return Ok(());
        }
        fs::remove_file(path).map_err(|e| Error::fs(path, e))
    }
}
