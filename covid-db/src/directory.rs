use crate::ArtifactStore;
use covid_jhu::error::{CovidError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const EXTENSION: &str = "json";

/// Artifact store writing one `<name>.json` file per artifact under a
/// directory.
///
/// Bodies are written to a uniquely named temporary file in the same
/// directory and renamed into place, so a reader never sees a half-written
/// file and concurrent writers never share a staging file.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Use `root`, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| CovidError::persistence(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, EXTENSION))
    }

    fn stage(&self, name: &str, body: &str) -> Result<NamedTempFile> {
        let mut staged = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(|e| CovidError::persistence(name, e))?;
        staged
            .write_all(body.as_bytes())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| CovidError::persistence(name, e))?;
        Ok(staged)
    }

    fn commit(&self, name: &str, staged: NamedTempFile) -> Result<()> {
        staged
            .persist(self.path_for(name))
            .map(|_| ())
            .map_err(|e| CovidError::persistence(name, e.error))
    }
}

impl ArtifactStore for DirectoryStore {
    fn save(&self, name: &str, body: &str) -> Result<()> {
        let staged = self.stage(name, body)?;
        self.commit(name, staged)?;
        log::info!(
            "[COVID Debug] directory: Wrote {} ({} bytes)",
            self.path_for(name).display(),
            body.len()
        );
        Ok(())
    }

    fn load(&self, name: &str) -> Result<String> {
        fs::read_to_string(self.path_for(name)).map_err(|e| CovidError::persistence(name, e))
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.path_for(name).is_file())
    }

    /// Every body is staged before any is renamed into place. Staged files
    /// not yet committed are removed when an error drops them.
    fn save_all(&self, artifacts: &[(&str, String)]) -> Result<()> {
        let staged = artifacts
            .iter()
            .map(|(name, body)| Ok((*name, self.stage(name, body)?)))
            .collect::<Result<Vec<(&str, NamedTempFile)>>>()?;
        let count = staged.len();
        for (name, file) in staged {
            self.commit(name, file)?;
        }
        log::info!(
            "[COVID Debug] directory: Wrote {} artifacts to {}",
            count,
            self.root.display()
        );
        Ok(())
    }
}
