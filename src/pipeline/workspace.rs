use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

/// Per-request scratch directory, removed when dropped.
///
/// The directory name embeds the job id plus a random suffix, so concurrent jobs never
/// share a path.
#[derive(Debug)]
pub struct JobWorkspace {
    job_id: Uuid,
    dir: TempDir,
}

impl JobWorkspace {
    pub fn create(root: &Path, job_id: Uuid) -> io::Result<Self> {
        fs_err::create_dir_all(root)?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("dub-{}-", job_id))
            .tempdir_in(root)?;

        tracing::debug!(path = %dir.path().display(), "Created job workspace");

        Ok(Self { job_id, dir })
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        tracing::debug!(path = %self.dir.path().display(), "Removing job workspace");
    }
}
