//! The two-pass index / archive cycle run after every mutation.
//!
//! Pass one refreshes the repository index so newly-added packages are
//! visible to the archiver; then every distribution is swept; pass two
//! refreshes the index again so it reflects the movements. An ENOENT
//! anywhere in the chain means the repository is simply empty and is
//! swallowed; every other error surfaces.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::archive::ArchiveManager;
use crate::error::Result;
use crate::index::create_index;
use crate::runner::ToolClient;

pub struct RepositorySynchronizer {
    tools: Arc<dyn ToolClient>,
    archive: Arc<ArchiveManager>,
    index_filename: String,
}

impl RepositorySynchronizer {
    pub fn new(
        tools: Arc<dyn ToolClient>,
        archive: Arc<ArchiveManager>,
        index_filename: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            archive,
            index_filename: index_filename.into(),
        }
    }

    pub fn sync_repository(&self, repo: &Path) -> Result<()> {
        match self.sync_inner(repo) {
            Err(err) if err.is_enoent() => {
                debug!(repo = %repo.display(), "nothing to synchronize");
                Ok(())
            }
            other => other,
        }
    }

    fn sync_inner(&self, repo: &Path) -> Result<()> {
        let mut distributions = Vec::new();
        for entry in std::fs::read_dir(repo)? {
            let entry = entry?;
            if entry.path().is_dir() {
                distributions.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        distributions.sort();

        create_index(self.tools.as_ref(), &self.index_filename, repo)?;
        for distribution in &distributions {
            self.archive.archive_distribution(repo, distribution)?;
        }
        // Strictly after every archival movement.
        create_index(self.tools.as_ref(), &self.index_filename, repo)?;

        info!(repo = %repo.display(), distributions = distributions.len(), "repository synchronized");
        Ok(())
    }
}
