//! Queries and maintenance over the version archive.

use std::path::{Path, PathBuf};

use tracing::info;

use depot_schema::{Arch, ArchiveCatalog, CATALOG_FILE_NAME};

use crate::archive::archive_root;
use crate::error::{Error, Result};

use super::Orchestrator;

impl Orchestrator {
    fn load_catalog(&self, name: &str, distribution: Option<&str>) -> Result<ArchiveCatalog> {
        let distribution = self.config.distribution_or_default(distribution);
        let repo = self.config.deb_root_for(Some(distribution));
        let path = archive_root(&repo)
            .join(distribution)
            .join(name)
            .join(CATALOG_FILE_NAME);
        if !path.is_file() {
            return Err(Error::not_found(name, None, distribution));
        }
        Ok(ArchiveCatalog::load(&path)?)
    }

    /// All archived versions of `name`, ascending under the comparator.
    pub fn list_archive_versions(
        &self,
        name: &str,
        distribution: Option<&str>,
    ) -> Result<Vec<String>> {
        let catalog = self.load_catalog(name, distribution)?;
        let mut versions = catalog.all_versions();
        crate::archive::sort_ascending(self.order.as_ref(), &mut versions)?;
        Ok(versions)
    }

    /// The full version the catalog's top-level `latest` points at.
    pub fn archive_latest_version(
        &self,
        name: &str,
        distribution: Option<&str>,
    ) -> Result<Option<String>> {
        let catalog = self.load_catalog(name, distribution)?;
        Ok(catalog.latest_version().map(String::from))
    }

    /// Copy an archived version back out: into `destination` when given,
    /// otherwise into the live distribution directory (followed by a
    /// synchronization, which may immediately re-archive it as a loser).
    pub fn copy_from_archive(
        &self,
        name: &str,
        version: &str,
        arch: &Arch,
        distribution: Option<&str>,
        destination: Option<&Path>,
    ) -> Result<PathBuf> {
        let dref = self.archived_ref(name, version, arch, distribution)?;
        let dist = self.config.distribution_or_default(distribution);
        let repo = self.config.deb_root_for(Some(dist));

        let dest_dir = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo.join(dist));
        std::fs::create_dir_all(&dest_dir)?;
        let copied = Self::copy_with_sidecar(&dref.file, &dest_dir)?;
        info!(%dref, dest = %copied.display(), "copied out of archive");

        if destination.is_none() {
            self.sync.sync_repository(&repo)?;
        }
        Ok(copied)
    }

    /// Relocate the whole `wpkg@ver` tree when a repository moves.
    pub fn move_archive(&self, from_repo: &Path, to_repo: &Path) -> Result<()> {
        let src = archive_root(from_repo);
        if !src.is_dir() {
            return Ok(());
        }
        let dst = archive_root(to_repo);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if std::fs::rename(&src, &dst).is_err() {
            // Cross-device, or the destination already has an archive:
            // merge the trees and drop the source.
            fs_extra::dir::copy(
                &src,
                &dst,
                &fs_extra::dir::CopyOptions::new()
                    .content_only(true)
                    .overwrite(true),
            )
            .map_err(|err| Error::Invariant(format!("archive move failed: {err}")))?;
            std::fs::remove_dir_all(&src)?;
        }
        info!(from = %src.display(), to = %dst.display(), "archive moved");
        Ok(())
    }
}
