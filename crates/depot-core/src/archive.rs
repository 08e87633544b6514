//! Version archival.
//!
//! After every repository mutation, all but the greatest version of each
//! package is migrated out of the distribution directory into the archive
//! tree next to the repository:
//!
//! ```text
//! <parent(repo)>/wpkg@ver/<distribution>/<name>/<version>/<file>.deb
//! <parent(repo)>/wpkg@ver/<distribution>/<name>/index.json
//! ```
//!
//! The greatest version is additionally *copied* in (back-linked), so the
//! archive holds every version that ever existed, including the live one.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use md5::{Digest, Md5};
use tracing::{debug, warn};

use depot_schema::{
    base_version, specialized_distribution, ArchiveCatalog, DebArtifact, Filter,
    ARCHIVE_DIR_NAME, CATALOG_FILE_NAME,
};

use crate::error::{Error, Result};
use crate::index::{create_index, IndexParser};
use crate::runner::ToolClient;
use crate::vercmp::VersionOrder;

/// The archive tree sits next to the repository root.
pub fn archive_root(repo: &Path) -> PathBuf {
    repo.parent().unwrap_or(repo).join(ARCHIVE_DIR_NAME)
}

pub(crate) fn md5_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// `cp` when `copy`, `mv` otherwise; `mv` falls back to copy+remove for
/// cross-device moves.
fn transfer(src: &Path, dst: &Path, copy: bool) -> io::Result<()> {
    if copy {
        std::fs::copy(src, dst)?;
        return Ok(());
    }
    match std::fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(err),
        Err(_) => {
            std::fs::copy(src, dst)?;
            std::fs::remove_file(src)
        }
    }
}

/// Insertion sort under the external comparator; groups are tiny.
pub(crate) fn sort_ascending(order: &dyn VersionOrder, versions: &mut [String]) -> Result<()> {
    for i in 1..versions.len() {
        let mut j = i;
        while j > 0 && order.is_greater(&versions[j - 1], &versions[j])? {
            versions.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(())
}

pub struct ArchiveManager {
    tools: Arc<dyn ToolClient>,
    index: Arc<IndexParser>,
    order: Arc<dyn VersionOrder>,
    index_filename: String,
}

impl ArchiveManager {
    pub fn new(
        tools: Arc<dyn ToolClient>,
        index: Arc<IndexParser>,
        order: Arc<dyn VersionOrder>,
        index_filename: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            index,
            order,
            index_filename: index_filename.into(),
        }
    }

    /// Sweep one distribution: for every package with more than one
    /// version present, move the losers into the archive and back-link
    /// the winner.
    pub fn archive_distribution(&self, repo: &Path, distribution: &str) -> Result<()> {
        let packages_dir = repo.join(distribution);

        // Control `Distribution` fields, for specialized (`+`) redirects.
        // Resolved per (name, version) from the full index listing.
        let listed = self.index.list_packages(
            &[repo.to_path_buf()],
            &Filter::new(),
            false,
            self.order.as_ref(),
        )?;
        let mut ctrl: BTreeMap<(String, String), String> = BTreeMap::new();
        for repo_packages in &listed {
            for entries in repo_packages.packages.values() {
                for entry in entries {
                    if let Some(ctrl_dist) = &entry.ctrl_distribution {
                        ctrl.insert(
                            (entry.name.clone(), entry.version.clone()),
                            ctrl_dist.clone(),
                        );
                    }
                }
            }
        }

        let mut groups: BTreeMap<String, Vec<DebArtifact>> = BTreeMap::new();
        for entry in std::fs::read_dir(&packages_dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(deb) = DebArtifact::parse(&file_name) {
                if deb.is_stub() {
                    continue;
                }
                groups.entry(deb.name.clone()).or_default().push(deb);
            }
        }

        for (name, debs) in groups {
            if debs.len() < 2 {
                continue;
            }
            debug!(package = %name, count = debs.len(), distribution, "archiving superseded versions");

            let mut winner: Option<DebArtifact> = None;
            for candidate in debs {
                winner = match winner.take() {
                    None => Some(candidate),
                    Some(current) => {
                        let (keep, lose) =
                            if self.order.is_greater(&candidate.version, &current.version)? {
                                (candidate, current)
                            } else {
                                (current, candidate)
                            };
                        let dest = self.archive_dir_for(repo, distribution, &ctrl, &lose);
                        self.move_to_archive(&packages_dir, &dest, &lose, false)?;
                        Some(keep)
                    }
                };
            }

            let Some(latest) = winner else {
                return Err(Error::Invariant(format!(
                    "at least one version of {name} must exist in the main repository"
                )));
            };
            let dest = self.archive_dir_for(repo, distribution, &ctrl, &latest);
            self.move_to_archive(&packages_dir, &dest, &latest, true)?;
        }
        Ok(())
    }

    /// Archive destination for one artifact: the swept distribution,
    /// unless its control file names a specialized (`+`) distribution.
    fn archive_dir_for(
        &self,
        repo: &Path,
        distribution: &str,
        ctrl: &BTreeMap<(String, String), String>,
        deb: &DebArtifact,
    ) -> PathBuf {
        let special = ctrl
            .get(&(deb.name.clone(), deb.version.clone()))
            .and_then(|field| specialized_distribution(field));
        archive_root(repo).join(special.unwrap_or(distribution))
    }

    /// Move (or back-link) one artifact into
    /// `<archive_dir>/<name>/<version>/` and refresh the catalog.
    ///
    /// If the destination already holds identical bytes this is a no-op
    /// apart from dropping the source when not back-linking; differing
    /// bytes are overwritten with a warning.
    pub fn move_to_archive(
        &self,
        packages_dir: &Path,
        archive_dir: &Path,
        deb: &DebArtifact,
        back_link: bool,
    ) -> Result<()> {
        let src = packages_dir.join(&deb.file);
        let version_dir = archive_dir.join(&deb.name).join(&deb.version);
        let dst = version_dir.join(&deb.file);

        if dst.is_file() {
            if md5_file(&src)? == md5_file(&dst)? {
                if !back_link {
                    std::fs::remove_file(&src)?;
                    match std::fs::remove_file(packages_dir.join(deb.sidecar_name())) {
                        Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err.into()),
                        _ => {}
                    }
                }
                return Ok(());
            }
            warn!(
                artifact = %deb.file,
                archive = %version_dir.display(),
                "archived artifact differs, overwriting"
            );
        }

        std::fs::create_dir_all(&version_dir)?;
        transfer(&src, &dst, back_link)?;
        match transfer(
            &packages_dir.join(deb.sidecar_name()),
            &version_dir.join(deb.sidecar_name()),
            back_link,
        ) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(artifact = %deb.file, "no md5sum sidecar to archive");
            }
            Err(err) => return Err(err.into()),
            Ok(()) => {}
        }

        create_index(self.tools.as_ref(), &self.index_filename, &version_dir)?;
        self.rebuild_catalog(&archive_dir.join(&deb.name))
    }

    /// Rewrite `<name>/index.json` from what is actually on disk: purge
    /// versions whose directories vanished, pick up new ones, recompute
    /// the per-base and top-level `latest` pointers.
    fn rebuild_catalog(&self, pkg_dir: &Path) -> Result<()> {
        let catalog_path = pkg_dir.join(CATALOG_FILE_NAME);
        let mut catalog = if catalog_path.is_file() {
            match ArchiveCatalog::load(&catalog_path) {
                Ok(catalog) => catalog,
                Err(err) => {
                    warn!(path = %catalog_path.display(), %err, "unreadable catalog, rebuilding");
                    ArchiveCatalog::default()
                }
            }
        } else {
            ArchiveCatalog::default()
        };

        for base in catalog.bases.values_mut() {
            base.versions.retain(|version| pkg_dir.join(version).is_dir());
        }
        catalog.bases.retain(|_, base| !base.versions.is_empty());

        for entry in std::fs::read_dir(pkg_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let version = entry.file_name().to_string_lossy().into_owned();
            let slot = catalog
                .bases
                .entry(base_version(&version).to_string())
                .or_default();
            if !slot.versions.iter().any(|v| *v == version) {
                slot.versions.push(version);
            }
        }

        for slot in catalog.bases.values_mut() {
            sort_ascending(self.order.as_ref(), &mut slot.versions)?;
            slot.latest = slot.versions.last().cloned().unwrap_or_default();
        }
        let base_keys: Vec<String> = catalog.bases.keys().cloned().collect();
        catalog.latest = self.order.latest(&base_keys)?.map(String::from);

        catalog.save(&catalog_path)?;
        Ok(())
    }
}
