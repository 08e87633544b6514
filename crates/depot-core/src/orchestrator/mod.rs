//! The high-level facade.
//!
//! One `Orchestrator` owns the tool runner, the caches and the pipeline
//! components, and exposes every repository/target operation the wider
//! build system calls. Operations are sequences of child-process and
//! filesystem steps; within one orchestrator nothing interleaves.

mod archive_ops;
mod build;
mod graph;
mod install;
mod publish;
mod query;
mod sources;

pub use install::Selection;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use depot_schema::{Arch, DebArtifact, DebRef};

use crate::archive::{archive_root, ArchiveManager};
use crate::cache::{BoundedCache, SHOW_CACHE_CAP};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::IndexParser;
use crate::resolver::{Lookup, Resolver};
use crate::runner::{Invocation, ToolClient, ToolRunner};
use crate::sync::RepositorySynchronizer;
use crate::vercmp::{VersionOrder, WpkgVersionOrder};

/// Options shared by the build operations.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Override the default repository the artifacts land in.
    pub output_repository: Option<PathBuf>,
    /// Target distribution subtree; toolchain default when absent.
    pub distribution: Option<String>,
}

/// Options shared by the install operations.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub distribution: Option<String>,
    /// Override the configured target root.
    pub target_root: Option<PathBuf>,
    /// Reinstall even when the same version is already present.
    pub reinstall: bool,
}

/// Options for `publish`.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Destination repository; toolchain default when absent.
    pub output_repository: Option<PathBuf>,
    pub distribution: Option<String>,
}

/// Options for `unpublish`.
#[derive(Debug, Clone)]
pub struct UnpublishOptions {
    /// Repository holding the artifact; toolchain default when absent.
    pub repository: Option<PathBuf>,
    pub distribution: Option<String>,
    /// Skip the expensive re-synchronization when unset.
    pub update_index: bool,
}

impl Default for UnpublishOptions {
    fn default() -> Self {
        Self {
            repository: None,
            distribution: None,
            update_index: true,
        }
    }
}

/// Options for `show` and `get_deb_location`.
#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    /// Pin to an archived version instead of the live latest.
    pub version: Option<String>,
    pub distribution: Option<String>,
}

pub struct Orchestrator {
    config: Arc<Config>,
    tools: Arc<dyn ToolClient>,
    order: Arc<dyn VersionOrder>,
    resolver: Resolver,
    sync: RepositorySynchronizer,
    show_cache: Mutex<BoundedCache<serde_json::Value>>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let tools: Arc<dyn ToolClient> = Arc::new(ToolRunner::new(&config));
        let order: Arc<dyn VersionOrder> = Arc::new(WpkgVersionOrder::new(tools.clone()));
        Self::with_parts(config, tools, order)
    }

    /// Wire the pipeline with explicit tool and comparator seams.
    pub fn with_parts(
        config: Arc<Config>,
        tools: Arc<dyn ToolClient>,
        order: Arc<dyn VersionOrder>,
    ) -> Self {
        let index = Arc::new(IndexParser::new(tools.clone(), config.index_filename.clone()));
        let archive = Arc::new(ArchiveManager::new(
            tools.clone(),
            index.clone(),
            order.clone(),
            config.index_filename.clone(),
        ));
        let resolver = Resolver::new(config.clone(), index, order.clone());
        let sync =
            RepositorySynchronizer::new(tools.clone(), archive, config.index_filename.clone());
        Self {
            config,
            tools,
            order,
            resolver,
            sync,
            show_cache: Mutex::new(BoundedCache::new(SHOW_CACHE_CAP)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a package against the repository constellation.
    pub fn look_for_package(&self, lookup: &Lookup<'_>) -> Result<DebRef> {
        self.resolver.look_for_package(lookup)
    }

    /// Run the index/archive/index cycle on `repo` (default root when
    /// `None`).
    pub fn sync_repository(&self, repo: Option<&Path>) -> Result<()> {
        let repo = repo
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.deb_root.clone());
        self.sync.sync_repository(&repo)
    }

    /// Strict Debian `>` between two version strings.
    pub fn is_v1_greater(&self, v1: &str, v2: &str) -> Result<bool> {
        self.order.is_greater(v1, v2)
    }

    /// Start a wpkg invocation rooted at `<target>/<arch>`.
    fn pkg_on_root(&self, arch: &Arch, target_root: Option<&Path>) -> Invocation {
        Invocation::pkg()
            .arg("--root")
            .arg(self.config.arch_root(arch, target_root))
    }

    /// Resolve from the live repositories, or from the archive when a
    /// version is pinned. The archive holds every version that ever
    /// existed, the live latest included (it is back-linked).
    fn resolve_maybe_archived(
        &self,
        name: &str,
        version: Option<&str>,
        arch: &Arch,
        distribution: Option<&str>,
    ) -> Result<DebRef> {
        match version {
            None => self.resolver.look_for_package(
                &Lookup::new(name).arch(arch).distribution(distribution),
            ),
            Some(version) => self.archived_ref(name, version, arch, distribution),
        }
    }

    /// Locate one archived version under
    /// `<archive>/<distribution>/<name>/<version>/`.
    fn archived_ref(
        &self,
        name: &str,
        version: &str,
        arch: &Arch,
        distribution: Option<&str>,
    ) -> Result<DebRef> {
        let distribution = self.config.distribution_or_default(distribution);
        let repo = self.config.deb_root_for(Some(distribution));
        let version_dir = archive_root(&repo)
            .join(distribution)
            .join(name)
            .join(version);

        let entries = match std::fs::read_dir(&version_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(name, Some(version), distribution));
            }
            Err(err) => return Err(err.into()),
        };

        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(deb) = DebArtifact::parse(&file_name) else {
                continue;
            };
            if deb.name != name || deb.version != version {
                continue;
            }
            let arch_ok = match &deb.arch {
                None => true,
                Some(a) => a == arch || a.is_wildcard(),
            };
            if !arch_ok {
                continue;
            }
            let file = version_dir.join(&deb.file);
            let hash = crate::resolver::read_md5_sidecar(&file);
            return Ok(DebRef {
                name: deb.name,
                version: deb.version,
                arch: deb.arch.map(|a| a.to_string()),
                distribution: distribution.to_string(),
                file,
                repository: repo,
                hash,
                ctrl_distribution: None,
            });
        }
        Err(Error::not_found(name, Some(version), distribution))
    }

    /// Copy `src` to `dst`, carrying the `.md5sum` sidecar along when it
    /// exists.
    fn copy_with_sidecar(src: &Path, dst_dir: &Path) -> Result<PathBuf> {
        let file_name = src
            .file_name()
            .ok_or_else(|| Error::Invariant(format!("not a file path: {}", src.display())))?;
        let dst = dst_dir.join(file_name);
        std::fs::copy(src, &dst)?;

        let mut sidecar = file_name.to_string_lossy().into_owned();
        sidecar.push_str(".md5sum");
        match std::fs::copy(src.with_file_name(&sidecar), dst_dir.join(&sidecar)) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(artifact = %src.display(), "no md5sum sidecar to copy");
            }
            Err(err) => return Err(err.into()),
            Ok(_) => {}
        }
        Ok(dst)
    }
}
