//! Package resolution.
//!
//! Given a name and optional version/arch/distribution/repository, probe
//! an ordered list of candidate repositories through the index parser and
//! assemble a fully-qualified [`DebRef`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use depot_schema::{
    Arch, DebRef, Filter, FilterKey, IndexEntry, Pattern, SOURCES_DISTRIBUTION, SRC_SUFFIX,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::IndexParser;
use crate::vercmp::VersionOrder;

/// One resolution request. Everything but the name is optional and falls
/// back to the toolchain defaults.
#[derive(Debug, Clone, Default)]
pub struct Lookup<'a> {
    pub name: &'a str,
    pub version: Option<&'a str>,
    pub arch: Option<&'a Arch>,
    pub distribution: Option<&'a str>,
    pub repository: Option<&'a Path>,
}

impl<'a> Lookup<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn version(mut self, version: Option<&'a str>) -> Self {
        self.version = version;
        self
    }

    pub fn arch(mut self, arch: &'a Arch) -> Self {
        self.arch = Some(arch);
        self
    }

    pub fn distribution(mut self, distribution: Option<&'a str>) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn repository(mut self, repository: Option<&'a Path>) -> Self {
        self.repository = repository;
        self
    }
}

pub struct Resolver {
    config: Arc<Config>,
    index: Arc<IndexParser>,
    order: Arc<dyn VersionOrder>,
}

impl Resolver {
    pub fn new(config: Arc<Config>, index: Arc<IndexParser>, order: Arc<dyn VersionOrder>) -> Self {
        Self {
            config,
            index,
            order,
        }
    }

    /// Probe order: the explicit repository (or the distribution's root),
    /// then the default root as a fallback when it differs.
    pub fn probe_order(&self, lookup: &Lookup<'_>) -> Vec<PathBuf> {
        let primary = lookup
            .repository
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.deb_root_for(lookup.distribution));
        let mut probes = vec![primary];
        if probes[0] != self.config.deb_root {
            probes.push(self.config.deb_root.clone());
        }
        probes
    }

    /// Resolve a package to the greatest matching version across the
    /// probe order. The first repository with a hit wins.
    pub fn look_for_package(&self, lookup: &Lookup<'_>) -> Result<DebRef> {
        let distribution = self
            .config
            .distribution_or_default(lookup.distribution)
            .to_string();
        let probes = self.probe_order(lookup);
        let arch = lookup.arch.cloned().unwrap_or_else(|| self.config.arch.clone());

        let mut filter = Filter::new()
            .with(FilterKey::Name, Pattern::literal(lookup.name))
            .with(
                FilterKey::Distrib,
                Pattern::regex(&format!(
                    "^(?:{}|{SOURCES_DISTRIBUTION})$",
                    regex::escape(&distribution)
                ))
                .expect("escaped distribution pattern"),
            );
        // Source packages report no architecture, so an arch predicate
        // would exclude them outright.
        if !lookup.name.ends_with(SRC_SUFFIX) {
            filter = filter.with(
                FilterKey::Arch,
                Pattern::regex(&format!("^(?:{}|all)$", regex::escape(arch.as_str())))
                    .expect("escaped arch pattern"),
            );
        }
        if let Some(version) = lookup.version {
            filter = filter.with(FilterKey::Version, Pattern::literal(version));
        }

        let listed = self
            .index
            .list_packages(&probes, &filter, true, self.order.as_ref())?;
        for repo in &listed {
            if let Some(entry) = repo.best(lookup.name) {
                debug!(name = lookup.name, repo = %repo.repo.display(), version = %entry.version, "resolved");
                return Ok(assemble(&repo.repo, entry, &distribution));
            }
        }
        Err(Error::not_found(lookup.name, lookup.version, &distribution))
    }
}

fn assemble(repository: &Path, entry: &IndexEntry, fallback_distribution: &str) -> DebRef {
    let file = repository.join(&entry.file);
    let hash = read_md5_sidecar(&file);
    DebRef {
        name: entry.name.clone(),
        version: entry.version.clone(),
        arch: entry.arch.clone(),
        distribution: entry
            .distrib
            .clone()
            .unwrap_or_else(|| fallback_distribution.to_string()),
        file,
        repository: repository.to_path_buf(),
        hash,
        ctrl_distribution: entry.ctrl_distribution.clone(),
    }
}

/// First token of the `.md5sum` sidecar, if it exists. Absence is benign.
pub(crate) fn read_md5_sidecar(artifact: &Path) -> Option<String> {
    let mut name = artifact.file_name()?.to_string_lossy().into_owned();
    name.push_str(".md5sum");
    let text = match std::fs::read_to_string(artifact.with_file_name(name)) {
        Ok(text) => text,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                debug!(artifact = %artifact.display(), %err, "unreadable md5sum sidecar");
            }
            return None;
        }
    };
    text.split_whitespace().next().map(String::from)
}
