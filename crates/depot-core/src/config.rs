//! Toolchain configuration.
//!
//! Loaded once from a TOML file and shared read-only across every
//! component. Supplies the repository constellation, the target root, the
//! external tool names and the build defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use depot_schema::{normalize_distribution, Arch};

use crate::error::{Error, Result};

fn default_index_filename() -> String {
    "index.tar.gz".to_string()
}

fn default_distribution() -> String {
    "stable".to_string()
}

fn default_tmp_dir() -> PathBuf {
    std::env::temp_dir().join("depot")
}

fn default_admin_dir() -> String {
    "wpkg".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Maintainer {
    pub name: String,
    pub email: String,
}

impl Default for Maintainer {
    fn default() -> Self {
        Self {
            name: "Unknown Maintainer".to_string(),
            email: "nobody@localhost".to_string(),
        }
    }
}

/// External tool names and build-tool defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tools {
    /// The wpkg binary. A bare name is resolved through `PATH`.
    pub pkgtool: PathBuf,
    /// The dependency-graph companion binary.
    pub pkggraph: PathBuf,
    /// CMake generator override; platform default when absent.
    pub cmake_generator: Option<String>,
    pub make_tool: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            pkgtool: PathBuf::from("wpkg"),
            pkggraph: PathBuf::from("deb-graph"),
            cmake_generator: None,
            make_tool: "make".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Default repository root.
    pub deb_root: PathBuf,

    /// Per-distribution repository overrides.
    #[serde(default)]
    pub repositories: BTreeMap<String, PathBuf>,

    /// Root under which per-architecture installation targets live.
    pub target_root: PathBuf,

    #[serde(default = "default_index_filename")]
    pub index_filename: String,

    /// Distribution used when an operation names none.
    #[serde(default = "default_distribution")]
    pub distribution: String,

    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    /// Name of the metadata database directory wpkg keeps under
    /// `var/lib/` in every target root.
    #[serde(default = "default_admin_dir")]
    pub admin_dir: String,

    #[serde(default)]
    pub arch: Arch,

    #[serde(default)]
    pub maintainer: Maintainer,

    #[serde(default)]
    pub tools: Tools,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{}: {e}", path.display()),
            ))
        })
    }

    /// The repository root that owns the given distribution.
    pub fn deb_root_for(&self, distribution: Option<&str>) -> PathBuf {
        let distribution = normalize_distribution(distribution.unwrap_or(&self.distribution));
        self.repositories
            .get(distribution)
            .cloned()
            .unwrap_or_else(|| self.deb_root.clone())
    }

    /// Distribution to use when the caller supplied none, trailing `/`
    /// stripped either way.
    pub fn distribution_or_default<'a>(&'a self, distribution: Option<&'a str>) -> &'a str {
        normalize_distribution(distribution.unwrap_or(&self.distribution))
    }

    /// `<target>/<arch>`, the root handed to wpkg via `--root`.
    pub fn arch_root(&self, arch: &Arch, target_root: Option<&Path>) -> PathBuf {
        target_root
            .unwrap_or(&self.target_root)
            .join(arch.as_str())
    }

    /// `<target>/<arch>/var/lib/<admindir>`.
    pub fn admin_dir_path(&self, arch: &Arch, target_root: Option<&Path>) -> PathBuf {
        self.arch_root(arch, target_root)
            .join("var/lib")
            .join(&self.admin_dir)
    }

    /// `<target>/<arch>/var/lib/<admindir>/core/sources.list`.
    pub fn sources_list_path(&self, arch: &Arch, target_root: Option<&Path>) -> PathBuf {
        self.admin_dir_path(arch, target_root)
            .join("core")
            .join("sources.list")
    }

    /// Repositories handed to wpkg so it can resolve dependencies while
    /// building or installing: the distribution subtree plus `sources`,
    /// from both the effective repo and the default one.
    pub fn repository_add_list(&self, repo: &Path, distribution: &str) -> Vec<PathBuf> {
        let mut list = Vec::new();
        for root in [repo, self.deb_root.as_path()] {
            for sub in [distribution, depot_schema::SOURCES_DISTRIBUTION] {
                let candidate = root.join(sub);
                if candidate.is_dir() && !list.contains(&candidate) {
                    list.push(candidate);
                }
            }
        }
        list
    }

    pub fn cmake_generator(&self) -> &str {
        match &self.tools.cmake_generator {
            Some(generator) => generator,
            None if cfg!(windows) => "MSYS Makefiles",
            None => "Unix Makefiles",
        }
    }
}
