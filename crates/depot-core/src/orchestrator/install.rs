//! Target-root operations: install, remove, upgrade and friends.

use std::path::Path;

use tracing::info;

use depot_schema::Arch;

use crate::error::{Error, Result};
use crate::resolver::Lookup;

use super::{InstallOptions, Orchestrator};

/// wpkg selection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Auto,
    Normal,
    Hold,
    Reject,
}

impl Selection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Normal => "normal",
            Self::Hold => "hold",
            Self::Reject => "reject",
        }
    }
}

impl std::str::FromStr for Selection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "normal" => Ok(Self::Normal),
            "hold" => Ok(Self::Hold),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown selection state: {other}")),
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Orchestrator {
    /// Resolve `name` and install the artifact into `<target>/<arch>`.
    pub fn install(&self, name: &str, arch: &Arch, opts: &InstallOptions) -> Result<()> {
        let dref = self.resolver.look_for_package(
            &Lookup::new(name)
                .arch(arch)
                .distribution(opts.distribution.as_deref()),
        )?;
        info!(%dref, "installing");
        self.install_target(dref.file.as_os_str(), arch, &dref.distribution, opts)
    }

    /// Install by package name, letting wpkg resolve through its own
    /// sources and the repository add-list.
    pub fn install_by_name(&self, name: &str, arch: &Arch, opts: &InstallOptions) -> Result<()> {
        let distribution = self
            .config
            .distribution_or_default(opts.distribution.as_deref())
            .to_string();
        self.install_target(std::ffi::OsStr::new(name), arch, &distribution, opts)
    }

    /// Install a version pinned from the archive tree.
    pub fn install_from_archive(
        &self,
        name: &str,
        version: &str,
        arch: &Arch,
        opts: &InstallOptions,
    ) -> Result<()> {
        let dref = self.archived_ref(name, version, arch, opts.distribution.as_deref())?;
        info!(%dref, "installing from archive");
        self.install_target(dref.file.as_os_str(), arch, &dref.distribution, opts)
    }

    fn install_target(
        &self,
        target: &std::ffi::OsStr,
        arch: &Arch,
        distribution: &str,
        opts: &InstallOptions,
    ) -> Result<()> {
        let mut inv = self
            .pkg_on_root(arch, opts.target_root.as_deref())
            .args(["--force-file-info", "--accept-special-windows-filename"]);
        let add_list = self
            .config
            .repository_add_list(&self.config.deb_root_for(Some(distribution)), distribution);
        if !add_list.is_empty() {
            inv = inv.arg("--repository").args(add_list);
        }
        if !opts.reinstall {
            inv = inv.arg("--skip-same-version");
        }
        inv = inv.arg("--install").last(target);
        self.tools.run_ok(&inv, None)
    }

    /// Exit code 0 means installed, 1 means not.
    pub fn is_installed(&self, name: &str, arch: &Arch, target_root: Option<&Path>) -> Result<bool> {
        let inv = self
            .pkg_on_root(arch, target_root)
            .arg("--is-installed")
            .last(name);
        match self.tools.run(&inv, None)? {
            0 => Ok(true),
            1 => Ok(false),
            code => Err(Error::ToolFailed {
                tool: "wpkg".to_string(),
                code,
            }),
        }
    }

    pub fn remove(&self, name: &str, arch: &Arch, target_root: Option<&Path>) -> Result<()> {
        let inv = self.pkg_on_root(arch, target_root).arg("--remove").last(name);
        self.tools.run_ok(&inv, None)
    }

    pub fn autoremove(&self, arch: &Arch, target_root: Option<&Path>) -> Result<()> {
        let inv = self.pkg_on_root(arch, target_root).arg("--autoremove");
        self.tools.run_ok(&inv, None)
    }

    pub fn set_selection(
        &self,
        name: &str,
        selection: Selection,
        arch: &Arch,
        target_root: Option<&Path>,
    ) -> Result<()> {
        let inv = self
            .pkg_on_root(arch, target_root)
            .arg("--set-selection")
            .arg(selection.as_str())
            .last(name);
        self.tools.run_ok(&inv, None)
    }

    pub fn update(&self, arch: &Arch, target_root: Option<&Path>) -> Result<()> {
        let inv = self.pkg_on_root(arch, target_root).arg("--update");
        self.tools.run_ok(&inv, None)
    }

    pub fn upgrade(&self, arch: &Arch, target_root: Option<&Path>) -> Result<()> {
        let inv = self
            .pkg_on_root(arch, target_root)
            .args(["--force-file-info", "--accept-special-windows-filename"])
            .arg("--upgrade");
        self.tools.run_ok(&inv, None)
    }
}
