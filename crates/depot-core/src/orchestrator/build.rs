//! Building packages from sources and source packages.

use std::path::Path;

use tracing::info;

use depot_schema::{Arch, SOURCES_DISTRIBUTION, SRC_SUFFIX};

use crate::error::{Error, Result};
use crate::resolver::Lookup;
use crate::runner::Invocation;

use super::{BuildOptions, Orchestrator};

/// Paths excluded from every build.
const BUILD_EXCEPTIONS: [&str; 2] = [".gitignore", ".gitattributes"];

impl Orchestrator {
    /// Build the binary package under `package_path` and synchronize the
    /// effective repository.
    ///
    /// The architecture is the second-to-last path component (packages
    /// are laid out `<...>/<arch>/<name>`). When the matching target root
    /// exists it is passed along so wpkg can resolve installed
    /// dependencies.
    pub fn build(&self, package_path: &Path, opts: &BuildOptions) -> Result<()> {
        let distribution = self
            .config
            .distribution_or_default(opts.distribution.as_deref())
            .to_string();
        let repo = self.effective_repo(opts, &distribution);
        let arch = arch_from_package_path(package_path)?;

        let mut inv = Invocation::pkg();
        let root = self.config.arch_root(&arch, None);
        if root.is_dir() {
            inv = inv.arg("--root").arg(&root);
        }
        inv = self.with_build_defaults(inv, &repo, &distribution);
        inv = inv.arg("--build").last(package_path);

        self.tools.run_ok(&inv, None)?;
        info!(package = %package_path.display(), %distribution, "built");
        self.sync.sync_repository(&repo)
    }

    /// Build a *source* package out of the working tree at
    /// `package_path`. wpkg picks the package up from its working
    /// directory, so the invocation runs with its cwd there; the
    /// orchestrator's own cwd is never touched.
    pub fn build_src(&self, package_path: &Path, opts: &BuildOptions) -> Result<()> {
        let distribution = self
            .config
            .distribution_or_default(opts.distribution.as_deref())
            .to_string();
        let repo = self.effective_repo(opts, &distribution);

        let inv = self
            .with_build_defaults(Invocation::pkg(), &repo, &distribution)
            .arg("--build")
            .cwd(package_path);

        self.tools.run_ok(&inv, None)?;
        info!(package = %package_path.display(), "source package built");
        self.sync.sync_repository(&repo)
    }

    /// Build binaries from source packages: a single one resolved by
    /// `name`, or the repository's whole `sources` distribution when
    /// `name` is `None`.
    pub fn build_from_src(
        &self,
        name: Option<&str>,
        arch: &Arch,
        opts: &BuildOptions,
    ) -> Result<()> {
        let distribution = self
            .config
            .distribution_or_default(opts.distribution.as_deref())
            .to_string();
        let repo = self.effective_repo(opts, &distribution);

        let mut inv = Invocation::pkg();
        let root = self.config.arch_root(arch, None);
        if root.is_dir() {
            inv = inv.arg("--root").arg(&root);
        }
        inv = self.with_build_defaults(inv, &repo, &distribution);

        let inv = match name {
            None => {
                let sources = repo.join(SOURCES_DISTRIBUTION);
                if !has_source_artifacts(&sources) {
                    return Err(Error::NothingToBuild(sources));
                }
                inv.arg("--build").last(&sources)
            }
            Some(name) => {
                let src_name = if name.ends_with(SRC_SUFFIX) {
                    name.to_string()
                } else {
                    format!("{name}{SRC_SUFFIX}")
                };
                let src = self.resolver.look_for_package(
                    &Lookup::new(&src_name)
                        .arch(arch)
                        .distribution(Some(&distribution))
                        .repository(Some(&repo)),
                )?;
                inv.arg("--build").last(&src.file)
            }
        };

        self.tools.run_ok(&inv, None)?;
        info!(name = name.unwrap_or("<all sources>"), "built from source");
        self.sync.sync_repository(&repo)
    }

    fn effective_repo(&self, opts: &BuildOptions, distribution: &str) -> std::path::PathBuf {
        opts.output_repository
            .clone()
            .unwrap_or_else(|| self.config.deb_root_for(Some(distribution)))
    }

    /// Compression, install prefix, build tools, exceptions, output
    /// repository and the dependency-resolution repository list.
    fn with_build_defaults(
        &self,
        mut inv: Invocation,
        repo: &Path,
        distribution: &str,
    ) -> Invocation {
        inv = inv
            .args(["--compressor", "zstd", "--zlevel", "3"])
            .args(["--install-prefix", "/usr"])
            .arg("--cmake-generator")
            .arg(self.config.cmake_generator())
            .arg("--make-tool")
            .arg(&self.config.tools.make_tool)
            .arg("--exception")
            .args(BUILD_EXCEPTIONS)
            .arg("--output-repository-dir")
            .arg(repo);
        let add_list = self.config.repository_add_list(repo, distribution);
        if !add_list.is_empty() {
            inv = inv.arg("--repository").args(add_list);
        }
        inv
    }
}

fn arch_from_package_path(package_path: &Path) -> Result<Arch> {
    package_path
        .parent()
        .and_then(Path::file_name)
        .map(|name| Arch::new(name.to_string_lossy()))
        .ok_or_else(|| {
            Error::Invariant(format!(
                "cannot derive an architecture from {}",
                package_path.display()
            ))
        })
}

fn has_source_artifacts(sources: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(sources) else {
        return false;
    };
    entries
        .flatten()
        .any(|e| e.file_name().to_string_lossy().ends_with(".deb"))
}
