//! Moving artifacts between repositories.

use std::path::Path;

use tracing::{debug, info};

use depot_schema::Arch;

use crate::error::{Error, Result};
use crate::resolver::Lookup;

use super::{Orchestrator, PublishOptions, UnpublishOptions};

impl Orchestrator {
    /// Copy one artifact (and its sidecar, best effort) from `in_repo`
    /// into the destination repository's distribution subtree, then
    /// synchronize the destination.
    pub fn publish(
        &self,
        name: &str,
        arch: &Arch,
        in_repo: &Path,
        opts: &PublishOptions,
    ) -> Result<()> {
        if !in_repo.is_dir() {
            return Err(Error::RepositoryNotFound(in_repo.to_path_buf()));
        }
        let distribution = self
            .config
            .distribution_or_default(opts.distribution.as_deref())
            .to_string();
        let dref = self.resolver.look_for_package(
            &Lookup::new(name)
                .arch(arch)
                .distribution(Some(&distribution))
                .repository(Some(in_repo)),
        )?;

        let out_repo = opts
            .output_repository
            .clone()
            .unwrap_or_else(|| self.config.deb_root_for(Some(&distribution)));
        let dest_dir = out_repo.join(&distribution);
        std::fs::create_dir_all(&dest_dir)?;
        Self::copy_with_sidecar(&dref.file, &dest_dir)?;

        info!(%dref, out = %dest_dir.display(), "published");
        self.sync.sync_repository(&out_repo)
    }

    /// Delete one artifact from its repository. Sidecar errors are
    /// ignored. Synchronizes only when `update_index` is set.
    pub fn unpublish(&self, name: &str, arch: &Arch, opts: &UnpublishOptions) -> Result<()> {
        if let Some(repo) = opts.repository.as_deref() {
            if !repo.is_dir() {
                return Err(Error::RepositoryNotFound(repo.to_path_buf()));
            }
        }
        let dref = self.resolver.look_for_package(
            &Lookup::new(name)
                .arch(arch)
                .distribution(opts.distribution.as_deref())
                .repository(opts.repository.as_deref()),
        )?;

        std::fs::remove_file(&dref.file)?;
        if let Err(err) = std::fs::remove_file(dref.sidecar_path()) {
            debug!(%dref, %err, "sidecar not removed");
        }

        info!(%dref, "unpublished");
        if opts.update_index {
            self.sync.sync_repository(&dref.repository)?;
        }
        Ok(())
    }

    /// `true` when the package resolves; `not-found` becomes `false`
    /// instead of an error.
    pub fn is_published(
        &self,
        name: &str,
        version: Option<&str>,
        arch: &Arch,
        repository: Option<&Path>,
        distribution: Option<&str>,
    ) -> Result<bool> {
        let lookup = Lookup::new(name)
            .version(version)
            .arch(arch)
            .distribution(distribution)
            .repository(repository);
        match self.resolver.look_for_package(&lookup) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::fixture;
    use super::*;

    #[test]
    fn publish_copies_artifact_and_sidecar() {
        let fx = fixture();
        let staging = fx.dir.path().join("staging");
        for (rel, content) in [
            ("stable/pkg_1.0_amd64.deb", "bytes"),
            ("stable/pkg_1.0_amd64.deb.md5sum", "aaa  pkg_1.0_amd64.deb"),
        ] {
            let path = staging.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
        }
        assert_eq!(fx.tools.refresh_index(&staging), 0);

        fx.orch
            .publish(
                "pkg",
                &Arch::new("amd64"),
                &staging,
                &PublishOptions {
                    distribution: Some("stable".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let dest = fx.deb_root().join("stable");
        assert_eq!(
            std::fs::read_to_string(dest.join("pkg_1.0_amd64.deb")).unwrap(),
            "bytes"
        );
        assert!(dest.join("pkg_1.0_amd64.deb.md5sum").is_file());
        // Destination repo was synchronized (two index passes).
        assert!(fx.deb_root().join(&fx.orch.config().index_filename).is_file());
    }

    #[test]
    fn publish_unpublish_round_trip_keeps_archive() {
        let fx = fixture();
        fx.seed_repo("stable/pkg_1.0-1_amd64.deb", "v1");
        fx.orch.sync_repository(None).unwrap();

        let staging = fx.dir.path().join("staging");
        let newer = staging.join("stable/pkg_1.0-2_amd64.deb");
        std::fs::create_dir_all(newer.parent().unwrap()).unwrap();
        std::fs::write(&newer, "v2").unwrap();
        assert_eq!(fx.tools.refresh_index(&staging), 0);

        let arch = Arch::new("amd64");
        fx.orch
            .publish(
                "pkg",
                &arch,
                &staging,
                &PublishOptions {
                    distribution: Some("stable".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        // The publish sync archived the superseded 1.0-1.
        let live = fx.deb_root().join("stable");
        assert!(live.join("pkg_1.0-2_amd64.deb").is_file());
        assert!(!live.join("pkg_1.0-1_amd64.deb").exists());

        fx.orch
            .unpublish(
                "pkg",
                &arch,
                &UnpublishOptions {
                    distribution: Some("stable".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        // The published artifact is gone from the live tree, but the
        // archive keeps every version it ever saw.
        assert!(!live.join("pkg_1.0-2_amd64.deb").exists());
        let archive = crate::archive::archive_root(&fx.deb_root()).join("stable/pkg");
        assert!(archive.join("1.0-1/pkg_1.0-1_amd64.deb").is_file());
        assert!(archive.join("1.0-2/pkg_1.0-2_amd64.deb").is_file());
    }

    #[test]
    fn unpublish_without_update_index_skips_sync() {
        let fx = fixture();
        fx.seed_repo("stable/pkg_1.0_amd64.deb", "v1");
        let before = fx.tools.calls_matching("--create-index").len();

        fx.orch
            .unpublish(
                "pkg",
                &Arch::new("amd64"),
                &UnpublishOptions {
                    update_index: false,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(fx.tools.calls_matching("--create-index").len(), before);
        assert!(!fx.deb_root().join("stable/pkg_1.0_amd64.deb").exists());
    }

    #[test]
    fn publish_from_a_missing_repository_is_an_error() {
        let fx = fixture();
        let ghost = fx.dir.path().join("ghost-repo");
        let err = fx
            .orch
            .publish(
                "pkg",
                &Arch::new("amd64"),
                &ghost,
                &PublishOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::RepositoryNotFound(_)));
    }

    #[test]
    fn is_published_maps_not_found_to_false() {
        let fx = fixture();
        fx.seed_repo("stable/pkg_1.0_amd64.deb", "v1");
        let arch = Arch::new("amd64");

        assert!(fx.orch.is_published("pkg", None, &arch, None, None).unwrap());
        assert!(fx
            .orch
            .is_published("pkg", Some("1.0"), &arch, None, None)
            .unwrap());
        assert!(!fx
            .orch
            .is_published("pkg", Some("9.9"), &arch, None, None)
            .unwrap());
        assert!(!fx.orch.is_published("ghost", None, &arch, None, None).unwrap());
    }
}
