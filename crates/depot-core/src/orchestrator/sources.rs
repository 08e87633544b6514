//! Target-root setup: admindir creation, hooks and the sources list.
//!
//! `add_sources` / `remove_sources` read `sources.list` directly instead
//! of going through `--list-sources`, which would take wpkg's admindir
//! lock for a plain read.

use std::io;
use std::path::Path;

use tracing::{debug, info};

use depot_schema::Arch;

use crate::error::Result;
use crate::runner::Invocation;

use super::Orchestrator;

/// Rendered into the admindir control file.
const ADMINDIR_TEMPLATE: &str = "\
Architecture: ${ARCHITECTURE}
Maintainer: ${MAINTAINER.NAME} <${MAINTAINER.EMAIL}>
Distribution: ${DISTRIBUTION}
";

impl Orchestrator {
    /// Create the per-architecture admindir under the target root and
    /// leave an empty `sources.list` behind so later `update`/`upgrade`
    /// calls do not trip over its absence.
    pub fn create_admindir(
        &self,
        arch: &Arch,
        distribution: Option<&str>,
        target_root: Option<&Path>,
    ) -> Result<()> {
        let distribution = self.config.distribution_or_default(distribution);
        let rendered = ADMINDIR_TEMPLATE
            .replace("${ARCHITECTURE}", arch.as_str())
            .replace("${MAINTAINER.NAME}", &self.config.maintainer.name)
            .replace("${MAINTAINER.EMAIL}", &self.config.maintainer.email)
            .replace("${DISTRIBUTION}", distribution);

        std::fs::create_dir_all(&self.config.tmp_dir)?;
        let ctrl_path = self.config.tmp_dir.join(format!("admindir-{arch}.ctrl"));
        std::fs::write(&ctrl_path, rendered)?;

        let root = self.config.arch_root(arch, target_root);
        std::fs::create_dir_all(&root)?;
        let inv = Invocation::pkg()
            .arg("--root")
            .arg(&root)
            .arg("--create-admindir")
            .last(&ctrl_path);
        self.tools.run_ok(&inv, None)?;

        let sources = self.config.sources_list_path(arch, target_root);
        if let Some(parent) = sources.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if !sources.exists() {
            std::fs::write(&sources, "")?;
        }
        info!(%arch, root = %root.display(), "admindir created");
        Ok(())
    }

    pub fn add_hooks(
        &self,
        hooks: &[std::path::PathBuf],
        arch: &Arch,
        target_root: Option<&Path>,
    ) -> Result<()> {
        let inv = self
            .pkg_on_root(arch, target_root)
            .arg("--add-hooks")
            .args(hooks);
        self.tools.run_ok(&inv, None)
    }

    /// Register a source line, de-duplicating against the file contents.
    /// The exact line being present makes this a no-op.
    pub fn add_sources(
        &self,
        source_line: &str,
        arch: &Arch,
        target_root: Option<&Path>,
    ) -> Result<()> {
        let path = self.config.sources_list_path(arch, target_root);
        let existing = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };
        if existing.lines().any(|line| line == source_line) {
            debug!(source_line, "already registered");
            return Ok(());
        }

        let inv = self
            .pkg_on_root(arch, target_root)
            .arg("--add-sources")
            .last(source_line);
        self.tools.run_ok(&inv, None)
    }

    /// Remove a source line by its 1-based index in the file. An absent
    /// line is a no-op.
    pub fn remove_sources(
        &self,
        source_line: &str,
        arch: &Arch,
        target_root: Option<&Path>,
    ) -> Result<()> {
        let path = self.config.sources_list_path(arch, target_root);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let Some(position) = text.lines().position(|line| line == source_line) else {
            debug!(source_line, "not registered, nothing to remove");
            return Ok(());
        };

        let inv = self
            .pkg_on_root(arch, target_root)
            .arg("--remove-sources")
            .arg((position + 1).to_string());
        self.tools.run_ok(&inv, None)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::fixture;
    use super::*;

    #[test]
    fn add_sources_is_idempotent() {
        let fx = fixture();
        let arch = Arch::new("amd64");
        let line = "deb file:/r stable main";

        fx.orch.add_sources(line, &arch, None).unwrap();
        fx.orch.add_sources(line, &arch, None).unwrap();

        // Only the first call reached the tool.
        assert_eq!(fx.tools.calls_matching("--add-sources").len(), 1);
        let text =
            std::fs::read_to_string(fx.orch.config().sources_list_path(&arch, None)).unwrap();
        assert_eq!(text, format!("{line}\n"));
    }

    #[test]
    fn remove_sources_uses_one_based_indexes() {
        let fx = fixture();
        let arch = Arch::new("amd64");
        fx.orch.add_sources("deb file:/a stable main", &arch, None).unwrap();
        fx.orch.add_sources("deb file:/b stable main", &arch, None).unwrap();

        fx.orch
            .remove_sources("deb file:/b stable main", &arch, None)
            .unwrap();

        let calls = fx.tools.calls_matching("--remove-sources");
        assert_eq!(calls.len(), 1);
        let pos = calls[0]
            .iter()
            .position(|a| a == "--remove-sources")
            .unwrap();
        assert_eq!(calls[0][pos + 1], "2");

        // Removing a line that is not there is a no-op.
        fx.orch
            .remove_sources("deb file:/ghost stable main", &arch, None)
            .unwrap();
        assert_eq!(fx.tools.calls_matching("--remove-sources").len(), 1);
    }

    #[test]
    fn create_admindir_renders_the_template() {
        let fx = fixture();
        let arch = Arch::new("amd64");

        fx.orch.create_admindir(&arch, Some("stable"), None).unwrap();

        let calls = fx.tools.calls_matching("--create-admindir");
        assert_eq!(calls.len(), 1);
        let ctrl = std::fs::read_to_string(calls[0].last().unwrap()).unwrap();
        assert!(ctrl.contains("Architecture: amd64"));
        assert!(ctrl.contains("Distribution: stable"));
        assert!(ctrl.contains('<') && ctrl.contains('@'));
        assert!(!ctrl.contains("${"));

        // The empty sources.list is in place.
        let sources = fx.orch.config().sources_list_path(&arch, None);
        assert_eq!(std::fs::read_to_string(sources).unwrap(), "");
    }

    #[test]
    fn add_hooks_passes_every_path() {
        let fx = fixture();
        let hooks = vec![
            fx.dir.path().join("hooks/pre.sh"),
            fx.dir.path().join("hooks/post.sh"),
        ];
        fx.orch.add_hooks(&hooks, &Arch::new("amd64"), None).unwrap();

        let calls = fx.tools.calls_matching("--add-hooks");
        assert!(calls[0].iter().any(|a| a.ends_with("pre.sh")));
        assert!(calls[0].iter().any(|a| a.ends_with("post.sh")));
    }
}
