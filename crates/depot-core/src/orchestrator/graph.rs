//! Dependency-graph rendering through deb-graph.

use tracing::debug;

use depot_schema::Arch;

use crate::error::{Error, Result};
use crate::resolver::Lookup;
use crate::runner::Invocation;

use super::Orchestrator;

impl Orchestrator {
    /// Resolve each name to its artifact (trying the given distribution,
    /// then the default) and hand the path list to deb-graph. Without
    /// Graphviz `dot` on `PATH`, `--skip-svg` is prepended.
    ///
    /// Names that do not resolve are dropped with a debug note; when none
    /// resolves at all this is an error rather than an empty invocation.
    pub fn graph(&self, names: &[String], arch: &Arch, distribution: Option<&str>) -> Result<()> {
        let attempts: Vec<Option<&str>> = match distribution {
            Some(dist) => vec![Some(dist), None],
            None => vec![None],
        };

        let mut debs = Vec::new();
        for name in names {
            let mut resolved = None;
            for dist in &attempts {
                match self
                    .resolver
                    .look_for_package(&Lookup::new(name).arch(arch).distribution(*dist))
                {
                    Ok(dref) => {
                        resolved = Some(dref);
                        break;
                    }
                    Err(Error::NotFound(_)) => continue,
                    Err(err) => return Err(err),
                }
            }
            match resolved {
                Some(dref) => debs.push(dref.file),
                None => debug!(name = %name, "not resolvable, dropped from graph"),
            }
        }

        if debs.is_empty() {
            return Err(Error::NotFound(format!(
                "no graphable packages among {names:?}"
            )));
        }

        let mut inv = Invocation::graph();
        if which::which("dot").is_err() {
            inv = inv.arg("--skip-svg");
        }
        inv = inv
            .arg("--verbose")
            .arg("--root")
            .arg(self.config.arch_root(arch, None))
            .args(debs);
        self.tools.run_ok(&inv, None)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::fixture;
    use super::*;

    #[test]
    fn graph_collects_resolved_artifacts() {
        let fx = fixture();
        fx.seed_repo("stable/liba_1.0_amd64.deb", "a");
        fx.seed_repo("stable/libb_2.0_amd64.deb", "b");

        fx.orch
            .graph(
                &["liba".into(), "ghost".into(), "libb".into()],
                &Arch::new("amd64"),
                Some("stable"),
            )
            .unwrap();

        let calls = fx.tools.calls_matching("--verbose");
        assert_eq!(calls.len(), 1);
        let argv = &calls[0];
        assert!(argv.iter().any(|a| a.ends_with("liba_1.0_amd64.deb")));
        assert!(argv.iter().any(|a| a.ends_with("libb_2.0_amd64.deb")));
        assert!(!argv.iter().any(|a| a.contains("ghost")));

        // --skip-svg is present exactly when Graphviz is absent.
        let expect_skip = which::which("dot").is_err();
        assert_eq!(argv.iter().any(|a| a == "--skip-svg"), expect_skip);
        if expect_skip {
            assert_eq!(argv[0], "--skip-svg");
        }
    }

    #[test]
    fn graph_of_nothing_is_an_error() {
        let fx = fixture();
        let err = fx
            .orch
            .graph(&["ghost".into()], &Arch::new("amd64"), None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(fx.tools.calls_matching("--verbose").is_empty());
    }
}
