//! Read-only queries: metadata, listings, locations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use tracing::debug;

use depot_schema::Arch;

use crate::error::Result;
use crate::runner::{run_capture, run_lines, Invocation};

use super::{Orchestrator, ShowOptions};

/// Control fields rendered by `show`, next to the dynamic
/// `X-Craft-Packages-<distribution>` one.
const SHOW_FIELDS: [&str; 10] = [
    "Architecture",
    "Build-Depends",
    "Date",
    "Depends",
    "Distribution",
    "Package",
    "Version",
    "X-Craft-Build-Depends",
    "X-Craft-Make-Depends",
    "X-Craft-Sub-Packages",
];

/// JSON showformat template over the fixed field set. The distribution
/// is spliced into the dynamic field name exactly as supplied.
fn show_template(distribution: &str) -> String {
    let mut fields: Vec<String> = SHOW_FIELDS.iter().map(|f| (*f).to_string()).collect();
    fields.push(format!("X-Craft-Packages-{distribution}"));
    let body = fields
        .iter()
        .map(|field| format!("\"{field}\":\"${{{field}}}\""))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{body}}}")
}

impl Orchestrator {
    /// Package metadata as JSON, served from the md5-keyed cache when the
    /// artifact's hash is known.
    pub fn show(&self, name: &str, arch: &Arch, opts: &ShowOptions) -> Result<serde_json::Value> {
        let dref = self.resolve_maybe_archived(
            name,
            opts.version.as_deref(),
            arch,
            opts.distribution.as_deref(),
        )?;

        if let Some(hash) = &dref.hash {
            if let Some(hit) = self
                .show_cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(hash)
            {
                debug!(%dref, "show served from cache");
                return Ok(hit);
            }
        }

        // The dynamic field name carries the caller's distribution
        // string exactly as supplied, unnormalized.
        let distribution = opts
            .distribution
            .as_deref()
            .unwrap_or(&self.config.distribution);
        let inv = Invocation::pkg()
            .arg("--show")
            .arg("--showformat")
            .arg(show_template(distribution))
            .last(&dref.file);
        let out = run_capture(self.tools.as_ref(), &inv)?;
        let value: serde_json::Value = serde_json::from_str(out.trim())?;

        if let Some(hash) = &dref.hash {
            self.show_cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(hash, value.clone());
        }
        Ok(value)
    }

    /// Control fields of an installed package, keyed by field name.
    /// Continuation lines are folded into the preceding field.
    pub fn fields(
        &self,
        name: &str,
        fields: &[String],
        arch: &Arch,
        target_root: Option<&Path>,
    ) -> Result<BTreeMap<String, String>> {
        let inv = self
            .pkg_on_root(arch, target_root)
            .arg("--field")
            .arg(name)
            .args(fields);
        let lines = run_lines(self.tools.as_ref(), &inv)?;

        let mut map = BTreeMap::new();
        let mut last_key: Option<String> = None;
        for line in lines {
            if line.starts_with([' ', '\t']) {
                if let Some(key) = &last_key {
                    let entry: &mut String = map.entry(key.clone()).or_default();
                    entry.push('\n');
                    entry.push_str(line.trim_start());
                    continue;
                }
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_string();
                map.insert(key.clone(), value.trim().to_string());
                last_key = Some(key);
            }
        }
        Ok(map)
    }

    /// Installed packages, optionally filtered by a wpkg list pattern.
    pub fn list(
        &self,
        pattern: Option<&str>,
        arch: &Arch,
        target_root: Option<&Path>,
    ) -> Result<Vec<String>> {
        let mut inv = self.pkg_on_root(arch, target_root).arg("--list");
        if let Some(pattern) = pattern {
            inv = inv.last(pattern);
        }
        run_lines(self.tools.as_ref(), &inv)
    }

    pub fn search(
        &self,
        pattern: &str,
        arch: &Arch,
        target_root: Option<&Path>,
    ) -> Result<Vec<String>> {
        let inv = self.pkg_on_root(arch, target_root).arg("--search").last(pattern);
        run_lines(self.tools.as_ref(), &inv)
    }

    pub fn list_files(
        &self,
        name: &str,
        arch: &Arch,
        target_root: Option<&Path>,
    ) -> Result<Vec<String>> {
        let inv = self
            .pkg_on_root(arch, target_root)
            .arg("--listfiles")
            .last(name);
        run_lines(self.tools.as_ref(), &inv)
    }

    /// Absolute path of the artifact a lookup resolves to, archived when
    /// a version is pinned.
    pub fn get_deb_location(
        &self,
        name: &str,
        arch: &Arch,
        opts: &ShowOptions,
    ) -> Result<PathBuf> {
        let dref = self.resolve_maybe_archived(
            name,
            opts.version.as_deref(),
            arch,
            opts.distribution.as_deref(),
        )?;
        Ok(dref.file)
    }

    /// Whether the target root for `arch` has been set up (its admindir
    /// exists).
    pub fn target_exists(&self, arch: &Arch, target_root: Option<&Path>) -> bool {
        self.config.admin_dir_path(arch, target_root).is_dir()
    }
}
