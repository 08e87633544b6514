use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One package entry shaped out of the repository index dump.
///
/// Filters (see [`crate::filter`]) operate on this shape; the `file` path
/// is relative to the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub version: String,
    /// `None` when the index reports the `source` pseudo-architecture.
    pub arch: Option<String>,
    /// Distribution directory the artifact lives in; `None` when the index
    /// key carried no directory prefix.
    pub distrib: Option<String>,
    /// The control file's `Distribution` field, verbatim.
    pub ctrl_distribution: Option<String>,
    /// `<distrib>/<name>_<version>[_<arch>].deb`, relative to the repo.
    pub file: String,
}

/// A fully-qualified artifact descriptor, as produced by the resolver and
/// consumed by every mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebRef {
    pub name: String,
    pub version: String,
    pub arch: Option<String>,
    /// Distribution the artifact lives in.
    pub distribution: String,
    /// Absolute path of the `.deb` file.
    pub file: PathBuf,
    /// Root of the repository that owns the artifact.
    pub repository: PathBuf,
    /// md5sum of the artifact, when the sidecar was present.
    pub hash: Option<String>,
    /// The control file's `Distribution` field, when the index knew it.
    pub ctrl_distribution: Option<String>,
}

impl DebRef {
    /// Path of the `.md5sum` sidecar next to the artifact.
    pub fn sidecar_path(&self) -> PathBuf {
        let mut name = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".md5sum");
        self.file.with_file_name(name)
    }
}

impl std::fmt::Display for DebRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.arch {
            Some(arch) => write!(f, "{}_{}_{}", self.name, self.version, arch),
            None => write!(f, "{}_{}", self.name, self.version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_sits_next_to_artifact() {
        let dref = DebRef {
            name: "libx".into(),
            version: "1.0".into(),
            arch: Some("amd64".into()),
            distribution: "stable".into(),
            file: PathBuf::from("/repo/stable/libx_1.0_amd64.deb"),
            repository: PathBuf::from("/repo"),
            hash: None,
            ctrl_distribution: None,
        };
        assert_eq!(
            dref.sidecar_path(),
            PathBuf::from("/repo/stable/libx_1.0_amd64.deb.md5sum")
        );
        assert_eq!(dref.to_string(), "libx_1.0_amd64");
    }
}
