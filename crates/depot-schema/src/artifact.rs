use std::sync::LazyLock;

use regex::Regex;

use crate::arch::Arch;
use crate::STUB_SUFFIX;

/// `<name>_<version>[_<arch>].deb`, as found on disk in a distribution
/// directory. Spaces and underscores are forbidden inside every field,
/// which is what makes the grammar unambiguous.
static DEB_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^ _]+)_([^ _]+)(?:_([^ _]+))?\.deb$").expect("deb filename grammar")
});

/// A `.deb` artifact parsed from its on-disk filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebArtifact {
    pub name: String,
    pub version: String,
    /// Absent for source packages.
    pub arch: Option<Arch>,
    /// The filename this was parsed from.
    pub file: String,
}

impl DebArtifact {
    /// Parse a bare filename (no directory components).
    ///
    /// Returns `None` for anything that is not shaped like a package
    /// artifact, including `.md5sum` sidecars and index files.
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = DEB_FILE_RE.captures(file_name)?;
        Some(Self {
            name: caps[1].to_string(),
            version: caps[2].to_string(),
            arch: caps.get(3).map(|m| Arch::new(m.as_str())),
            file: file_name.to_string(),
        })
    }

    /// Compose the canonical filename for the given fields.
    pub fn file_name(name: &str, version: &str, arch: Option<&Arch>) -> String {
        match arch {
            Some(arch) => format!("{name}_{version}_{arch}.deb"),
            None => format!("{name}_{version}.deb"),
        }
    }

    /// Stub packages are build-time scaffolding and never archived.
    pub fn is_stub(&self) -> bool {
        self.name.ends_with(STUB_SUFFIX)
    }

    /// The `.md5sum` sidecar filename for this artifact.
    pub fn sidecar_name(&self) -> String {
        format!("{}.md5sum", self.file)
    }
}

/// The version with any trailing `-<suffix>` removed.
///
/// `1.0-2` -> `1.0`, `1.0-rc1-3` -> `1.0-rc1`, `0.9` -> `0.9`.
pub fn base_version(version: &str) -> &str {
    match version.rfind('-') {
        Some(idx) => &version[..idx],
        None => version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_artifact() {
        let deb = DebArtifact::parse("libx_1.0-2_amd64.deb").unwrap();
        assert_eq!(deb.name, "libx");
        assert_eq!(deb.version, "1.0-2");
        assert_eq!(deb.arch, Some(Arch::new("amd64")));
        assert_eq!(deb.file, "libx_1.0-2_amd64.deb");
    }

    #[test]
    fn parses_source_artifact_without_arch() {
        let deb = DebArtifact::parse("libx-src_1.0.deb").unwrap();
        assert_eq!(deb.name, "libx-src");
        assert_eq!(deb.version, "1.0");
        assert_eq!(deb.arch, None);
    }

    #[test]
    fn rejects_non_artifacts() {
        assert!(DebArtifact::parse("libx_1.0_amd64.deb.md5sum").is_none());
        assert!(DebArtifact::parse("index.tar.gz").is_none());
        assert!(DebArtifact::parse("no-version.deb").is_none());
        assert!(DebArtifact::parse("bad name_1.0.deb").is_none());
    }

    #[test]
    fn stub_detection() {
        assert!(DebArtifact::parse("libx-stub_1.0_all.deb").unwrap().is_stub());
        assert!(!DebArtifact::parse("libx_1.0_all.deb").unwrap().is_stub());
    }

    #[test]
    fn round_trips_file_name() {
        let deb = DebArtifact::parse("pkg_2.3-1_arm64.deb").unwrap();
        assert_eq!(
            DebArtifact::file_name(&deb.name, &deb.version, deb.arch.as_ref()),
            deb.file
        );
    }

    #[test]
    fn base_version_strips_last_dash_suffix() {
        assert_eq!(base_version("1.0-2"), "1.0");
        assert_eq!(base_version("0.9"), "0.9");
        assert_eq!(base_version("1.0-rc1-3"), "1.0-rc1");
    }
}
