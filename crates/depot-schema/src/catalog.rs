//! The per-package archive catalog (`index.json`).
//!
//! Lives at `<archive>/<distribution>/<name>/index.json` and maps every
//! *base version* (version with the trailing `-suffix` stripped) to the
//! full versions archived under it, plus a global `latest` pointer.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// All archived versions sharing one base version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseVersions {
    /// Greatest full version under this base.
    pub latest: String,
    pub versions: Vec<String>,
}

/// The whole catalog: one key per base version plus the literal `latest`
/// key naming the greatest base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveCatalog {
    #[serde(flatten)]
    pub bases: BTreeMap<String, BaseVersions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
}

impl ArchiveCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist with 2-space indentation and a trailing newline.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        fs::write(path, out)?;
        Ok(())
    }

    /// Every full version across all bases, in catalog order.
    pub fn all_versions(&self) -> Vec<String> {
        self.bases
            .values()
            .flat_map(|base| base.versions.iter().cloned())
            .collect()
    }

    /// The full version the top-level `latest` base points at.
    pub fn latest_version(&self) -> Option<&str> {
        let base = self.latest.as_deref()?;
        self.bases.get(base).map(|b| b.latest.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut catalog = ArchiveCatalog::default();
        catalog.bases.insert(
            "1.0".into(),
            BaseVersions {
                latest: "1.0-2".into(),
                versions: vec!["1.0-1".into(), "1.0-2".into()],
            },
        );
        catalog.bases.insert(
            "0.9".into(),
            BaseVersions {
                latest: "0.9".into(),
                versions: vec!["0.9".into()],
            },
        );
        catalog.latest = Some("1.0".into());

        let json = serde_json::to_string(&catalog).unwrap();
        let back: ArchiveCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, catalog);
        assert_eq!(back.latest_version(), Some("1.0-2"));
    }

    #[test]
    fn latest_sits_beside_base_keys() {
        let mut catalog = ArchiveCatalog::default();
        catalog.bases.insert(
            "0.9".into(),
            BaseVersions {
                latest: "0.9".into(),
                versions: vec!["0.9".into()],
            },
        );
        catalog.latest = Some("0.9".into());

        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&catalog).unwrap()).unwrap();
        assert_eq!(value["latest"], "0.9");
        assert_eq!(value["0.9"]["latest"], "0.9");
        assert_eq!(value["0.9"]["versions"][0], "0.9");
    }

    #[test]
    fn save_uses_two_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut catalog = ArchiveCatalog::default();
        catalog.bases.insert(
            "1.0".into(),
            BaseVersions {
                latest: "1.0-1".into(),
                versions: vec!["1.0-1".into()],
            },
        );
        catalog.latest = Some("1.0".into());
        catalog.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"1.0\": {"));
        assert!(text.ends_with('\n'));

        let back = ArchiveCatalog::load(&path).unwrap();
        assert_eq!(back, catalog);
    }

    #[test]
    fn all_versions_flattens_bases() {
        let mut catalog = ArchiveCatalog::default();
        catalog.bases.insert(
            "1.0".into(),
            BaseVersions {
                latest: "1.0-2".into(),
                versions: vec!["1.0-1".into(), "1.0-2".into()],
            },
        );
        catalog.bases.insert(
            "0.9".into(),
            BaseVersions {
                latest: "0.9".into(),
                versions: vec!["0.9".into()],
            },
        );
        assert_eq!(catalog.all_versions(), vec!["0.9", "1.0-1", "1.0-2"]);
    }
}
