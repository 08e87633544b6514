//! Repository-index parsing.
//!
//! wpkg owns the index file format; we only ever consume its JSON dump
//! (`--list-index-packages-json`) and cache the parsed snapshot keyed by
//! the SHA-256 of the index file bytes, so a rewritten index can never be
//! served from a stale parse.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use depot_schema::{Filter, IndexEntry};

use crate::cache::{BoundedCache, INDEX_CACHE_CAP};
use crate::error::Result;
use crate::runner::{run_capture, Invocation, ToolClient};
use crate::vercmp::VersionOrder;

/// `<name>_<version>[_<arch>]` stem of an index key.
static CTRL_STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^ _]+)_([^ _]+)(?:_([^ _]+))?$").expect("ctrl stem grammar"));

/// On Windows the JSON dump is known to contain single backslashes that
/// break parsing; double every isolated one, leaving `\\` pairs alone.
pub(crate) fn repair_backslashes(text: &str) -> Cow<'_, str> {
    static LONE_BACKSLASH: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(^|[^\\])\\([^\\]|$)").expect("backslash repair"));
    LONE_BACKSLASH.replace_all(text, "${1}\\\\${2}")
}

fn entry_from_key(key: &str, value: &serde_json::Value) -> Option<IndexEntry> {
    let normalized = key.replace('\\', "/");
    let (distrib, file_name) = match normalized.rsplit_once('/') {
        Some((distrib, file_name)) => (Some(distrib), file_name),
        None => (None, normalized.as_str()),
    };

    let stem = file_name.strip_suffix(".ctrl")?;
    let caps = CTRL_STEM_RE.captures(stem)?;

    let arch_field = value.get("Architecture").and_then(serde_json::Value::as_str);
    let is_source = matches!(arch_field, Some("source" | "src"));
    let arch = if is_source {
        None
    } else {
        caps.get(3).map(|m| m.as_str().to_string())
    };

    let file = match distrib {
        Some(distrib) => format!("{distrib}/{stem}.deb"),
        None => format!("{stem}.deb"),
    };

    Some(IndexEntry {
        name: caps[1].to_string(),
        version: caps[2].to_string(),
        arch,
        distrib: distrib.map(String::from),
        ctrl_distribution: value
            .get("Distribution")
            .and_then(serde_json::Value::as_str)
            .map(String::from),
        file,
    })
}

/// Shape the raw JSON dump into index entries. Keys that do not look like
/// control-file paths are skipped with a warning.
pub(crate) fn parse_index_dump(json: &str) -> Result<Vec<IndexEntry>> {
    let root: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
    let mut entries = Vec::with_capacity(root.len());
    for (key, value) in &root {
        match entry_from_key(key, value) {
            Some(entry) => entries.push(entry),
            None => warn!(key = %key, "unrecognized index entry"),
        }
    }
    Ok(entries)
}

/// Create or refresh the index of `dir`.
pub fn create_index(tools: &dyn ToolClient, index_filename: &str, dir: &Path) -> Result<()> {
    let inv = Invocation::pkg()
        .arg("--create-index")
        .arg(dir.join(index_filename))
        .arg("--repository")
        .arg(dir)
        .args(["--recursive", "--depth", "1"]);
    tools.run_ok(&inv, None)
}

/// Filter-matching packages of one repository, grouped by name.
#[derive(Debug, Clone)]
pub struct RepoPackages {
    pub repo: PathBuf,
    pub packages: BTreeMap<String, Vec<IndexEntry>>,
}

impl RepoPackages {
    /// The single entry for `name` when the listing was collapsed to
    /// greatest versions.
    pub fn best(&self, name: &str) -> Option<&IndexEntry> {
        self.packages.get(name).and_then(|entries| entries.first())
    }
}

pub struct IndexParser {
    tools: Arc<dyn ToolClient>,
    index_filename: String,
    cache: Mutex<BoundedCache<Arc<Vec<IndexEntry>>>>,
}

impl IndexParser {
    pub fn new(tools: Arc<dyn ToolClient>, index_filename: impl Into<String>) -> Self {
        Self {
            tools,
            index_filename: index_filename.into(),
            cache: Mutex::new(BoundedCache::new(INDEX_CACHE_CAP)),
        }
    }

    /// List packages across `repos`, applying `filter`. With `greatest`,
    /// each name collapses to its maximum version under `order`.
    ///
    /// Repositories without an index file are silently omitted.
    pub fn list_packages(
        &self,
        repos: &[PathBuf],
        filter: &Filter,
        greatest: bool,
        order: &dyn VersionOrder,
    ) -> Result<Vec<RepoPackages>> {
        let mut result = Vec::new();
        for repo in repos {
            let Some(entries) = self.load_repo(repo)? else {
                continue;
            };

            let mut packages: BTreeMap<String, Vec<IndexEntry>> = BTreeMap::new();
            for entry in entries.iter().filter(|entry| filter.matches(entry)) {
                packages
                    .entry(entry.name.clone())
                    .or_default()
                    .push(entry.clone());
            }

            if greatest {
                for group in packages.values_mut() {
                    let mut best = 0;
                    for i in 1..group.len() {
                        if order.is_greater(&group[i].version, &group[best].version)? {
                            best = i;
                        }
                    }
                    let winner = group.swap_remove(best);
                    group.clear();
                    group.push(winner);
                }
            }

            result.push(RepoPackages {
                repo: repo.clone(),
                packages,
            });
        }
        Ok(result)
    }

    /// Parse one repository's index, going through the content-hash cache.
    fn load_repo(&self, repo: &Path) -> Result<Option<Arc<Vec<IndexEntry>>>> {
        let index_path = repo.join(&self.index_filename);
        if !index_path.is_file() {
            debug!(repo = %repo.display(), "no index file, skipping repository");
            return Ok(None);
        }

        let bytes = std::fs::read(&index_path)?;
        let key = format!("{:x}", Sha256::digest(&bytes));

        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Some(hit));
        }

        let inv = Invocation::pkg()
            .arg("--list-index-packages-json")
            .last(&index_path);
        let dump = run_capture(self.tools.as_ref(), &inv)?;
        let repaired = repair_backslashes(&dump);
        let entries = Arc::new(parse_index_dump(&repaired)?);

        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(&key, entries.clone());
        Ok(Some(entries))
    }
}
