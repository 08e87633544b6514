//! In-process stand-ins for wpkg used by unit tests.
//!
//! `FakeTool` answers the handful of invocations the core issues by
//! operating on the real (temp) filesystem: `--create-index` writes a
//! sorted listing of `.deb` files, `--list-index-packages-json` turns that
//! listing back into the JSON dump shape, `--compare-versions` applies a
//! simple dotted-numeric ordering.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;

use depot_schema::DebArtifact;

use crate::error::Result;
use crate::runner::{Invocation, ToolClient};
use crate::vercmp::VersionOrder;

/// Dotted-numeric comparison, close enough to Debian ordering for the
/// version shapes the tests use.
pub fn fake_version_cmp(a: &str, b: &str) -> Ordering {
    let tokens = |v: &str| -> Vec<String> { v.split(['.', '-']).map(str::to_string).collect() };
    let (ta, tb) = (tokens(a), tokens(b));
    for i in 0..ta.len().max(tb.len()) {
        match (ta.get(i), tb.get(i)) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
    Ordering::Equal
}

pub struct FakeOrder;

impl VersionOrder for FakeOrder {
    fn is_greater(&self, left: &str, right: &str) -> Result<bool> {
        Ok(fake_version_cmp(left, right) == Ordering::Greater)
    }
}

pub struct FakeTool {
    index_filename: String,
    pub calls: Mutex<Vec<Vec<String>>>,
    /// `name_version` -> control `Distribution` field for the dump.
    pub ctrl_distribution: Mutex<BTreeMap<String, String>>,
    pub installed: Mutex<BTreeSet<String>>,
    /// Force an exit code whenever an argument matches the key.
    pub fail_with: Mutex<BTreeMap<String, i32>>,
}

impl FakeTool {
    pub fn new(index_filename: &str) -> Self {
        Self {
            index_filename: index_filename.to_string(),
            calls: Mutex::new(Vec::new()),
            ctrl_distribution: Mutex::new(BTreeMap::new()),
            installed: Mutex::new(BTreeSet::new()),
            fail_with: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn set_ctrl_distribution(&self, name: &str, version: &str, distribution: &str) {
        self.ctrl_distribution
            .lock()
            .unwrap()
            .insert(format!("{name}_{version}"), distribution.to_string());
    }

    /// Refresh `dir`'s index the way the orchestrator would.
    pub fn refresh_index(&self, dir: &Path) -> i32 {
        self.create_index(&[
            "--create-index".to_string(),
            dir.join(&self.index_filename).to_string_lossy().into_owned(),
            "--repository".to_string(),
            dir.to_string_lossy().into_owned(),
        ])
    }

    pub fn calls_matching(&self, flag: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|argv| argv.iter().any(|a| a == flag))
            .cloned()
            .collect()
    }

    fn create_index(&self, argv: &[String]) -> i32 {
        let Some(index_pos) = argv.iter().position(|a| a == "--create-index") else {
            return 2;
        };
        let Some(repo_pos) = argv.iter().position(|a| a == "--repository") else {
            return 2;
        };
        let index_path = Path::new(&argv[index_pos + 1]);
        let dir = Path::new(&argv[repo_pos + 1]);

        let mut listing = Vec::new();
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 1;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if path.is_file() && name.ends_with(".deb") {
                listing.push(name);
            } else if path.is_dir() {
                let Ok(subs) = std::fs::read_dir(&path) else {
                    continue;
                };
                for sub in subs.flatten() {
                    let sub_name = sub.file_name().to_string_lossy().into_owned();
                    if sub.path().is_file() && sub_name.ends_with(".deb") {
                        listing.push(format!("{name}/{sub_name}"));
                    }
                }
            }
        }
        listing.sort();
        if std::fs::write(index_path, listing.join("\n")).is_err() {
            return 1;
        }
        0
    }

    fn dump_index(&self, index_path: &Path, on_line: Option<&mut dyn FnMut(&str)>) -> i32 {
        let Ok(listing) = std::fs::read_to_string(index_path) else {
            return 1;
        };
        let mut root = serde_json::Map::new();
        for rel in listing.lines().filter(|l| !l.is_empty()) {
            let (distrib, file_name) = match rel.rsplit_once('/') {
                Some((d, f)) => (Some(d), f),
                None => (None, rel),
            };
            let Some(deb) = DebArtifact::parse(file_name) else {
                continue;
            };
            let arch = deb
                .arch
                .as_ref()
                .map_or("source".to_string(), |a| a.to_string());
            let ctrl_dist = self
                .ctrl_distribution
                .lock()
                .unwrap()
                .get(&format!("{}_{}", deb.name, deb.version))
                .cloned()
                .or_else(|| distrib.map(String::from))
                .unwrap_or_default();

            let mut fields = serde_json::Map::new();
            fields.insert("Architecture".into(), arch.into());
            fields.insert("Distribution".into(), ctrl_dist.into());
            let key = match distrib {
                Some(d) => format!("{d}/{}.ctrl", rel_stem(file_name)),
                None => format!("{}.ctrl", rel_stem(file_name)),
            };
            root.insert(key, fields.into());
        }
        let json = serde_json::Value::Object(root).to_string();
        if let Some(sink) = on_line {
            sink(&json);
        }
        0
    }

    fn compare_versions(&self, argv: &[String]) -> i32 {
        let Some(pos) = argv.iter().position(|a| a == "--compare-versions") else {
            return 2;
        };
        let (left, op, right) = (&argv[pos + 1], &argv[pos + 2], &argv[pos + 3]);
        assert_eq!(op, ">", "only strict greater-than is wrapped");
        if fake_version_cmp(left, right) == Ordering::Greater {
            0
        } else {
            1
        }
    }

    fn sources_list_path(argv: &[String]) -> Option<std::path::PathBuf> {
        let pos = argv.iter().position(|a| a == "--root")?;
        Some(Path::new(&argv[pos + 1]).join("var/lib/wpkg/core/sources.list"))
    }

    fn add_sources(&self, argv: &[String]) -> i32 {
        let Some(path) = Self::sources_list_path(argv) else {
            return 2;
        };
        let Some(line) = argv.last() else { return 2 };
        let mut text = std::fs::read_to_string(&path).unwrap_or_default();
        text.push_str(line);
        text.push('\n');
        if path.parent().is_some_and(|p| std::fs::create_dir_all(p).is_ok())
            && std::fs::write(&path, text).is_ok()
        {
            0
        } else {
            1
        }
    }

    fn remove_sources(&self, argv: &[String]) -> i32 {
        let Some(path) = Self::sources_list_path(argv) else {
            return 2;
        };
        let Some(pos) = argv.iter().position(|a| a == "--remove-sources") else {
            return 2;
        };
        let Ok(index) = argv[pos + 1].parse::<usize>() else {
            return 2;
        };
        let Ok(text) = std::fs::read_to_string(&path) else {
            return 1;
        };
        let kept: Vec<&str> = text
            .lines()
            .enumerate()
            .filter(|(i, _)| i + 1 != index)
            .map(|(_, l)| l)
            .collect();
        let mut out = kept.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        if std::fs::write(&path, out).is_ok() {
            0
        } else {
            1
        }
    }

    fn field(&self, argv: &[String], on_line: Option<&mut dyn FnMut(&str)>) -> i32 {
        let Some(pos) = argv.iter().position(|a| a == "--field") else {
            return 2;
        };
        let name = argv[pos + 1].clone();
        if let Some(sink) = on_line {
            sink(&format!("Package: {name}"));
            sink("Depends: liba,");
            sink(" libb");
        }
        0
    }

    fn show(&self, argv: &[String], on_line: Option<&mut dyn FnMut(&str)>) -> i32 {
        let Some(pos) = argv.iter().position(|a| a == "--showformat") else {
            return 2;
        };
        let template = &argv[pos + 1];
        let stem = argv
            .last()
            .map(|f| rel_stem(f.rsplit('/').next().unwrap_or(f)))
            .unwrap_or_default();
        let re = regex::Regex::new(r"\$\{[^}]+\}").unwrap();
        let rendered = re.replace_all(template, stem.as_str());
        if let Some(sink) = on_line {
            sink(&rendered);
        }
        0
    }
}

fn rel_stem(file_name: &str) -> String {
    file_name
        .strip_suffix(".deb")
        .unwrap_or(file_name)
        .to_string()
}

impl ToolClient for FakeTool {
    fn run(&self, inv: &Invocation, on_line: Option<&mut dyn FnMut(&str)>) -> Result<i32> {
        let mut argv: Vec<String> = inv
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        if let Some(last) = &inv.last {
            argv.push(last.to_string_lossy().into_owned());
        }
        self.calls.lock().unwrap().push(argv.clone());

        for (needle, code) in self.fail_with.lock().unwrap().iter() {
            if argv.iter().any(|a| a.contains(needle.as_str())) {
                return Ok(*code);
            }
        }

        let has = |flag: &str| argv.iter().any(|a| a == flag);
        let code = if has("--create-index") {
            self.create_index(&argv)
        } else if has("--list-index-packages-json") {
            let index_path = argv.last().cloned().unwrap_or_default();
            self.dump_index(Path::new(&index_path), on_line)
        } else if has("--compare-versions") {
            self.compare_versions(&argv)
        } else if has("--showformat") {
            self.show(&argv, on_line)
        } else if has("--add-sources") {
            self.add_sources(&argv)
        } else if has("--remove-sources") {
            self.remove_sources(&argv)
        } else if has("--field") {
            self.field(&argv, on_line)
        } else if has("--is-installed") {
            let name = argv.last().cloned().unwrap_or_default();
            if self.installed.lock().unwrap().contains(&name) {
                0
            } else {
                1
            }
        } else if has("--install") {
            if let Some(target) = argv.last() {
                self.installed.lock().unwrap().insert(target.clone());
            }
            0
        } else if has("--remove") {
            if let Some(target) = argv.last() {
                self.installed.lock().unwrap().remove(target);
            }
            0
        } else {
            0
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_ordering_behaves() {
        assert_eq!(fake_version_cmp("1.0-2", "1.0-1"), Ordering::Greater);
        assert_eq!(fake_version_cmp("0.9", "1.0-1"), Ordering::Less);
        assert_eq!(fake_version_cmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(fake_version_cmp("1.0-rc1", "1.0-rc2"), Ordering::Less);
    }
}
