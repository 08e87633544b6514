//! Short aliases for long temp directories.
//!
//! wpkg mishandles deeply nested `--tmpdir` paths on some platforms, so
//! when the configured temp dir is long we hand the tool a short symlink
//! under the system temp dir instead. The alias is keyed by a hash of the
//! real path and reused across runs.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

/// Paths at or below this length are passed through untouched.
const LONG_PATH_THRESHOLD: usize = 48;

/// Return a short stand-in for `tmp_dir`, or `tmp_dir` itself when it is
/// already short enough or an alias cannot be set up.
pub fn short_alias(tmp_dir: &Path) -> PathBuf {
    if tmp_dir.as_os_str().len() <= LONG_PATH_THRESHOLD {
        return tmp_dir.to_path_buf();
    }

    let mut hasher = Sha256::new();
    hasher.update(tmp_dir.as_os_str().as_encoded_bytes());
    let digest = hasher.finalize();
    let tag: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
    let alias = std::env::temp_dir().join(format!("dp{tag}"));

    match std::fs::read_link(&alias) {
        Ok(target) if target == tmp_dir => return alias,
        Ok(_) => {
            // Stale alias from a previous configuration.
            let _ = std::fs::remove_file(&alias);
        }
        Err(_) => {}
    }

    #[cfg(unix)]
    {
        if let Err(err) = std::os::unix::fs::symlink(tmp_dir, &alias) {
            debug!(?alias, %err, "could not create tmpdir alias");
            return tmp_dir.to_path_buf();
        }
        alias
    }
    #[cfg(not(unix))]
    {
        let _ = alias;
        tmp_dir.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_paths_pass_through() {
        let path = Path::new("/tmp/depot");
        assert_eq!(short_alias(path), path);
    }

    #[cfg(unix)]
    #[test]
    fn long_paths_get_a_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let long = dir
            .path()
            .join("a-rather-deeply/nested/and/quite/long/temp/directory/tree");
        std::fs::create_dir_all(&long).unwrap();

        let alias = short_alias(&long);
        assert_ne!(alias, long);
        assert!(alias.as_os_str().len() < long.as_os_str().len());
        assert_eq!(std::fs::read_link(&alias).unwrap(), long);

        // Stable across calls.
        assert_eq!(short_alias(&long), alias);
        std::fs::remove_file(alias).unwrap();
    }
}
