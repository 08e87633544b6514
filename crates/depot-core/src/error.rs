use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy exposed at the orchestrator boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Name/version not present in any probed repository. Recoverable at
    /// the caller; `is_published` maps this to `false`.
    #[error("package not found: {0}")]
    NotFound(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(PathBuf),

    #[error("nothing to build under {0}")]
    NothingToBuild(PathBuf),

    /// Non-zero exit from wpkg or deb-graph.
    #[error("{tool} exited with status {code}")]
    ToolFailed { tool: String, code: i32 },

    /// The archiver detected inconsistent repository state.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Malformed JSON from the index dump or a show template.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn not_found(
        name: &str,
        version: Option<&str>,
        distribution: &str,
    ) -> Self {
        match version {
            Some(version) => Self::NotFound(format!("{name}_{version} in {distribution}")),
            None => Self::NotFound(format!("{name} in {distribution}")),
        }
    }

    /// ENOENT is benign in several places (empty repos, missing sidecars).
    pub fn is_enoent(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

impl From<depot_schema::catalog::CatalogError> for Error {
    fn from(err: depot_schema::catalog::CatalogError) -> Self {
        match err {
            depot_schema::catalog::CatalogError::Io(e) => Self::Io(e),
            depot_schema::catalog::CatalogError::Json(e) => Self::Parse(e),
        }
    }
}
