//! depot-core - orchestration of wpkg package repositories.
//!
//! The crate wraps two external binaries (wpkg and its dependency-graph
//! companion) and manages a local constellation of package repositories
//! and installation target roots on top of them: building, publishing,
//! archival of superseded versions, installs into target roots, and the
//! query surface the wider build system relies on.
//!
//! # Pipeline
//!
//! Mutations flow `ToolRunner` -> `RepositorySynchronizer` ->
//! (`create-index` -> `ArchiveManager` -> `create-index`); queries flow
//! `Resolver` -> `IndexParser` -> caches. Everything is owned by one
//! [`Orchestrator`], and within one orchestrator operations never
//! interleave.
//!
//! # Filesystem layout
//!
//! ```text
//! <debRoot>/<distribution>/<name>_<version>[_<arch>].deb [+ .md5sum]
//! <debRoot>/<indexFilename>
//! <parent(debRoot)>/wpkg@ver/<distribution>/<name>/index.json
//! <parent(debRoot)>/wpkg@ver/<distribution>/<name>/<version>/<file>.deb
//! <targetRoot>/<arch>/var/lib/<admindir>/core/sources.list
//! ```

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod orchestrator;
pub mod resolver;
pub mod runner;
pub mod shortpath;
pub mod sync;
pub mod vercmp;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{
    BuildOptions, InstallOptions, Orchestrator, PublishOptions, Selection, ShowOptions,
    UnpublishOptions,
};
pub use resolver::Lookup;
