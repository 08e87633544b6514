//! Debian version ordering, delegated to the external comparator.
//!
//! We never reimplement version arithmetic: wpkg's `--compare-versions`
//! is the single source of truth. The trait seam exists so the archiver
//! and resolver can be exercised without a child process per comparison.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::runner::{Invocation, ToolClient};

/// Strict `>` between two Debian version strings.
pub trait VersionOrder: Send + Sync {
    fn is_greater(&self, left: &str, right: &str) -> Result<bool>;

    /// The greatest of `versions` under `is_greater`, scanning linearly.
    fn latest<'a>(&self, versions: &'a [String]) -> Result<Option<&'a str>> {
        let mut best: Option<&str> = None;
        for candidate in versions {
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    if self.is_greater(candidate, current)? {
                        Some(candidate)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        Ok(best)
    }
}

/// Production comparator: `wpkg --compare-versions v1 '>' v2`.
/// Exit 0 means greater, exit 1 means not greater.
pub struct WpkgVersionOrder {
    tools: Arc<dyn ToolClient>,
}

impl WpkgVersionOrder {
    pub fn new(tools: Arc<dyn ToolClient>) -> Self {
        Self { tools }
    }
}

impl VersionOrder for WpkgVersionOrder {
    fn is_greater(&self, left: &str, right: &str) -> Result<bool> {
        let inv = Invocation::pkg().args(["--compare-versions", left, ">", right]);
        match self.tools.run(&inv, None)? {
            0 => Ok(true),
            1 => Ok(false),
            code => Err(Error::ToolFailed {
                tool: "wpkg".to_string(),
                code,
            }),
        }
    }
}
