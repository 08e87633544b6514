use serde::{Deserialize, Serialize};

/// A Debian-style architecture name (`amd64`, `arm64`, `all`, `source`, ...).
///
/// The set is open-ended, so this is a thin newtype over the string rather
/// than a closed enum. `all` matches every binary architecture; `source`
/// marks source packages, which carry no architecture in their filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arch(String);

impl Arch {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The architecture of the machine we are running on, using Debian
    /// naming (`amd64`, not `x86_64`).
    pub fn native() -> Self {
        let name = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "i386",
            "aarch64" => "arm64",
            "arm" => "armhf",
            "powerpc64" => "ppc64el",
            other => other,
        };
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `all` artifacts install on any binary architecture.
    pub fn is_wildcard(&self) -> bool {
        self.0 == "all"
    }

    /// `source` is the pseudo-architecture reported for source packages.
    pub fn is_source(&self) -> bool {
        self.0 == "source" || self.0 == "src"
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Arch {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Arch {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Arch {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for Arch {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl Default for Arch {
    fn default() -> Self {
        Self::native()
    }
}
