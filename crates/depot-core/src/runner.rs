//! Child-process plumbing for wpkg and deb-graph.
//!
//! [`ToolRunner`] is the only place that spawns processes. Everything
//! above it talks through the [`ToolClient`] trait so tests can substitute
//! an in-process fake.

use std::ffi::OsString;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::shortpath;

/// Which of the two wrapped binaries to spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// The package tool proper (wpkg).
    Pkg,
    /// The dependency-graph companion (deb-graph).
    Graph,
}

impl ToolKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pkg => "wpkg",
            Self::Graph => "deb-graph",
        }
    }
}

/// One tool invocation: argument vector, optional trailing argument
/// (always appended last), environment overlay and working directory.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub tool: ToolKind,
    pub args: Vec<OsString>,
    pub last: Option<OsString>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn pkg() -> Self {
        Self::new(ToolKind::Pkg)
    }

    pub fn graph() -> Self {
        Self::new(ToolKind::Graph)
    }

    fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            args: Vec::new(),
            last: None,
            env: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn last(mut self, last: impl Into<OsString>) -> Self {
        self.last = Some(last.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Seam between the orchestration logic and the external binaries.
pub trait ToolClient: Send + Sync {
    /// Spawn the tool, streaming stdout lines into `on_line` when given.
    /// Returns the exit code; only a spawn failure is an `Err`.
    fn run(&self, inv: &Invocation, on_line: Option<&mut dyn FnMut(&str)>) -> Result<i32>;

    /// Like [`run`](Self::run), but a non-zero exit becomes
    /// [`Error::ToolFailed`].
    fn run_ok(&self, inv: &Invocation, on_line: Option<&mut dyn FnMut(&str)>) -> Result<()> {
        match self.run(inv, on_line)? {
            0 => Ok(()),
            code => Err(Error::ToolFailed {
                tool: inv.tool.label().to_string(),
                code,
            }),
        }
    }
}

/// Run an invocation and collect its stdout into one string. Non-zero
/// exit is an error.
pub fn run_capture(tools: &dyn ToolClient, inv: &Invocation) -> Result<String> {
    let mut out = String::new();
    tools.run_ok(
        inv,
        Some(&mut |line: &str| {
            out.push_str(line);
            out.push('\n');
        }),
    )?;
    Ok(out)
}

/// Run an invocation and collect stdout as lines. Non-zero exit is an
/// error.
pub fn run_lines(tools: &dyn ToolClient, inv: &Invocation) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    tools.run_ok(inv, Some(&mut |line: &str| lines.push(line.to_string())))?;
    Ok(lines)
}

/// Spawns the configured binaries. A `--tmpdir` pair pointing at the
/// short temp alias is prepended to every wpkg invocation.
pub struct ToolRunner {
    pkgtool: PathBuf,
    pkggraph: PathBuf,
    short_tmp: PathBuf,
}

impl ToolRunner {
    pub fn new(config: &Config) -> Self {
        // Best effort: wpkg creates it on demand too.
        let _ = std::fs::create_dir_all(&config.tmp_dir);
        Self {
            pkgtool: config.tools.pkgtool.clone(),
            pkggraph: config.tools.pkggraph.clone(),
            short_tmp: shortpath::short_alias(&config.tmp_dir),
        }
    }
}

impl ToolClient for ToolRunner {
    fn run(&self, inv: &Invocation, on_line: Option<&mut dyn FnMut(&str)>) -> Result<i32> {
        let program = match inv.tool {
            ToolKind::Pkg => &self.pkgtool,
            ToolKind::Graph => &self.pkggraph,
        };

        let mut cmd = Command::new(program);
        if inv.tool == ToolKind::Pkg {
            cmd.arg("--tmpdir").arg(&self.short_tmp);
        }
        cmd.args(&inv.args);
        if let Some(last) = &inv.last {
            cmd.arg(last);
        }
        for (key, value) in &inv.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &inv.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(tool = inv.tool.label(), args = ?inv.args, last = ?inv.last, "spawning");
        let mut child = cmd.spawn()?;

        let stderr_thread = child.stderr.take().map(|stderr| {
            let label = inv.tool.label();
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(std::result::Result::ok) {
                    warn!(tool = label, "{line}");
                }
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut sink = on_line;
            for line in BufReader::new(stdout).lines() {
                let line = line?;
                if let Some(sink) = sink.as_deref_mut() {
                    sink(&line);
                } else {
                    debug!(tool = inv.tool.label(), "{line}");
                }
            }
        }

        let status = child.wait()?;
        if let Some(handle) = stderr_thread {
            let _ = handle.join();
        }

        let code = status.code().unwrap_or(-1);
        debug!(tool = inv.tool.label(), code, "exited");
        Ok(code)
    }
}
