//! depot - repository orchestration on top of wpkg.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use depot_core::{
    BuildOptions, Config, InstallOptions, Orchestrator, PublishOptions, Selection, ShowOptions,
    UnpublishOptions,
};
use depot_schema::Arch;

#[derive(Debug, Parser)]
#[command(name = "depot")]
#[command(author, version, about = "Package-repository orchestration for wpkg toolchains")]
struct Cli {
    /// Configuration file (falls back to $DEPOT_CONFIG, then ./depot.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Architecture to operate on (toolchain native when omitted)
    #[arg(short, long, global = true)]
    arch: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the binary package under a source tree
    Build {
        package_path: PathBuf,
        #[arg(short, long)]
        output_repository: Option<PathBuf>,
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// Build a source package out of a working tree
    BuildSrc {
        package_path: PathBuf,
        #[arg(short, long)]
        output_repository: Option<PathBuf>,
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// Build binaries from source packages (all of `sources/` when no name)
    BuildFromSrc {
        name: Option<String>,
        #[arg(short, long)]
        output_repository: Option<PathBuf>,
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// Resolve a package and install it into the target root
    Install {
        name: String,
        #[arg(short, long)]
        distribution: Option<String>,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
        #[arg(long)]
        reinstall: bool,
        /// Pass the name through to wpkg instead of resolving a file
        #[arg(long)]
        by_name: bool,
    },
    /// Install a version pinned from the archive
    InstallArchived {
        name: String,
        version: String,
        #[arg(short, long)]
        distribution: Option<String>,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
        #[arg(long)]
        reinstall: bool,
    },
    /// Remove an installed package
    Remove {
        name: String,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Remove automatically-installed packages nothing depends on
    Autoremove {
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Is the package installed in the target root?
    IsInstalled {
        name: String,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Package metadata as JSON
    Show {
        name: String,
        #[arg(short = 'V', long)]
        version: Option<String>,
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// Control fields of an installed package
    Fields {
        name: String,
        fields: Vec<String>,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// List installed packages
    List {
        pattern: Option<String>,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Search installed files
    Search {
        pattern: String,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Files installed by a package
    ListFiles {
        name: String,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Copy an artifact from one repository into another and resync
    Publish {
        name: String,
        in_repo: PathBuf,
        #[arg(short, long)]
        output_repository: Option<PathBuf>,
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// Delete an artifact from a repository
    Unpublish {
        name: String,
        #[arg(short, long)]
        repository: Option<PathBuf>,
        #[arg(short, long)]
        distribution: Option<String>,
        /// Skip the index/archive resynchronization
        #[arg(long)]
        no_update_index: bool,
    },
    /// Is the package present in a repository?
    IsPublished {
        name: String,
        #[arg(short = 'V', long)]
        version: Option<String>,
        #[arg(short, long)]
        repository: Option<PathBuf>,
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// Run the index/archive/index cycle on a repository
    Sync {
        repository: Option<PathBuf>,
    },
    /// Render the dependency graph of the given packages
    Graph {
        names: Vec<String>,
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// Print the absolute path a package resolves to
    Locate {
        name: String,
        #[arg(short = 'V', long)]
        version: Option<String>,
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// List archived versions of a package
    ArchiveVersions {
        name: String,
        #[arg(short, long)]
        distribution: Option<String>,
        /// Print only the latest archived version
        #[arg(long)]
        latest: bool,
    },
    /// Register a source line in the target's sources.list
    AddSources {
        source_line: String,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Remove a source line from the target's sources.list
    RemoveSources {
        source_line: String,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Refresh the target's package lists
    Update {
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Upgrade the target's installed packages
    Upgrade {
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Set up the wpkg admindir for a target architecture
    CreateAdmindir {
        #[arg(short, long)]
        distribution: Option<String>,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Register wpkg hook scripts
    AddHooks {
        hooks: Vec<PathBuf>,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Mark a package selection state (auto|normal|hold|reject)
    SetSelection {
        name: String,
        selection: String,
        #[arg(short, long)]
        target_root: Option<PathBuf>,
    },
    /// Is v1 strictly greater than v2 under Debian ordering?
    CompareVersions {
        v1: String,
        v2: String,
    },
}

fn find_config(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Ok(env) = std::env::var("DEPOT_CONFIG") {
        return Ok(PathBuf::from(env));
    }
    let fallback = PathBuf::from("depot.toml");
    if fallback.is_file() {
        return Ok(fallback);
    }
    anyhow::bail!("no configuration found: pass --config, set DEPOT_CONFIG, or add ./depot.toml");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = find_config(cli.config.as_deref())?;
    let config = Config::load(&config_path)
        .with_context(|| format!("while loading {}", config_path.display()))?;
    let arch = cli
        .arch
        .as_deref()
        .map(Arch::new)
        .unwrap_or_else(|| config.arch.clone());
    let orch = Orchestrator::new(config);

    match cli.command {
        Commands::Build {
            package_path,
            output_repository,
            distribution,
        } => orch.build(
            &package_path,
            &BuildOptions {
                output_repository,
                distribution,
            },
        )?,
        Commands::BuildSrc {
            package_path,
            output_repository,
            distribution,
        } => orch.build_src(
            &package_path,
            &BuildOptions {
                output_repository,
                distribution,
            },
        )?,
        Commands::BuildFromSrc {
            name,
            output_repository,
            distribution,
        } => orch.build_from_src(
            name.as_deref(),
            &arch,
            &BuildOptions {
                output_repository,
                distribution,
            },
        )?,
        Commands::Install {
            name,
            distribution,
            target_root,
            reinstall,
            by_name,
        } => {
            let opts = InstallOptions {
                distribution,
                target_root,
                reinstall,
            };
            if by_name {
                orch.install_by_name(&name, &arch, &opts)?;
            } else {
                orch.install(&name, &arch, &opts)?;
            }
        }
        Commands::InstallArchived {
            name,
            version,
            distribution,
            target_root,
            reinstall,
        } => orch.install_from_archive(
            &name,
            &version,
            &arch,
            &InstallOptions {
                distribution,
                target_root,
                reinstall,
            },
        )?,
        Commands::Remove { name, target_root } => {
            orch.remove(&name, &arch, target_root.as_deref())?;
        }
        Commands::Autoremove { target_root } => {
            orch.autoremove(&arch, target_root.as_deref())?;
        }
        Commands::IsInstalled { name, target_root } => {
            let installed = orch.is_installed(&name, &arch, target_root.as_deref())?;
            println!("{installed}");
            if !installed {
                std::process::exit(1);
            }
        }
        Commands::Show {
            name,
            version,
            distribution,
        } => {
            let value = orch.show(
                &name,
                &arch,
                &ShowOptions {
                    version,
                    distribution,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Fields {
            name,
            fields,
            target_root,
        } => {
            let map = orch.fields(&name, &fields, &arch, target_root.as_deref())?;
            for (field, value) in map {
                println!("{field}: {value}");
            }
        }
        Commands::List {
            pattern,
            target_root,
        } => {
            for line in orch.list(pattern.as_deref(), &arch, target_root.as_deref())? {
                println!("{line}");
            }
        }
        Commands::Search {
            pattern,
            target_root,
        } => {
            for line in orch.search(&pattern, &arch, target_root.as_deref())? {
                println!("{line}");
            }
        }
        Commands::ListFiles { name, target_root } => {
            for line in orch.list_files(&name, &arch, target_root.as_deref())? {
                println!("{line}");
            }
        }
        Commands::Publish {
            name,
            in_repo,
            output_repository,
            distribution,
        } => orch.publish(
            &name,
            &arch,
            &in_repo,
            &PublishOptions {
                output_repository,
                distribution,
            },
        )?,
        Commands::Unpublish {
            name,
            repository,
            distribution,
            no_update_index,
        } => orch.unpublish(
            &name,
            &arch,
            &UnpublishOptions {
                repository,
                distribution,
                update_index: !no_update_index,
            },
        )?,
        Commands::IsPublished {
            name,
            version,
            repository,
            distribution,
        } => {
            let published = orch.is_published(
                &name,
                version.as_deref(),
                &arch,
                repository.as_deref(),
                distribution.as_deref(),
            )?;
            println!("{published}");
            if !published {
                std::process::exit(1);
            }
        }
        Commands::Sync { repository } => orch.sync_repository(repository.as_deref())?,
        Commands::Graph {
            names,
            distribution,
        } => orch.graph(&names, &arch, distribution.as_deref())?,
        Commands::Locate {
            name,
            version,
            distribution,
        } => {
            let path = orch.get_deb_location(
                &name,
                &arch,
                &ShowOptions {
                    version,
                    distribution,
                },
            )?;
            println!("{}", path.display());
        }
        Commands::ArchiveVersions {
            name,
            distribution,
            latest,
        } => {
            if latest {
                match orch.archive_latest_version(&name, distribution.as_deref())? {
                    Some(version) => println!("{version}"),
                    None => std::process::exit(1),
                }
            } else {
                for version in orch.list_archive_versions(&name, distribution.as_deref())? {
                    println!("{version}");
                }
            }
        }
        Commands::AddSources {
            source_line,
            target_root,
        } => orch.add_sources(&source_line, &arch, target_root.as_deref())?,
        Commands::RemoveSources {
            source_line,
            target_root,
        } => orch.remove_sources(&source_line, &arch, target_root.as_deref())?,
        Commands::Update { target_root } => orch.update(&arch, target_root.as_deref())?,
        Commands::Upgrade { target_root } => orch.upgrade(&arch, target_root.as_deref())?,
        Commands::CreateAdmindir {
            distribution,
            target_root,
        } => orch.create_admindir(&arch, distribution.as_deref(), target_root.as_deref())?,
        Commands::AddHooks { hooks, target_root } => {
            orch.add_hooks(&hooks, &arch, target_root.as_deref())?;
        }
        Commands::SetSelection {
            name,
            selection,
            target_root,
        } => {
            let selection: Selection = selection.parse().map_err(anyhow::Error::msg)?;
            orch.set_selection(&name, selection, &arch, target_root.as_deref())?;
        }
        Commands::CompareVersions { v1, v2 } => {
            let greater = orch.is_v1_greater(&v1, &v2)?;
            println!("{greater}");
            if !greater {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
