use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use semver::Version;
use std::path::PathBuf;
use tracing::{debug, warn};

use cfgtree_config::{InputKind, LoadOutcome, OptionSpec, Persist, SectionSpec, Store, Value};

mod show;

/// cfgtree — inspect and edit a typed, sectioned configuration file
#[derive(Parser)]
#[command(name = "cfgtree", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Schema version expected in the file (defaults to the tool version)
    #[arg(long, global = true, env = "CFGTREE_SCHEMA_VERSION")]
    schema_version: Option<String>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configuration tree (or the subtree at PATH)
    Show {
        /// Section path, e.g. `network:proxy` (root when omitted)
        path: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Print password values instead of masking them
        #[arg(long)]
        reveal: bool,
    },
    /// Print one option value
    Get {
        /// Section path (`.` for the root)
        path: String,
        key: String,
    },
    /// Set an option value and save the file
    Set {
        /// Section path (`.` for the root)
        path: String,
        key: String,
        value: String,
    },
    /// Add a new option
    Add {
        /// Section path (`.` for the root)
        path: String,
        key: String,
        /// Initial (and default) value
        value: String,
        /// Value kind: str, int, bool, float, octal, size, password, file, folder, address, bytes, strlist
        #[arg(short, long, default_value = "str")]
        kind: InputKind,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        /// Comma-separated list of allowed values
        #[arg(long, value_delimiter = ',')]
        allowed: Vec<String>,
    },
    /// Add a new (empty) section
    AddSection {
        /// Parent section path (`.` for the root)
        path: String,
        name: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        desc: Option<String>,
    },
    /// Reset options to their defaults
    Reset {
        /// Section path (root when omitted)
        path: Option<String>,
    },
    /// Show version and build info
    Version,
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `.` and the empty string both name the root section.
fn section_path(path: &str) -> &str {
    match path.trim() {
        "." => "",
        other => other,
    }
}

impl Cli {
    pub fn run(self) -> cfgtree_core::Result<()> {
        // Resolve log level: --verbose > --quiet > --log-level > info
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or("info")
        };
        init_tracing(log_level, self.log_format);

        match self.command {
            Commands::Version => return Self::cmd_version(self.schema_version.as_deref()),
            Commands::Completions { shell } => return Self::cmd_completions(shell),
            _ => {}
        }

        let version = match &self.schema_version {
            Some(v) => Version::parse(v.trim())?,
            None => Version::parse(env!("CARGO_PKG_VERSION"))?,
        };
        let store = Store::open(Store::resolve_path(self.config.as_deref()), version)?;
        match store.load_outcome() {
            LoadOutcome::Recovered { backup } => {
                warn!(backup = ?backup, "incompatible configuration moved aside")
            }
            LoadOutcome::Defaulted { reason } => warn!(%reason, "configuration not loaded"),
            outcome => debug!(path = ?store.path(), ?outcome, "configuration opened"),
        }

        match self.command {
            Commands::Show { path, json, reveal } => {
                show::cmd_show(&store, section_path(path.as_deref().unwrap_or("")), json, reveal)
            }
            Commands::Get { path, key } => {
                let value = store.get(section_path(&path), &key)?;
                println!("{value}");
                Ok(())
            }
            Commands::Set { path, key, value } => {
                Self::cmd_set(&store, section_path(&path), &key, value)
            }
            Commands::Add {
                path,
                key,
                value,
                kind,
                label,
                desc,
                allowed,
            } => {
                let spec = OptionSpec {
                    kind,
                    value: Value::Str(value),
                    label,
                    desc,
                    allowed: allowed.into_iter().map(Value::Str).collect(),
                };
                store.add_option(section_path(&path), &key, spec)?;
                println!("✅ added {key} ({kind})");
                Ok(())
            }
            Commands::AddSection {
                path,
                name,
                label,
                desc,
            } => {
                let spec = SectionSpec {
                    label,
                    desc,
                    ..SectionSpec::default()
                };
                store.add_section_with(section_path(&path), &name, spec, Persist::Yes)?;
                println!("✅ added section {name}");
                Ok(())
            }
            Commands::Reset { path } => {
                store.reset(section_path(path.as_deref().unwrap_or("")), Persist::Yes)?;
                println!("✅ reset to defaults");
                Ok(())
            }
            Commands::Version | Commands::Completions { .. } => Ok(()),
        }
    }

    fn cmd_set(store: &Store, path: &str, key: &str, value: String) -> cfgtree_core::Result<()> {
        let old = store.get(path, key)?;
        store.set(path, key, value)?;
        let new = store.get(path, key)?;
        if old == new {
            println!("✅ {key} = {new} (unchanged)");
        } else {
            println!("✅ {key} = {new} (was {old})");
        }
        Ok(())
    }

    fn cmd_version(schema_version: Option<&str>) -> cfgtree_core::Result<()> {
        println!("cfgtree v{}", env!("CARGO_PKG_VERSION"));
        println!(
            "   Schema version: {}",
            schema_version.unwrap_or(env!("CARGO_PKG_VERSION"))
        );
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> cfgtree_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "cfgtree", &mut std::io::stdout());
        Ok(())
    }
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}
