mod commands;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use thrd_core::{FileSystemProvider, Settings, TypeIndex};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// THRD data language toolchain.
#[derive(Parser)]
#[command(name = "thrd", version, about = "THRD data language toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Workspace root holding the `.thrdtype` declarations and `thrd.toml`
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check documents against their declared types
    Check {
        /// Documents to check. Default: every source under the root.
        files: Vec<PathBuf>,
    },

    /// Apply every automatic fix to a document
    Fix {
        /// Path to the document
        file: PathBuf,
        /// Rewrite the file in place instead of printing the result
        #[arg(long)]
        write: bool,
    },

    /// Print the parsed value of a document as JSON
    Dump {
        /// Path to the document
        file: PathBuf,
    },

    /// Print the chunk tree of a document
    Chunks {
        /// Path to the document
        file: PathBuf,
    },

    /// Print the classified tokens of a document
    Tokens {
        /// Path to the document
        file: PathBuf,
    },

    /// Start the Language Server Protocol server over stdio
    Lsp,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { files } => {
            commands::check::cmd_check(&cli.root, &files, cli.output, cli.quiet);
        }
        Commands::Fix { file, write } => {
            commands::fix::cmd_fix(&cli.root, &file, write, cli.output, cli.quiet);
        }
        Commands::Dump { file } => {
            commands::inspect::cmd_dump(&file, cli.output, cli.quiet);
        }
        Commands::Chunks { file } => {
            commands::inspect::cmd_chunks(&file, cli.output, cli.quiet);
        }
        Commands::Tokens { file } => {
            commands::inspect::cmd_tokens(&file, cli.output, cli.quiet);
        }
        Commands::Lsp => {
            if let Err(e) = thrd_lsp::run() {
                eprintln!("LSP server error: {}", e);
                process::exit(1);
            }
        }
    }
}

/// Log to stderr; stdout carries command output and the LSP transport.
fn init_logging() {
    let filter = EnvFilter::try_from_env("THRD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Settings and type index of a workspace root.
pub(crate) struct Project {
    pub root: PathBuf,
    pub settings: Settings,
    pub index: TypeIndex,
}

/// Load `thrd.toml` and every declaration under `root`, exiting on failure.
pub(crate) fn load_project(root: &Path, output: OutputFormat, quiet: bool) -> Project {
    let settings = match Settings::load(root) {
        Ok(s) => s,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let index = match TypeIndex::from_provider(&FileSystemProvider, root) {
        Ok(index) => index,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    debug!(root = %root.display(), types = index.len(), "project loaded");
    Project {
        root: root.to_path_buf(),
        settings,
        index,
    }
}

pub(crate) fn read_source(path: &Path, output: OutputFormat, quiet: bool) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Report an error message respecting output format and quiet flag.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
