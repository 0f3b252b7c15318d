use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use hashlit::compiler::{self, Token};
use hashlit::package::{self, PackageManifest};
use hashlit::RuntimeConfig;

#[derive(Parser)]
#[command(name = "hashlit")]
#[command(about = "Extensible collection literals", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). HASHLIT_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new hashlit project
    Init {
        /// Project name (defaults to directory name)
        name: Option<String>,
    },
    /// Run a hashlit source file
    Run {
        /// The source file to run (defaults to hashlit.toml entry if in a project)
        file: Option<PathBuf>,

        /// Execute code directly from command line
        #[arg(short = 'c', long, conflicts_with = "file")]
        code: Option<String>,

        /// Maximum nesting of function calls
        #[arg(long)]
        max_call_depth: Option<usize>,

        /// Log every protocol dispatch
        #[arg(long)]
        trace_protocol: bool,

        /// Print the desugared program to stderr before running
        #[arg(long)]
        dump_desugared: bool,
    },
    /// Print a source file with every collection literal desugared
    Desugar {
        /// The source file (defaults to hashlit.toml entry if in a project)
        file: Option<PathBuf>,
    },
    /// Print the token stream of a source file
    Tokens {
        /// The source file (defaults to hashlit.toml entry if in a project)
        file: Option<PathBuf>,

        /// Emit JSON instead of one token per line
        #[arg(long)]
        json: bool,
    },
    /// Lex and parse a source file without running it
    Check {
        /// The source file to check (defaults to hashlit.toml entry if in a project)
        file: Option<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("HASHLIT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("hashlit={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;

    match command {
        Commands::Init { name } => {
            let project_name = package::init_project(&cwd, name.as_deref())?;
            println!(
                "Created new hashlit project '{}' in {}",
                project_name,
                cwd.display()
            );
        }
        Commands::Run {
            file,
            code,
            max_call_depth,
            trace_protocol,
            dump_desugared,
        } => {
            let mut config = RuntimeConfig::default();
            if let Ok(root) = package::find_project_root(&cwd) {
                PackageManifest::load(&root)?.apply_to(&mut config);
            }
            if let Some(depth) = max_call_depth {
                config.max_call_depth = depth;
            }
            config.trace_protocol |= trace_protocol;
            debug!(?config, "runtime configuration");

            let (filename, source) = match code {
                Some(code) => ("<code>".to_string(), code),
                None => {
                    let path = resolve_file(file, &cwd, "run")?;
                    let source = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    (path.display().to_string(), source)
                }
            };

            if dump_desugared {
                match compiler::desugar_source(&source) {
                    Ok(printed) => eprint!("{}", printed),
                    Err(e) => return Ok(report(compiler::Error::from(e), &filename)),
                }
            }

            if let Err(e) = compiler::run_source(&source, &config) {
                return Ok(report(e, &filename));
            }
        }
        Commands::Desugar { file } => {
            let path = resolve_file(file, &cwd, "desugar")?;
            match compiler::desugar_file(&path) {
                Ok(printed) => print!("{}", printed),
                Err(e) => return Ok(report(e, &path.display().to_string())),
            }
        }
        Commands::Tokens { file, json } => {
            let path = resolve_file(file, &cwd, "tokens")?;
            match compiler::tokenize_file(&path) {
                Ok(tokens) if json => {
                    println!("{}", serde_json::to_string_pretty(&tokens)?);
                }
                Ok(tokens) => print_tokens(&tokens),
                Err(e) => return Ok(report(e, &path.display().to_string())),
            }
        }
        Commands::Check { file } => {
            let path = resolve_file(file, &cwd, "check")?;
            if let Err(e) = compiler::check_file(&path) {
                return Ok(report(e, &path.display().to_string()));
            }
            println!("Check passed.");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Use the given file, or fall back to the project's entry point.
fn resolve_file(file: Option<PathBuf>, cwd: &Path, command: &str) -> anyhow::Result<PathBuf> {
    if let Some(path) = file {
        return Ok(path);
    }
    let root = package::find_project_root(cwd).with_context(|| {
        format!(
            "no file specified\nusage: hashlit {} <file> or run from a hashlit project directory",
            command
        )
    })?;
    let manifest = PackageManifest::load(&root)?;
    Ok(manifest.entry_path(&root))
}

fn report(error: compiler::Error, filename: &str) -> ExitCode {
    eprintln!("{}", error.render(filename));
    ExitCode::FAILURE
}

fn print_tokens(tokens: &[Token]) {
    for token in tokens {
        println!("{}:{} {}", token.span.line, token.span.column, token.kind.describe());
    }
}
