//! kicad-lib-manager: organise vendor KiCad component archives into a
//! categorised library.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

use kicad_lib_manager::config::{self, Config};
use kicad_lib_manager::error::ImportError;
use kicad_lib_manager::import::{self, ImportOutcome, ImportRequest, Workspace};
use kicad_lib_manager::library::{self, LibraryLayout};
use kicad_lib_manager::project;
use kicad_lib_manager::registry::{Category, CategoryRegistry};
use kicad_lib_manager::select::{self, CategorySelector, Prompt, TerminalPrompt};
use kicad_lib_manager::vcs::{self, GitCli};

/// Organise vendor KiCad component archives into a categorised library.
///
/// Extracts a vendor zip (symbol, footprint, 3D model), asks which category
/// the part belongs to and merges it into `lib_sym/`, `lib_fp/` and
/// `3d_models/` under the library root.
#[derive(Parser, Debug)]
#[command(name = "kicad-lib-manager")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Vendor archive (.zip) to import
    #[arg(value_name = "ARCHIVE")]
    archive: Option<PathBuf>,

    /// Destination category (key or menu number); skips the menu
    #[arg(short, long, value_name = "KEY|INDEX")]
    library: Option<String>,

    /// Commit the changes in the library root
    #[arg(long)]
    commit: bool,

    /// Commit and push the changes
    #[arg(long)]
    push: bool,

    /// Commit message (default depends on the operation)
    #[arg(short, long, value_name = "TEXT")]
    message: Option<String>,

    /// Create the library directories and empty category libraries
    #[arg(long)]
    init_libraries: bool,

    /// Register category libraries in the project's library tables
    #[arg(long)]
    add_to_project: bool,

    /// Project directory for --add-to-project (default: parent of the library root)
    #[arg(long, value_name = "DIR")]
    project: Option<PathBuf>,

    /// Delete the archive after a successful import
    #[arg(long)]
    delete_archive: bool,

    /// Library root (default: config `library_path`, else the current directory)
    #[arg(short = 'C', long, value_name = "DIR")]
    library_root: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point for kicad-lib-manager.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            let e = ImportError::from(e);
            eprintln!("Configuration error: {}", error_chain(&e));
            return ExitCode::from(e.exit_code());
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    debug!(version = env!("CARGO_PKG_VERSION"), "Starting kicad-lib-manager");

    match run(&args, &cfg, &mut TerminalPrompt::stdio()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "Failed");
            eprintln!("Error: {}", error_chain(&e));
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: &Args, cfg: &Config, prompt: &mut dyn Prompt) -> Result<(), ImportError> {
    if args.archive.is_none() && !args.init_libraries && !args.add_to_project {
        return Err(ImportError::Usage(
            "nothing to do: give an ARCHIVE, --init-libraries or --add-to-project".to_string(),
        ));
    }

    let layout = library_layout(args, cfg)?;
    let registry = CategoryRegistry::standard();
    let mut default_message = None;
    let mut imported = None;

    info!(root = %layout.root().display(), "Using library root");

    if args.init_libraries {
        let report = library::initialize(&layout, &registry)?;
        println!(
            "Initialised {}: {} created, {} already present",
            layout.root().display(),
            report.created.len(),
            report.existing.len()
        );
        default_message = Some(vcs::INIT_COMMIT_MESSAGE.to_string());
    }

    if let Some(archive) = &args.archive {
        let workspace = Workspace::new(registry.clone(), layout.clone(), cfg.import.clone())
            .with_model_prefix(cfg.model_path_prefix.clone());
        let request = ImportRequest {
            archive,
            library: args.library.as_deref(),
        };

        match import::import_archive(&workspace, &request, prompt)? {
            ImportOutcome::Cancelled => {
                println!("Import cancelled; library unchanged.");
                return Ok(());
            }
            ImportOutcome::Merged { category, report } => {
                if !report.changed() {
                    println!("Library already up to date.");
                }
                let name = archive
                    .file_name()
                    .map_or_else(|| archive.display().to_string(), |n| n.to_string_lossy().into_owned());
                default_message = Some(vcs::import_commit_message(&name));
                imported = Some(category);
            }
        }
    }

    if args.add_to_project {
        let project_dir = project_dir(args, cfg, &layout)?;
        let categories: Vec<&Category> = match (&imported, &args.library) {
            (Some(key), _) => registry.by_key(key).into_iter().collect(),
            (None, Some(input)) => vec![select::resolve_preselected(&registry, input)?],
            (None, None) => CategorySelector::new(cfg.import.max_selection_attempts)
                .select_many(&registry, prompt)?,
        };

        if categories.is_empty() {
            println!("No categories selected; project tables unchanged.");
        } else {
            let report = project::register_categories(&layout, &project_dir, &categories)?;
            println!(
                "Project {}: {} table entries added, {} already present",
                project_dir.display(),
                report.added.len(),
                report.existing.len()
            );
        }
    }

    if args.commit || args.push {
        match args.message.clone().or(default_message) {
            Some(message) => {
                let mut git = GitCli::new(cfg.git.binary.clone(), layout.root())
                    .with_remote(cfg.git.remote.clone());
                let recorded = vcs::record_changes(&mut git, &message, args.push)?;
                if recorded.committed {
                    println!("Committed: {message}");
                } else {
                    println!("Nothing to commit; library already recorded.");
                }
                if recorded.pushed {
                    println!("Pushed.");
                }
            }
            None => warn!("No library changes to commit"),
        }
    }

    if args.delete_archive {
        if let (Some(archive), Some(_)) = (&args.archive, &imported) {
            import::delete_archive(archive)?;
        }
    }

    Ok(())
}

/// The library layout, with relative roots taken from the current directory.
fn library_layout(args: &Args, cfg: &Config) -> Result<LibraryLayout, ImportError> {
    let cwd = std::env::current_dir().map_err(|e| ImportError::io(".", e))?;
    let root = args
        .library_root
        .clone()
        .or_else(|| cfg.library_path.clone())
        .unwrap_or_default();
    Ok(LibraryLayout::resolve(&cwd, &root))
}

fn project_dir(args: &Args, cfg: &Config, layout: &LibraryLayout) -> Result<PathBuf, ImportError> {
    args.project
        .clone()
        .or_else(|| cfg.project_dir.clone())
        .or_else(|| layout.root().parent().map(Path::to_path_buf))
        .filter(|dir| !dir.as_os_str().is_empty())
        .ok_or_else(|| {
            ImportError::Usage("cannot determine the project directory; pass --project".to_string())
        })
}

/// Joins an error and its sources into one line.
fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
