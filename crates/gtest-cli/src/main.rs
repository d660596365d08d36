use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use gtest_core::{Config, ProcessRunner, RunRequest, Session, TestItem};

mod console;

use console::{ConsoleObserver, LogExplorer};

#[derive(Parser)]
#[command(name = "gtest-explorer")]
#[command(about = "Discover, build and run GoogleTest cases from a ninja build tree", long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered tests (every source in the manifest by default)
    Discover {
        files: Vec<PathBuf>,
        /// Print the test trees as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the test executables of the build manifest
    Targets,
    /// Build and run tests
    Run {
        files: Vec<PathBuf>,
        /// Test id (`Fixture.Name`) or fixture name to run; repeatable
        #[arg(long = "filter", short = 'f')]
        filters: Vec<String>,
        /// Echo build and test output
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the debugger command line for one test
    Debug {
        file: PathBuf,
        /// Canonical test id
        id: String,
    },
    /// Print the default configuration
    Init,
}

fn init_tracing(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_session(workspace: Option<PathBuf>) -> color_eyre::Result<Session> {
    let config = Config::load().wrap_err("failed to load configuration")?;
    init_tracing(&config.log.level);

    let workspace = match workspace {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let mut session = Session::new(config, workspace, Box::new(LogExplorer));
    if let Err(e) = session.manifest_changed() {
        warn!(error = %e, "continuing without a build manifest");
    }
    Ok(session)
}

async fn open_files(session: &mut Session, files: &[PathBuf]) -> color_eyre::Result<()> {
    for file in files {
        if !session.open_document(file).await? {
            warn!(file = %file.display(), "no build target compiles this file");
        }
    }
    Ok(())
}

fn selection(session: &Session, files: &[PathBuf], filters: &[String]) -> Vec<TestItem> {
    let files = files.iter().map(|f| session.resolve_path(f));
    if filters.is_empty() {
        return files.map(TestItem::File).collect();
    }
    files
        .flat_map(|file| {
            filters.iter().map(move |filter| {
                if filter.contains('.') {
                    TestItem::Case {
                        file: file.clone(),
                        canonical_id: filter.clone(),
                    }
                } else {
                    TestItem::Fixture {
                        file: file.clone(),
                        fixture: filter.clone(),
                    }
                }
            })
        })
        .collect()
}

fn print_trees(session: &Session, json: bool) -> color_eyre::Result<()> {
    if json {
        let trees: Vec<_> = session.trees().collect();
        println!("{}", serde_json::to_string_pretty(&trees)?);
        return Ok(());
    }

    for tree in session.trees() {
        println!("{}", tree.file.display());
        for node in &tree.nodes {
            match node {
                gtest_core::discovery::TreeNode::Fixture { name, cases, .. } => {
                    println!("  {name}");
                    for case in cases {
                        println!("    {}  [{}:{}]", case.canonical_id, display_name(&tree.file), case.source_line + 1);
                    }
                }
                gtest_core::discovery::TreeNode::Case(case) => {
                    println!("  {}  [{}:{}]", case.canonical_id, display_name(&tree.file), case.source_line + 1);
                }
            }
        }
    }
    Ok(())
}

fn display_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            print!("{}", Config::default_config_string());
        }
        Commands::Targets => {
            let session = open_session(cli.workspace)?;
            let index = session.index();
            for target in index.targets() {
                println!("{}\t{}", target.name, target.executable_path.display());
            }
        }
        Commands::Discover { files, json } => {
            let mut session = open_session(cli.workspace)?;
            if files.is_empty() {
                session.discover_all().await;
            } else {
                open_files(&mut session, &files).await?;
            }
            print_trees(&session, json)?;
        }
        Commands::Run {
            files,
            filters,
            verbose,
        } => {
            let mut session = open_session(cli.workspace)?;
            let request = if files.is_empty() {
                session.discover_all().await;
                RunRequest::All
            } else {
                open_files(&mut session, &files).await?;
                RunRequest::Items(selection(&session, &files, &filters))
            };

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });

            let mut observer = ConsoleObserver::new(verbose);
            let report = session
                .run(&request, Arc::new(ProcessRunner::new()), &mut observer, cancel)
                .await?;
            observer.finish(&report);

            if !report.success() {
                std::process::exit(1);
            }
        }
        Commands::Debug { file, id } => {
            let mut session = open_session(cli.workspace)?;
            open_files(&mut session, std::slice::from_ref(&file)).await?;
            let item = TestItem::Case {
                file: session.resolve_path(&file),
                canonical_id: id,
            };
            let launch = session.debug_launch(&item)?;
            println!("{}", launch.command_line().join(" "));
        }
    }

    Ok(())
}
