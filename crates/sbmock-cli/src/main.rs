#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use sbmock_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sbmock")]
#[command(author, version, about = "Inspect and run Storybook module mocks", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory (the project root)
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Storybook config directory holding the preview file
    #[arg(long, global = true, value_name = "DIR", default_value = ".storybook")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// List the `sb.mock` declarations of the preview file
    Extract,

    /// Resolve a mock specifier the way the preview file would
    Resolve {
        /// Module specifier (`./utils`, `lodash-es`, ...)
        specifier: String,

        /// File the specifier is written in (defaults to the preview file)
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,
    },

    /// Print the automocked form of a module
    Automock {
        /// Module to transform
        file: PathBuf,

        /// Keep the original implementations behind spies
        #[arg(long)]
        spy: bool,

        /// Global property the generated code reads the mocker from
        #[arg(long, value_name = "NAME")]
        accessor: Option<String>,

        /// Write the code here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Print the preview file with `sb.mock(import(...))` calls rewritten
    Rewrite {
        /// File to rewrite (defaults to the preview file)
        file: Option<PathBuf>,
    },

    /// Watch the project and report how mock changes invalidate modules
    Watch,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let cwd = dunce::canonicalize(&cwd).unwrap_or(cwd);

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_config_dir(cli.config_dir);

    logging::init(&config);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Extract) => {
            let span = tracing::info_span!("extract", cmd = "extract", cwd = %cwd.display());
            let _guard = span.enter();
            commands::extract::run(&config)
        }
        Some(Commands::Resolve { specifier, from }) => {
            let span = tracing::info_span!("resolve", cmd = "resolve", cwd = %cwd.display());
            let _guard = span.enter();
            commands::resolve::run(&config, &specifier, from.as_deref())
        }
        Some(Commands::Automock {
            file,
            spy,
            accessor,
            out,
        }) => {
            let span = tracing::info_span!("automock", cmd = "automock", cwd = %cwd.display());
            let _guard = span.enter();
            let action = commands::automock::AutomockAction {
                file,
                spy,
                accessor,
                out,
            };
            commands::automock::run(&config, action)
        }
        Some(Commands::Rewrite { file }) => {
            let span = tracing::info_span!("rewrite", cmd = "rewrite", cwd = %cwd.display());
            let _guard = span.enter();
            commands::rewrite::run(&config, file.as_deref())
        }
        Some(Commands::Watch) => {
            let span = tracing::info_span!("watch", cmd = "watch", cwd = %cwd.display());
            let _guard = span.enter();
            let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
            runtime.block_on(commands::watch::run(&config))
        }
    }
}
