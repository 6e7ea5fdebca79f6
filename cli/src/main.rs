//! kbf CLI - Keep Kubernetes services port-forwarded to localhost
//!
//! Reads a YAML list of services, forwards each one to a local port with
//! `kubectl port-forward`, and keeps every tunnel alive until Ctrl-C.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use kbf_core::DEFAULT_FORWARD_FILE;

#[derive(Parser)]
#[command(name = "kbf")]
#[command(author, version, about = "Port-forward Kubernetes services declared in a YAML file")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the kubeconfig file [default: ~/.kube/config]
    #[arg(long, global = true, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Do not print the banner
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Port-forward to Kubernetes services using a forward file
    Connect {
        /// Forward file path
        #[arg(short, long, default_value = DEFAULT_FORWARD_FILE)]
        file: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Connect { file } => {
            commands::connect::run(commands::connect::ConnectArgs {
                file,
                kubeconfig: cli.kubeconfig,
                quiet: cli.quiet,
            })
            .await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            eprintln!("{}", subcommand_usage("connect"));
            ExitCode::FAILURE
        }
    }
}

/// Usage string for a subcommand, including the binary name.
fn subcommand_usage(name: &str) -> String {
    let mut cmd = Cli::command();
    cmd.build();
    cmd.find_subcommand_mut(name)
        .map(|sub| sub.render_usage().to_string())
        .unwrap_or_else(|| cmd.render_usage().to_string())
}
