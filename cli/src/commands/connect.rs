//! Connect command - forward every declared service until interrupted.

use std::path::{Path, PathBuf};

use anyhow::Result;
use kbf_core::{
    default_kubeconfig_path, load_forward_file, ForwardOrchestrator, ForwardSettings,
    ForwardSpec, KubectlClient, KubectlPodResolver, KubectlTunnel, SessionReport,
};
use tracing::info;

const BANNER: &str = r"
 _    _     __
| | _| |__ / _|
| |/ / '_ \| |_
|   <| |_) |  _|
|_|\_\_.__/|_|
";

/// Arguments for `kbf connect`.
pub struct ConnectArgs {
    pub file: PathBuf,
    pub kubeconfig: Option<PathBuf>,
    pub quiet: bool,
}

pub async fn run(args: ConnectArgs) -> Result<()> {
    if !args.quiet {
        eprintln!("{}", BANNER);
    }

    let (settings, specs, client) = prepare(args.file, args.kubeconfig).await?;

    for spec in &specs {
        info!("forwarding {}", spec);
    }

    let orchestrator = ForwardOrchestrator::new(
        KubectlPodResolver::new(client.clone()),
        KubectlTunnel::new(client),
        &settings,
    );
    let reports = orchestrator.run_until_interrupted(specs).await;

    print_summary(&reports);
    Ok(())
}

/// Everything that must succeed before a single forward starts.
async fn prepare(
    file: PathBuf,
    kubeconfig: Option<PathBuf>,
) -> kbf_core::Result<(ForwardSettings, Vec<ForwardSpec>, KubectlClient)> {
    let kubeconfig = match kubeconfig {
        Some(path) => first_kubeconfig(&path),
        None => default_kubeconfig_path()?,
    };
    let settings = ForwardSettings::new(file, kubeconfig);

    let specs = load_forward_file(&settings.forward_file).await?;
    let client = KubectlClient::connect(&settings.kubeconfig).await?;

    Ok((settings, specs, client))
}

/// `KUBECONFIG` may hold a list of files; kubectl's `--kubeconfig` takes one.
fn first_kubeconfig(value: &Path) -> PathBuf {
    std::env::split_paths(value.as_os_str())
        .find(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| value.to_path_buf())
}

fn print_summary(reports: &[SessionReport]) {
    for report in reports {
        info!(
            service = %report.spec.name,
            namespace = %report.spec.namespace,
            retries = report.retry_count,
            connections = report.ready_count,
            "{} {}",
            report.spec.label(),
            report.final_state
        );
    }
}
