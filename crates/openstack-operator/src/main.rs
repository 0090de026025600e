//! OpenStack Operator - OpenStack control planes on Kubernetes

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kube::Client;

use openstack_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use openstack_operator::controller_runner::{
    build_controlplane_controller, build_infra_controllers, build_service_controllers,
    RunnerConfig,
};
use openstack_operator::crds::{crds_yaml, ensure_crds_installed};

/// OpenStack operator - CRD-driven rollout of an OpenStack control plane
#[derive(Parser, Debug)]
#[command(name = "openstack-operator", version, about, long_about = None)]
struct Cli {
    /// Print all CRD manifests as YAML and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controllers (default mode)
    Controller,
}

#[derive(Args, Debug)]
struct ControllerArgs {
    /// Namespace to watch; empty watches all namespaces
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "", global = true)]
    namespace: String,

    /// Log output format
    #[arg(
        long,
        env = "LOG_FORMAT",
        value_enum,
        default_value_t = LogFormatArg::Json,
        global = true
    )]
    log_format: LogFormatArg,

    /// Seconds between checks while waiting on rollouts and children
    #[arg(long, env = "REQUEUE_SECONDS", default_value_t = 10, global = true)]
    requeue_seconds: u64,

    /// Do not install or update CRDs on startup
    #[arg(long, env = "SKIP_CRD_INSTALL", global = true)]
    skip_crd_install: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Json,
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => LogFormat::Json,
            LogFormatArg::Pretty => LogFormat::Pretty,
        }
    }
}

impl ControllerArgs {
    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            namespace: Some(self.namespace.trim())
                .filter(|ns| !ns.is_empty())
                .map(str::to_string),
            requeue: Duration::from_secs(self.requeue_seconds.max(1)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        print!("{}", crds_yaml()?);
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        format: cli.controller.log_format.into(),
        ..Default::default()
    })?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(&cli.controller).await,
    }
}

async fn run_controller(args: &ControllerArgs) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create Kubernetes client: {}", e))?;

    if args.skip_crd_install {
        tracing::info!("skipping CRD installation");
    } else {
        ensure_crds_installed(&client).await?;
    }

    let config = args.runner_config();
    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        requeue_seconds = config.requeue.as_secs(),
        "starting controllers"
    );

    let mut controllers = vec![build_controlplane_controller(client.clone(), &config)];
    controllers.extend(build_infra_controllers(client.clone(), &config));
    controllers.extend(build_service_controllers(client, &config));

    futures::future::join_all(controllers).await;
    tracing::info!("controllers stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_watch_all_namespaces() {
        let cli = Cli::try_parse_from(["openstack-operator"]).unwrap();
        assert!(!cli.crd);
        assert!(cli.command.is_none());
        let config = cli.controller.runner_config();
        assert_eq!(config.namespace, None);
        assert_eq!(config.requeue, Duration::from_secs(10));
    }

    #[rstest]
    #[case::before_subcommand(&["openstack-operator", "--namespace", "openstack", "controller"])]
    #[case::after_subcommand(&["openstack-operator", "controller", "--namespace", "openstack"])]
    fn test_namespace_flag(#[case] args: &[&str]) {
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(cli.command, Some(Commands::Controller)));
        assert_eq!(
            cli.controller.runner_config().namespace.as_deref(),
            Some("openstack")
        );
    }

    #[test]
    fn test_log_format_and_requeue() {
        let cli = Cli::try_parse_from([
            "openstack-operator",
            "--log-format",
            "pretty",
            "--requeue-seconds",
            "0",
        ])
        .unwrap();
        assert_eq!(LogFormat::from(cli.controller.log_format), LogFormat::Pretty);
        assert_eq!(cli.controller.runner_config().requeue, Duration::from_secs(1));
    }
}
