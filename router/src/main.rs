//! Sandbox entry point
//!
//! Supervises one project's worker generations and fronts them with the
//! router on a single HTTP port.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use controller::{ControllerConfig, DirectoryVersionStore, ProcessController, WorkerCommand};
use router::{RouterConfig, RouterServer};
use shared::{component_info, logging, Component, ProjectId};
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "sandbox")]
#[command(about = "Zero-downtime worker supervisor with an HTTP front end")]
struct Args {
    /// Port the router listens on
    #[arg(long, env = "SANDBOX_PORT", default_value_t = router::config::DEFAULT_LISTEN_PORT)]
    port: u16,

    /// Interface the router listens on
    #[arg(long, env = "SANDBOX_LISTEN", default_value_t = router::config::DEFAULT_LISTEN_ADDR)]
    listen: IpAddr,

    /// Project whose versions are deployed
    #[arg(long, env = "SANDBOX_PROJECT")]
    project: ProjectId,

    /// Loopback host the workers bind and are health-checked on
    #[arg(long, env = "SANDBOX_HOST", default_value = controller::config::DEFAULT_HOST)]
    host: String,

    /// First port of the worker port range
    #[arg(long, env = "SANDBOX_PORT_START", default_value_t = controller::config::DEFAULT_PORT_START)]
    port_start: u16,

    /// Executable every generation runs
    #[arg(long, env = "SANDBOX_EXEC", default_value = "node")]
    exec: String,

    /// Worker argument (repeatable)
    #[arg(long = "arg", env = "SANDBOX_ARGS", value_delimiter = ',', default_value = "/tmp/fusion/script.mjs")]
    args: Vec<String>,

    /// Directory the version is materialised into and the worker runs in
    #[arg(long, env = "SANDBOX_WORK_DIR", default_value = "/tmp/fusion")]
    work_dir: PathBuf,

    /// Directory holding `<project>/<version>/` snapshots
    #[arg(long, env = "SANDBOX_STORE_ROOT", default_value = "/var/lib/sandbox/versions")]
    store_root: PathBuf,

    /// Deploy the latest version before accepting traffic
    #[arg(long, env = "SANDBOX_DEPLOY_LATEST")]
    deploy_latest: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SANDBOX_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    logging::init_tracing(&args.log_level).context("initialising logging")?;
    let bind_address = args.bind_address();

    let config = ControllerConfig::default()
        .with_host(args.host.clone())
        .with_port_start(args.port_start);
    let command = WorkerCommand::new(args.exec, args.args, args.work_dir);
    let store = Arc::new(DirectoryVersionStore::new(args.store_root));

    let controller = ProcessController::new(args.project, command, config, store)
        .context("starting process controller")?;

    if args.deploy_latest {
        let version = controller
            .start_process(None)
            .await
            .context("deploying latest version")?;
        component_info!(Component::Router, "Initial deploy of version {}", version);
    }

    let server = RouterServer::new(controller.clone(), RouterConfig::default().with_bind_address(bind_address))?;

    let served = server.run(shutdown_signal()).await;

    controller.close().await;
    served.context("serving sandbox")?;

    logging::log_success(Component::Router, "Sandbox stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => logging::log_shutdown(Component::Router, "Received Ctrl+C signal"),
        Err(err) => {
            logging::log_error(Component::Router, "Signal handling", &err);
            // Without a signal handler the server runs until killed
            std::future::pending::<()>().await;
        }
    }
}
