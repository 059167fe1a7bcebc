//! MSTP simulation daemon
//!
//! `mstpd run <NODE_ID>` hosts one node of the configured network.
//! `mstpd status` and `mstpd transfer` drive a running network from the
//! command line.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sonic_mstp::{BridgeId, MstpNode, VlanId};
use sonic_mstpd::http_transport::HttpTransport;
use sonic_mstpd::poller::{aggregate, unreachable, StatusPoller};
use sonic_mstpd::rest_api::{self, AppState, InitiateTransferRequest};
use sonic_mstpd::MstpdConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Simplified MSTP simulation daemon
#[derive(Parser, Debug)]
#[command(name = "mstpd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Network configuration file
    #[arg(short, long, global = true, default_value = "mstpd.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short = 'l', long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one node of the network
    Run {
        /// Node id from the configuration
        node_id: String,
    },
    /// Print the status of every node
    Status,
    /// Start a simulated transfer
    Transfer {
        /// Source node
        #[arg(long)]
        src: String,

        /// Destination node
        #[arg(long)]
        dst: String,

        /// VLAN to route over
        #[arg(long, default_value = "10")]
        vlan: VlanId,

        /// File size in MB
        #[arg(long, default_value = "10")]
        size_mb: f64,

        /// Payload carried with the transfer
        #[arg(long, default_value = "")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = MstpdConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Run { node_id } => run_node(config, BridgeId::from(node_id)).await,
        Command::Status => print_status(config).await,
        Command::Transfer {
            src,
            dst,
            vlan,
            size_mb,
            payload,
        } => {
            let request = InitiateTransferRequest {
                dst: BridgeId::from(dst),
                vlan_id: vlan,
                file_size_mb: size_mb,
                global_port_states: Default::default(),
                payload,
            };
            start_transfer(config, BridgeId::from(src), request).await
        }
    }
}

/// Initialize structured logging
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set logger")?;
    Ok(())
}

async fn run_node(config: MstpdConfig, node_id: BridgeId) -> anyhow::Result<()> {
    let topology = config.to_topology()?;
    let Some(address) = topology.address_of(&node_id) else {
        bail!("node {} is not in the configuration", node_id);
    };

    // Serve first; requests that race node construction get a 503.
    let listener = TcpListener::bind((address.host.as_str(), address.port))
        .await
        .with_context(|| format!("binding {}:{}", address.host, address.port))?;
    let state = AppState::new();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(rest_api::serve(listener, state.clone(), async move {
        let _ = shutdown_rx.await;
    }));

    let transport = Arc::new(HttpTransport::new(&config)?);
    let node = MstpNode::new(node_id, &topology, config.node_config(), transport)?;
    state.install(Arc::clone(&node));
    let advertiser = node.start_advertisement_loop();

    info!("mstpd: node {} running", node.node_id());

    signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("mstpd: shutting down node {}", node.node_id());

    node.stop();
    let _ = shutdown_tx.send(());
    if let Err(e) = server.await? {
        error!(error = %e, "mstpd: RPC server failed");
    }
    advertiser.abort();
    Ok(())
}

async fn print_status(config: MstpdConfig) -> anyhow::Result<()> {
    let poller = StatusPoller::new(Arc::new(HttpTransport::new(&config)?));
    let statuses = poller.poll().await;
    println!("{}", serde_json::to_string_pretty(&statuses)?);
    Ok(())
}

async fn start_transfer(
    config: MstpdConfig,
    src: BridgeId,
    mut request: InitiateTransferRequest,
) -> anyhow::Result<()> {
    let transport = Arc::new(HttpTransport::new(&config)?);
    let statuses = StatusPoller::new(Arc::clone(&transport)).poll().await;

    let silent = unreachable(&statuses);
    if !silent.is_empty() {
        bail!("cannot compute a path, nodes not answering: {:?}", silent);
    }
    request.global_port_states = aggregate(&statuses);

    let ack = transport
        .initiate_transfer(&src, &request)
        .await
        .with_context(|| format!("asking {} to start the transfer", src))?;

    match ack.transfer_id {
        Some(transfer_id) => println!("{}", transfer_id),
        None => println!("{}", ack.status),
    }
    Ok(())
}
