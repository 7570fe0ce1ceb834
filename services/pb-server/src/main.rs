//! `pb-server`: hosts the [`otprov_pb::PbService`] RPC surface over a
//! durable sqlite store, and drives the background synchronizer that
//! drains accepted records to the external registry (spec §4.5, §4.6).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use otprov_core::config::CommonArgs;
use otprov_core::{logging, tls};
use otprov_pb::PbService;
use otprov_pb_store::RecordStore;
use otprov_proto::pb::pb_server::PbServer;
use otprov_registry_client::RegistryClient;
use otprov_sync_worker::{SyncWorker, SyncWorkerConfig};
use tonic::transport::Server;

const DEFAULT_PORT: u16 = 5001;

#[derive(Debug, Parser)]
#[command(name = "pb-server", about = "Proxy Buffer gRPC server and registry synchronizer")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// External registry endpoint for single-record registration.
    #[arg(long)]
    register_url: String,

    /// External registry endpoint for batch registration.
    #[arg(long)]
    batch_register_url: String,

    /// File of `name: value` lines attached as headers to every registry
    /// request (spec §4.6).
    #[arg(long)]
    registry_headers_file: Option<PathBuf>,

    /// Sync worker tick interval, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    sync_tick_ms: u64,

    /// Max records pulled from the store per tick.
    #[arg(long, default_value_t = 100)]
    sync_batch_size: usize,

    /// Submit each tick's records as a single batch request instead of one
    /// request per record.
    #[arg(long, default_value_t = true)]
    sync_batch_mode: bool,

    /// Bound on transport-failure retries within a single tick.
    #[arg(long, default_value_t = 3)]
    sync_max_retries: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    let db_path = args.common.db_path.clone().context("--db_path is required")?;
    let store = Arc::new(RecordStore::open(&db_path).with_context(|| format!("opening record store at {}", db_path.display()))?);

    let registry = RegistryClient::new(args.register_url.clone(), args.batch_register_url.clone(), args.registry_headers_file.as_deref())
        .context("constructing registry client")?;

    let worker_config = SyncWorkerConfig {
        tick_interval: Duration::from_millis(args.sync_tick_ms),
        batch_size: args.sync_batch_size,
        batch_mode: args.sync_batch_mode,
        max_retries_per_tick: args.sync_max_retries,
    };
    let worker = SyncWorker::new(store.clone(), registry, worker_config);
    tokio::spawn(async move {
        worker.run().await;
    });

    let service = PbService::new_shared(store);
    let addr = format!("0.0.0.0:{}", args.common.resolved_port("pb", DEFAULT_PORT)).parse()?;
    tracing::info!(%addr, "pb-server listening");

    let mut server = Server::builder();
    if let Some(tls_config) = tls::server_tls_config(&args.common)? {
        server = server.tls_config(tls_config)?;
    }

    server
        .add_service(PbServer::new(service))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("pb-server shutting down");
        })
        .await?;

    Ok(())
}
