//! `spm-server`: hosts the [`otprov_spm::SpmService`] RPC surface. Reachable
//! only from the PA, never directly from ATE clients (spec §6).

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use otprov_core::config::CommonArgs;
use otprov_core::{logging, tls};
use otprov_pkcs11_adapter::{HsmBackend, SessionPool, SoftHsm};
use otprov_proto::spm::spm_server::SpmServer;
use otprov_sku_config::SkuRegistry;
use otprov_spm::SpmService;
use tonic::transport::Server;

const DEFAULT_PORT: u16 = 5000;
/// Upper bound on concurrent HSM sessions this process will hold open
/// (spec §4.1 "Session pool"). Not yet exposed as a CLI flag; a single
/// SPM token rarely benefits from more than a handful of concurrent
/// commands.
const HSM_MAX_SESSIONS: usize = 4;

#[derive(Debug, Parser)]
#[command(name = "spm-server", about = "Secure Provisioning Module gRPC server")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    #[cfg(feature = "hardware")]
    if let (Some(module), Some(pin)) = (args.common.hsm_so.as_ref(), args.common.hsm_pw.as_ref()) {
        let hsm = otprov_pkcs11_adapter::Pkcs11Hsm::load(
            module.to_str().context("--hsm_so must be valid UTF-8")?,
            "spm",
        )
        .map_err(|e| anyhow::anyhow!("loading PKCS#11 module: {e}"))?;
        return run(hsm, pin.clone(), args).await;
    }

    run(SoftHsm::new(), "unused".to_string(), args).await
}

async fn run<B: HsmBackend + 'static>(backend: B, pin: String, args: Args) -> anyhow::Result<()> {
    let config_dir = args.common.spm_config_dir.clone().context("--spm_config_dir is required")?;
    let skus = Arc::new(SkuRegistry::load_dir(&config_dir).with_context(|| format!("loading SKU configuration from {}", config_dir.display()))?);
    tracing::info!(sku_count = skus.len(), "SKU configuration loaded");

    let pool = Arc::new(SessionPool::new(Arc::new(backend), HSM_MAX_SESSIONS));
    let session = pool.open_session("spm".to_string(), pin).await.map_err(|e| anyhow::anyhow!("opening HSM session: {e}"))?;

    let service = SpmService::new(pool, session, skus);
    let addr = format!("0.0.0.0:{}", args.common.resolved_port("spm", DEFAULT_PORT)).parse()?;
    tracing::info!(%addr, "spm-server listening");

    let mut server = Server::builder();
    if let Some(tls_config) = tls::server_tls_config(&args.common)? {
        server = server.tls_config(tls_config)?;
    }

    server
        .add_service(SpmServer::new(service))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("spm-server shutting down");
        })
        .await?;

    Ok(())
}
